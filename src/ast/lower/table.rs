use compact_str::CompactString;
use sqlparser::ast::{
    Join, JoinConstraint, JoinOperator, ObjectName, ObjectNamePart, TableAlias, TableFactor
};

use super::{expr::lower_expr, set_expr::lower_query};
use crate::ast::{Attr, ColumnRef, Kind, Node, TableRef};

pub fn lower_table_factor(factor: &TableFactor) -> Node {
    match factor {
        TableFactor::Table {
            name,
            alias,
            ..
        } => Node::with_attr(
            Kind::Table,
            Attr::Table(table_ref(name).with_alias(alias_name(alias.as_ref()))),
            Vec::new()
        ),
        TableFactor::Derived {
            subquery,
            alias,
            ..
        } => Node::with_attr(Kind::Derived, alias_attr(alias.as_ref()), vec![lower_query(
            subquery
        )]),
        TableFactor::NestedJoin {
            table_with_joins,
            alias
        } => {
            let mut children = vec![Node::new(Kind::From, vec![lower_table_factor(
                &table_with_joins.relation
            )])];
            children.extend(table_with_joins.joins.iter().map(lower_join));
            Node::with_attr(Kind::Derived, alias_attr(alias.as_ref()), children)
        }
        TableFactor::UNNEST {
            array_exprs, ..
        } => Node::new(Kind::Unnest, array_exprs.iter().map(lower_expr).collect()),
        other => Node::raw(other.to_string())
    }
}

pub fn lower_join(join: &Join) -> Node {
    let mut children = vec![lower_table_factor(&join.relation)];
    match join_constraint(&join.join_operator) {
        Some(JoinConstraint::On(expr)) => children.push(lower_expr(expr)),
        Some(JoinConstraint::Using(names)) => {
            for name in names {
                let text = name.to_string();
                let column = ColumnRef::from_parts([unquote(&text)]);
                children.push(Node::with_attr(Kind::Column, Attr::Column(column), Vec::new()));
            }
        }
        _ => {}
    }
    Node::new(Kind::Join, children)
}

fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Join(constraint)
        | JoinOperator::Inner(constraint)
        | JoinOperator::Left(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::Right(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint)
        | JoinOperator::Semi(constraint)
        | JoinOperator::LeftSemi(constraint)
        | JoinOperator::RightSemi(constraint)
        | JoinOperator::Anti(constraint)
        | JoinOperator::LeftAnti(constraint)
        | JoinOperator::RightAnti(constraint) => Some(constraint),
        _ => None
    }
}

fn table_ref(name: &ObjectName) -> TableRef {
    TableRef::from_parts(name.0.iter().filter_map(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.as_str()),
        _ => None
    }))
}

fn alias_name(alias: Option<&TableAlias>) -> Option<CompactString> {
    alias.map(|a| CompactString::from(a.name.value.as_str()))
}

fn alias_attr(alias: Option<&TableAlias>) -> Attr {
    alias_name(alias).map(Attr::Name).unwrap_or_default()
}

fn unquote(text: &str) -> &str {
    text.trim_matches(|c| c == '`' || c == '"')
}
