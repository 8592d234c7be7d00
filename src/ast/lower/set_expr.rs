use compact_str::CompactString;
use sqlparser::ast::{
    Distinct, GroupByExpr, LimitClause, OrderByKind, Query, Select, SelectItem, SetExpr
};

use super::{
    expr::lower_expr,
    table::{lower_join, lower_table_factor}
};
use crate::ast::{Attr, Kind, Node};

pub fn lower_query(query: &Query) -> Node {
    let mut children = Vec::new();
    if let Some(with) = &query.with {
        let ctes = with
            .cte_tables
            .iter()
            .map(|cte| {
                Node::with_attr(
                    Kind::Cte,
                    Attr::Name(CompactString::from(cte.alias.name.value.as_str())),
                    vec![lower_query(&cte.query)]
                )
            })
            .collect();
        children.push(Node::new(Kind::With, ctes));
    }
    children.push(lower_set_expr(&query.body));
    if let Some(order_by) = &query.order_by {
        let exprs = match &order_by.kind {
            OrderByKind::Expressions(exprs) => exprs.iter().map(|e| lower_expr(&e.expr)).collect(),
            _ => Vec::new()
        };
        children.push(Node::new(Kind::Order, exprs));
    }
    if let Some(limit) = lower_limit(query) {
        children.push(limit);
    }
    Node::new(Kind::Query, children)
}

fn lower_limit(query: &Query) -> Option<Node> {
    let limit = match &query.limit_clause {
        Some(LimitClause::LimitOffset {
            limit: Some(limit), ..
        }) => Some(lower_expr(limit)),
        Some(LimitClause::OffsetCommaLimit {
            limit, ..
        }) => Some(lower_expr(limit)),
        _ => None
    };
    limit
        .or_else(|| query.fetch.as_ref().map(|fetch| Node::raw(fetch.to_string())))
        .map(|value| Node::new(Kind::Limit, vec![value]))
}

fn lower_set_expr(set_expr: &SetExpr) -> Node {
    match set_expr {
        SetExpr::Select(select) => lower_select(select),
        SetExpr::Query(query) => lower_query(query),
        SetExpr::SetOperation {
            left,
            right,
            ..
        } => Node::new(Kind::SetOperation, vec![
            lower_set_expr(left),
            lower_set_expr(right),
        ]),
        other => Node::raw(other.to_string())
    }
}

fn lower_select(select: &Select) -> Node {
    let mut children = Vec::new();
    if matches!(
        select.distinct,
        Some(Distinct::Distinct) | Some(Distinct::On(_))
    ) {
        children.push(Node::leaf(Kind::Distinct));
    }
    children.push(Node::new(
        Kind::Projection,
        select.projection.iter().map(lower_select_item).collect()
    ));
    // Comma-separated relations after the first act as joins.
    for (idx, item) in select.from.iter().enumerate() {
        let kind = if idx == 0 { Kind::From } else { Kind::Join };
        children.push(Node::new(kind, vec![lower_table_factor(&item.relation)]));
        children.extend(item.joins.iter().map(lower_join));
    }
    if let Some(selection) = &select.selection {
        children.push(Node::new(Kind::Where, vec![lower_expr(selection)]));
    }
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) if !exprs.is_empty() => {
            children.push(Node::new(
                Kind::Group,
                exprs.iter().map(lower_expr).collect()
            ));
        }
        GroupByExpr::All(_) => children.push(Node::leaf(Kind::Group)),
        _ => {}
    }
    if let Some(having) = &select.having {
        children.push(Node::new(Kind::Having, vec![lower_expr(having)]));
    }
    Node::new(Kind::Select, children)
}

fn lower_select_item(item: &SelectItem) -> Node {
    match item {
        SelectItem::UnnamedExpr(expr)
        | SelectItem::ExprWithAlias {
            expr, ..
        } => lower_expr(expr),
        _ => Node::leaf(Kind::Star)
    }
}
