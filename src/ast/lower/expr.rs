use compact_str::CompactString;
use sqlparser::ast::{
    BinaryOperator, DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, UnaryOperator, Value
};

use super::set_expr::lower_query;
use crate::ast::{Attr, ColumnRef, Kind, Literal, Node};

const DATE_PARTS: &[&str] = &[
    "MICROSECOND",
    "MILLISECOND",
    "SECOND",
    "MINUTE",
    "HOUR",
    "DAY",
    "DAYOFWEEK",
    "DAYOFYEAR",
    "WEEK",
    "ISOWEEK",
    "MONTH",
    "QUARTER",
    "YEAR",
    "ISOYEAR"
];

pub fn lower_expr(expr: &Expr) -> Node {
    match expr {
        Expr::Identifier(ident) => column([ident.value.as_str()]),
        Expr::CompoundIdentifier(idents) => column(idents.iter().map(|i| i.value.as_str())),
        Expr::Value(value) => literal(&value.value),
        Expr::Nested(inner) => lower_expr(inner),
        Expr::BinaryOp {
            left,
            op,
            right
        } => lower_binary(left, op, right),
        Expr::UnaryOp {
            op,
            expr
        } => match op {
            UnaryOperator::Not => Node::new(Kind::Not, vec![lower_expr(expr)]),
            UnaryOperator::Minus => Node::new(Kind::Neg, vec![lower_expr(expr)]),
            _ => lower_expr(expr)
        },
        Expr::Like {
            negated,
            expr,
            pattern,
            ..
        }
        | Expr::ILike {
            negated,
            expr,
            pattern,
            ..
        } => negate(*negated, Node::new(Kind::Like, vec![
            lower_expr(expr),
            lower_expr(pattern),
        ])),
        Expr::RLike {
            negated,
            expr,
            pattern,
            ..
        }
        | Expr::SimilarTo {
            negated,
            expr,
            pattern,
            ..
        } => negate(*negated, Node::new(Kind::RegexpLike, vec![
            lower_expr(expr),
            lower_expr(pattern),
        ])),
        Expr::Between {
            expr,
            negated,
            low,
            high
        } => negate(*negated, Node::new(Kind::Between, vec![
            lower_expr(expr),
            lower_expr(low),
            lower_expr(high),
        ])),
        Expr::InList {
            expr,
            list,
            negated
        } => {
            let mut children = vec![lower_expr(expr)];
            children.extend(list.iter().map(lower_expr));
            negate(*negated, Node::new(Kind::In, children))
        }
        Expr::InSubquery {
            expr,
            subquery,
            negated
        } => negate(*negated, Node::new(Kind::In, vec![
            lower_expr(expr),
            lower_query(subquery),
        ])),
        Expr::InUnnest {
            expr,
            array_expr,
            negated
        } => negate(*negated, Node::new(Kind::In, vec![
            lower_expr(expr),
            Node::new(Kind::Unnest, vec![lower_expr(array_expr)]),
        ])),
        Expr::Exists {
            subquery,
            negated
        } => negate(*negated, Node::new(Kind::Exists, vec![lower_query(subquery)])),
        Expr::Subquery(query) => lower_query(query),
        Expr::Cast {
            expr,
            data_type,
            ..
        } => Node::with_attr(Kind::Cast, name(data_type.to_string()), vec![lower_expr(expr)]),
        Expr::Interval(interval) => {
            let attr = interval
                .leading_field
                .as_ref()
                .map(|field| name(field.to_string()))
                .unwrap_or_default();
            Node::with_attr(Kind::Interval, attr, vec![lower_expr(&interval.value)])
        }
        Expr::Function(function) => lower_function(function),
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            let mut children: Vec<Node> = operand.iter().map(|o| lower_expr(o)).collect();
            for when in conditions {
                children.push(lower_expr(&when.condition));
                children.push(lower_expr(&when.result));
            }
            children.extend(else_result.iter().map(|e| lower_expr(e)));
            Node::with_attr(Kind::Function, name("CASE"), children)
        }
        Expr::IsNull(inner)
        | Expr::IsNotNull(inner)
        | Expr::IsTrue(inner)
        | Expr::IsNotTrue(inner)
        | Expr::IsFalse(inner)
        | Expr::IsNotFalse(inner) => {
            Node::with_attr(Kind::Function, name("IS"), vec![lower_expr(inner)])
        }
        Expr::Extract {
            expr, ..
        } => Node::with_attr(Kind::Function, name("EXTRACT"), vec![lower_expr(expr)]),
        Expr::Tuple(items) => Node::with_attr(
            Kind::Function,
            name("TUPLE"),
            items.iter().map(lower_expr).collect()
        ),
        other => Node::raw(other.to_string())
    }
}

fn lower_binary(left: &Expr, op: &BinaryOperator, right: &Expr) -> Node {
    let kind = match op {
        BinaryOperator::Eq => Kind::Eq,
        BinaryOperator::NotEq => Kind::NotEq,
        BinaryOperator::Gt => Kind::Gt,
        BinaryOperator::GtEq => Kind::GtEq,
        BinaryOperator::Lt => Kind::Lt,
        BinaryOperator::LtEq => Kind::LtEq,
        BinaryOperator::And => Kind::And,
        BinaryOperator::Or => Kind::Or,
        BinaryOperator::Plus => Kind::Add,
        BinaryOperator::Minus => Kind::Sub,
        BinaryOperator::Multiply => Kind::Mul,
        other => {
            return Node::with_attr(Kind::Function, name(other.to_string()), vec![
                lower_expr(left),
                lower_expr(right),
            ]);
        }
    };
    Node::new(kind, vec![lower_expr(left), lower_expr(right)])
}

fn lower_function(function: &Function) -> Node {
    let full = function.name.to_string().to_ascii_uppercase();
    let short = full.rsplit('.').next().unwrap_or(full.as_str()).to_string();
    let kind = match short.as_str() {
        "COUNT" => Kind::Count,
        "DATE_ADD" | "DATETIME_ADD" | "TIMESTAMP_ADD" | "TIME_ADD" => Kind::DateAdd,
        "DATE_SUB" | "DATETIME_SUB" | "TIMESTAMP_SUB" | "TIME_SUB" => Kind::DateSub,
        "REGEXP_CONTAINS" | "REGEXP_LIKE" => Kind::RegexpLike,
        "REGEXP_REPLACE" => Kind::RegexpReplace,
        "REGEXP_EXTRACT" | "REGEXP_EXTRACT_ALL" | "REGEXP_SUBSTR" | "REGEXP_INSTR" => {
            Kind::RegexpExtract
        }
        _ => Kind::Function
    };
    let temporal = short.contains("DATE") || short.contains("TIME");
    let children = match &function.args {
        FunctionArguments::List(list) => {
            let args: Vec<Node> = list
                .args
                .iter()
                .map(|arg| lower_function_arg(arg, temporal))
                .collect();
            if list.duplicate_treatment == Some(DuplicateTreatment::Distinct) {
                vec![Node::new(Kind::Distinct, args)]
            } else {
                args
            }
        }
        FunctionArguments::Subquery(query) => vec![lower_query(query)],
        FunctionArguments::None => Vec::new()
    };
    Node::with_attr(kind, Attr::Name(CompactString::from(short)), children)
}

fn lower_function_arg(arg: &FunctionArg, temporal: bool) -> Node {
    let arg = match arg {
        FunctionArg::Unnamed(arg)
        | FunctionArg::Named {
            arg, ..
        }
        | FunctionArg::ExprNamed {
            arg, ..
        } => arg
    };
    match arg {
        FunctionArgExpr::Expr(Expr::Identifier(ident))
            if temporal && is_date_part(&ident.value) =>
        {
            Node::with_attr(
                Kind::Var,
                name(ident.value.to_ascii_uppercase()),
                Vec::new()
            )
        }
        FunctionArgExpr::Expr(expr) => lower_expr(expr),
        FunctionArgExpr::Wildcard | FunctionArgExpr::QualifiedWildcard(_) => Node::leaf(Kind::Star)
    }
}

fn is_date_part(word: &str) -> bool {
    DATE_PARTS.iter().any(|part| part.eq_ignore_ascii_case(word))
}

fn literal(value: &Value) -> Node {
    let lit = match value {
        Value::Number(n, _) => Literal::Number(CompactString::from(n.to_string())),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Literal::String(s.clone()),
        Value::Boolean(b) => Literal::Boolean(*b),
        Value::Null => Literal::Null,
        other => Literal::String(other.to_string())
    };
    Node::with_attr(Kind::Literal, Attr::Literal(lit), Vec::new())
}

fn column<'a>(parts: impl IntoIterator<Item = &'a str>) -> Node {
    Node::with_attr(
        Kind::Column,
        Attr::Column(ColumnRef::from_parts(parts)),
        Vec::new()
    )
}

fn negate(negated: bool, node: Node) -> Node {
    if negated {
        Node::new(Kind::Not, vec![node])
    } else {
        node
    }
}

fn name(text: impl AsRef<str>) -> Attr {
    Attr::Name(CompactString::from(text.as_ref()))
}
