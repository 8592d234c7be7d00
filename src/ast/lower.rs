mod expr;
mod set_expr;
mod table;

use std::ops::ControlFlow;

use compact_str::CompactString;
use sqlparser::ast::{Query, Statement, Visit, Visitor};

pub(crate) use set_expr::lower_query;

use super::{Attr, Kind, Node};

/// Lower a parsed statement into a [`Node`] tree.
///
/// A plain query statement becomes `Statement("QUERY")` wrapping the query.
/// Any other statement wraps the outermost queries embedded in it
/// (`INSERT ... SELECT`, `CREATE TABLE ... AS SELECT`, `MERGE ... USING`).
pub fn lower_statement(statement: &Statement) -> Node {
    if let Statement::Query(query) = statement {
        return Node::with_attr(
            Kind::Statement,
            Attr::Name(CompactString::from("QUERY")),
            vec![lower_query(query)]
        );
    }
    let mut collector = QueryCollector::default();
    let _ = statement.visit(&mut collector);
    Node::with_attr(
        Kind::Statement,
        Attr::Name(statement_keyword(statement)),
        collector.queries
    )
}

fn statement_keyword(statement: &Statement) -> CompactString {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .map(|word| CompactString::from(word.to_ascii_uppercase()))
        .unwrap_or_default()
}

/// Collects the outermost queries of a statement.
#[derive(Default)]
struct QueryCollector {
    depth:   usize,
    queries: Vec<Node>
}

impl Visitor for QueryCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if self.depth == 0 {
            self.queries.push(lower_query(query));
        }
        self.depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.depth = self.depth.saturating_sub(1);
        ControlFlow::Continue(())
    }
}
