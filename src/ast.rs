//! Typed expression tree consumed by the rule set.
//!
//! Statements are parsed with [`sqlparser`] using the BigQuery dialect and
//! lowered once into a small closed tree of [`Node`]s. Each node carries a
//! [`Kind`] tag, an optional scalar [`Attr`] payload and ordered children.
//! Rules pattern-match on this tree instead of probing the parser AST.
//!
//! # Shape
//!
//! ```text
//! Statement
//! └── Query
//!     ├── With ── Cte(alias) ── Query
//!     ├── Select | SetOperation | Query
//!     ├── Order
//!     └── Limit
//!
//! Select
//! ├── Distinct
//! ├── Projection
//! ├── From ── Table | Derived | Unnest
//! ├── Join ── (Table | Derived | Unnest), condition
//! ├── Where
//! ├── Group
//! └── Having
//! ```
//!
//! Expressions the lowering does not model become [`Kind::Raw`] leaves that
//! keep their source text.

mod lower;
mod types;

pub use lower::lower_statement;
pub use types::{Attr, ColumnRef, Kind, Literal, TableRef};

/// Immutable node of the lowered expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind:     Kind,
    pub attr:     Attr,
    pub children: Vec<Node>
}

impl Node {
    pub fn new(kind: Kind, children: Vec<Node>) -> Self {
        Self {
            kind,
            attr: Attr::None,
            children
        }
    }

    pub fn leaf(kind: Kind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn with_attr(kind: Kind, attr: Attr, children: Vec<Node>) -> Self {
        Self {
            kind,
            attr,
            children
        }
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::with_attr(Kind::Raw, Attr::Text(text.into()), Vec::new())
    }

    pub fn is(&self, kind: Kind) -> bool {
        self.kind == kind
    }

    pub fn name(&self) -> Option<&str> {
        match &self.attr {
            Attr::Name(name) => Some(name),
            _ => None
        }
    }

    pub fn table(&self) -> Option<&TableRef> {
        match &self.attr {
            Attr::Table(table) => Some(table),
            _ => None
        }
    }

    pub fn column(&self) -> Option<&ColumnRef> {
        match &self.attr {
            Attr::Column(column) => Some(column),
            _ => None
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.attr {
            Attr::Literal(literal) => Some(literal),
            _ => None
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.attr {
            Attr::Text(text) => Some(text),
            _ => None
        }
    }

    /// First direct child of the given kind.
    pub fn child(&self, kind: Kind) -> Option<&Node> {
        self.children.iter().find(|c| c.kind == kind)
    }

    /// All nodes of the given kind, including `self`, in pre-order.
    pub fn find_all(&self, kind: Kind) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out, &|n: &Node| n.kind == kind, true);
        out
    }

    /// All nodes matching the predicate, including `self`, in pre-order.
    pub fn find_all_by(&self, pred: impl Fn(&Node) -> bool) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out, &pred, true);
        out
    }

    /// Like [`find_all`](Self::find_all) but does not enter nested queries.
    pub fn find_all_scoped(&self, kind: Kind) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out, &|n: &Node| n.kind == kind, false);
        out
    }

    pub fn find_all_scoped_by(&self, pred: impl Fn(&Node) -> bool) -> Vec<&Node> {
        let mut out = Vec::new();
        self.collect(&mut out, &pred, false);
        out
    }

    pub fn find(&self, kind: Kind) -> Option<&Node> {
        self.find_first(&|n: &Node| n.kind == kind)
    }

    pub fn find_by(&self, pred: impl Fn(&Node) -> bool) -> Option<&Node> {
        self.find_first(&pred)
    }

    pub fn contains(&self, kind: Kind) -> bool {
        self.find(kind).is_some()
    }

    /// Whether a node of the given kind exists without entering nested
    /// queries.
    pub fn contains_scoped(&self, kind: Kind) -> bool {
        !self.find_all_scoped(kind).is_empty()
    }

    /// Pre-order walk passing each node with its ancestors (root first).
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node, &[&'a Node])) {
        let mut stack = Vec::new();
        self.walk_inner(&mut stack, visit);
    }

    /// Every node of the given kind paired with its nearest enclosing
    /// `Select`, if any.
    pub fn with_enclosing_select(&self, kind: Kind) -> Vec<(&Node, Option<&Node>)> {
        let mut out = Vec::new();
        self.walk(&mut |node, ancestors| {
            if node.kind == kind {
                let select = ancestors.iter().rev().find(|a| a.kind == Kind::Select);
                out.push((node, select.copied()));
            }
        });
        out
    }

    /// The statement's top-level query, when the statement is a plain query.
    pub fn top_query(&self) -> Option<&Node> {
        if self.kind == Kind::Statement && self.name() == Some("QUERY") {
            return self.child(Kind::Query);
        }
        if self.kind == Kind::Query {
            return Some(self);
        }
        None
    }

    /// The `Select` forming the body of the top-level query, unwrapping
    /// parenthesized query bodies.
    pub fn top_select(&self) -> Option<&Node> {
        let mut query = self.top_query()?;
        loop {
            if let Some(select) = query.child(Kind::Select) {
                return Some(select);
            }
            query = query.child(Kind::Query)?;
        }
    }

    /// Table nodes sitting directly in this select's `FROM`/`JOIN` clauses.
    pub fn source_tables(&self) -> Vec<&TableRef> {
        self.children
            .iter()
            .filter(|c| matches!(c.kind, Kind::From | Kind::Join))
            .flat_map(|clause| clause.children.iter())
            .filter_map(Node::table)
            .collect()
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Node>, pred: &dyn Fn(&Node) -> bool, deep: bool) {
        if pred(self) {
            out.push(self);
        }
        for child in &self.children {
            if !deep && child.kind == Kind::Query {
                continue;
            }
            child.collect(out, pred, deep);
        }
    }

    fn find_first(&self, pred: &dyn Fn(&Node) -> bool) -> Option<&Node> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_first(pred))
    }

    fn walk_inner<'a>(
        &'a self,
        stack: &mut Vec<&'a Node>,
        visit: &mut impl FnMut(&'a Node, &[&'a Node])
    ) {
        visit(self, stack.as_slice());
        stack.push(self);
        for child in &self.children {
            child.walk_inner(stack, visit);
        }
        stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> Node {
        Node::with_attr(
            Kind::Column,
            Attr::Column(ColumnRef::from_parts([name])),
            vec![]
        )
    }

    fn sample() -> Node {
        let inner = Node::new(
            Kind::Query,
            vec![Node::new(Kind::Select, vec![Node::new(
                Kind::Projection,
                vec![column("b")]
            )])]
        );
        Node::new(Kind::Select, vec![
            Node::new(Kind::Projection, vec![column("a")]),
            Node::new(Kind::Where, vec![Node::new(Kind::In, vec![column("a"), inner])]),
        ])
    }

    #[test]
    fn test_find_all_pre_order() {
        let tree = sample();
        let names: Vec<_> = tree
            .find_all(Kind::Column)
            .iter()
            .filter_map(|n| n.column().map(|c| c.name().to_string()))
            .collect();
        assert_eq!(names, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_find_all_scoped_skips_subqueries() {
        let tree = sample();
        assert_eq!(tree.find_all_scoped(Kind::Column).len(), 2);
        assert!(!tree.contains_scoped(Kind::Query));
        assert!(tree.contains(Kind::Query));
    }

    #[test]
    fn test_with_enclosing_select() {
        let tree = sample();
        let pairs = tree.with_enclosing_select(Kind::Column);
        assert_eq!(pairs.len(), 3);
        assert!(std::ptr::eq(pairs[0].1.unwrap(), &tree));
        assert!(!std::ptr::eq(pairs[2].1.unwrap(), &tree));
    }

    #[test]
    fn test_raw_keeps_text() {
        let node = Node::raw("DATE '2020-01-01'");
        assert_eq!(node.text(), Some("DATE '2020-01-01'"));
        assert!(node.is(Kind::Raw));
    }
}
