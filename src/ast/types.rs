use std::fmt;

use compact_str::CompactString;
use smallvec::SmallVec;

/// Closed set of node kinds the rule set reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Statement,
    Query,
    With,
    Cte,
    Select,
    SetOperation,
    Distinct,
    Projection,
    From,
    Join,
    Where,
    Group,
    Having,
    Order,
    Limit,
    Table,
    Derived,
    Unnest,
    Column,
    Star,
    Literal,
    Interval,
    Var,
    Cast,
    Count,
    Function,
    DateAdd,
    DateSub,
    RegexpLike,
    RegexpReplace,
    RegexpExtract,
    Like,
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    And,
    Or,
    Not,
    Add,
    Sub,
    Mul,
    Neg,
    In,
    Between,
    Exists,
    Raw
}

impl Kind {
    /// Pattern-matching predicates (LIKE and the REGEXP family).
    pub fn is_pattern_match(self) -> bool {
        matches!(
            self,
            Self::Like | Self::RegexpLike | Self::RegexpReplace | Self::RegexpExtract
        )
    }

    pub fn is_regexp(self) -> bool {
        matches!(
            self,
            Self::RegexpLike | Self::RegexpReplace | Self::RegexpExtract
        )
    }
}

/// Scalar payload carried by a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Attr {
    #[default]
    None,
    /// Identifier-like payload: CTE alias, derived alias, interval unit,
    /// cast target, function name, statement keyword
    Name(CompactString),
    Table(TableRef),
    Column(ColumnRef),
    Literal(Literal),
    /// Source text of an expression the lowering does not model
    Text(String)
}

/// A table reference as written in a `FROM`/`JOIN` clause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableRef {
    pub catalog:  Option<CompactString>,
    pub database: Option<CompactString>,
    pub name:     CompactString,
    pub alias:    Option<CompactString>
}

impl TableRef {
    /// Build from dotted name parts, splitting parts that embed dots
    /// (backtick-quoted `project.dataset.table` arrives as one part).
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut flat: SmallVec<[CompactString; 4]> = parts
            .into_iter()
            .flat_map(|p| p.split('.'))
            .filter(|p| !p.is_empty())
            .map(CompactString::from)
            .collect();
        let name = flat.pop().unwrap_or_default();
        let database = flat.pop();
        let catalog = if flat.is_empty() {
            None
        } else {
            Some(CompactString::from(flat.join(".")))
        };
        Self {
            catalog,
            database,
            name,
            alias: None
        }
    }

    pub fn with_alias(mut self, alias: Option<CompactString>) -> Self {
        self.alias = alias;
        self
    }

    /// A reference is qualified when it names its dataset.
    pub fn is_qualified(&self) -> bool {
        self.database.is_some()
    }

    pub fn qualified_name(&self) -> String {
        let mut out = String::new();
        for part in [&self.catalog, &self.database].into_iter().flatten() {
            out.push_str(part);
            out.push('.');
        }
        out.push_str(&self.name);
        out
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// A column reference: qualifier parts followed by the column name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnRef {
    pub parts: SmallVec<[CompactString; 4]>
}

impl ColumnRef {
    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            parts: parts
                .into_iter()
                .flat_map(|p| p.split('.'))
                .filter(|p| !p.is_empty())
                .map(CompactString::from)
                .collect()
        }
    }

    pub fn name(&self) -> &str {
        self.parts.last().map(|p| p.as_str()).unwrap_or_default()
    }

    pub fn qualifiers(&self) -> &[CompactString] {
        match self.parts.split_last() {
            Some((_, rest)) => rest,
            None => &[]
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.parts.len() > 1
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Number(CompactString),
    String(String),
    Boolean(bool),
    Null
}

impl Literal {
    /// Non-negative integer value of a numeric or digit-only string literal.
    pub fn as_count(&self) -> Option<u64> {
        let text = match self {
            Self::Number(n) => n.as_str(),
            Self::String(s) => s.as_str(),
            _ => return None
        };
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }
}
