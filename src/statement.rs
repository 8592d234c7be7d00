//! Job text splitting and statement classification.
//!
//! A job's query text is a script: several statements separated by `;`,
//! possibly mixed with `DECLARE` blocks, session `SET` items and temporary
//! function definitions. This module turns that script into the statements
//! worth analyzing.
//!
//! # Pipeline
//!
//! 1. **Split**: cut the text on top-level `;`, ignoring semicolons inside
//!    string literals, quoted identifiers and comments
//! 2. **Classify**: drop fragments that cannot carry an antipattern
//! 3. **Parse**: run the BigQuery dialect parser and lower every statement
//!    into a [`Node`] tree
//!
//! # Example
//!
//! ```
//! use bq_antipattern_checker::statement::{Fragment, classify, split_statements};
//!
//! let script = "DECLARE x INT64 DEFAULT 1; SELECT 'a;b' FROM t";
//! let parts = split_statements(script);
//! assert_eq!(parts.len(), 2);
//! assert!(matches!(classify(parts[0]), Fragment::Skip(_)));
//! assert!(matches!(classify(parts[1]), Fragment::Analyze(_)));
//! ```

use std::{fmt, sync::LazyLock};

use regex::Regex;
use sqlparser::{dialect::BigQueryDialect, parser::Parser};

use crate::{
    ast::{Node, lower_statement},
    error::{AppResult, statement_parse_error}
};

/// Matches session `SET` items at the start of a fragment.
static SET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SET\b").expect("valid regex"));

/// Matches user-defined function definitions anywhere in a fragment.
static FUNCTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?(?:TEMP\s+|TEMPORARY\s+)?FUNCTION\b")
        .expect("valid regex")
});

/// Why a fragment was left out of analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Declare,
    SessionSet,
    FunctionDefinition
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declare => write!(f, "DECLARE block"),
            Self::SessionSet => write!(f, "session SET"),
            Self::FunctionDefinition => write!(f, "function definition")
        }
    }
}

/// Classification of one statement fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment<'a> {
    Analyze(&'a str),
    Skip(SkipReason)
}

/// Split a script into trimmed, non-empty statement fragments.
pub fn split_statements(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut fragments = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        i = match bytes[i] {
            b'\'' | b'"' | b'`' => skip_quoted(bytes, i),
            b'-' if bytes.get(i + 1) == Some(&b'-') => skip_line(bytes, i),
            b'#' => skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => skip_block_comment(bytes, i),
            b';' => {
                push_fragment(&mut fragments, &text[start..i]);
                start = i + 1;
                i + 1
            }
            _ => i + 1
        };
    }
    if start < text.len() {
        push_fragment(&mut fragments, &text[start..]);
    }
    fragments
}

/// Decide whether a fragment is worth parsing.
pub fn classify(fragment: &str) -> Fragment<'_> {
    if fragment.to_ascii_lowercase().contains("declare") {
        return Fragment::Skip(SkipReason::Declare);
    }
    if SET_REGEX.is_match(fragment) {
        return Fragment::Skip(SkipReason::SessionSet);
    }
    if FUNCTION_REGEX.is_match(fragment) {
        return Fragment::Skip(SkipReason::FunctionDefinition);
    }
    Fragment::Analyze(fragment)
}

/// Parse one fragment and lower every analyzable statement in it.
///
/// # Errors
///
/// Returns a statement parse error when the BigQuery parser rejects the text.
pub fn parse_fragment(fragment: &str) -> AppResult<Vec<Node>> {
    let statements = Parser::parse_sql(&BigQueryDialect {}, fragment)
        .map_err(|e| statement_parse_error(e.to_string()))?;
    Ok(statements
        .iter()
        .filter(|statement| matches!(classify(&statement.to_string()), Fragment::Analyze(_)))
        .map(lower_statement)
        .collect())
}

fn push_fragment<'a>(fragments: &mut Vec<&'a str>, raw: &'a str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        fragments.push(trimmed);
    }
}

/// Index just past the closing quote, honoring backslash escapes.
fn skip_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| from + offset + 1)
}

fn skip_block_comment(bytes: &[u8], from: usize) -> usize {
    bytes[from + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| from + 2 + offset + 2)
}
