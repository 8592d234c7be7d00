//! Date-filter rules: long date ranges and big tables read without any date
//! restriction.

use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock
};

use chrono::NaiveDate;
use regex::Regex;

use super::{Evidence, Rule, RuleContext, RuleId, RuleInfo, RuleVerdict, info_for, is_date_name};
use crate::{
    ast::{ColumnRef, Kind, Literal, Node, TableRef},
    error::{AppResult, rule_error},
    resolver::{ResolvedTable, SymbolTable, referenced_tables, resolve_column}
};

/// Spans longer than this many days trigger `big_date_range`.
const MAX_RANGE_DAYS: f64 = 365.0;

static DATE_TEXT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid regex"));

/// Days per date-arithmetic unit.
fn unit_days(unit: &str) -> AppResult<f64> {
    let upper = unit.to_ascii_uppercase();
    let word: String = upper.chars().take_while(char::is_ascii_alphabetic).collect();
    let word = word.strip_suffix('S').unwrap_or(&word);
    let days = match word {
        "DAY" => 1.0,
        "WEEK" => 7.0,
        "MONTH" => 30.0,
        "YEAR" => 365.0,
        "MINUTE" => 0.0007,
        "HOUR" => 0.04,
        "QUARTER" => 90.0,
        "SECOND" => 0.000_011_666_666_67,
        _ => {
            return Err(rule_error(
                RuleId::BigDateRange.as_str(),
                format!("unknown date unit '{}'", unit)
            ));
        }
    };
    Ok(days)
}

/// Date/time predicate spanning more than a year
///
/// The span comes either from date arithmetic under the predicate
/// (`DATE_SUB(CURRENT_DATE(), INTERVAL 400 DAY)`, `CURRENT_DATE() - 400`) or
/// from a literal date bound measured against the reference date.
pub struct BigDateRange;

impl Rule for BigDateRange {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::BigDateRange)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        for clause in filter_clauses(ctx.root) {
            for predicate in
                clause.find_all_by(|n: &Node| matches!(n.kind, Kind::Between | Kind::GtEq | Kind::Gt))
            {
                if !targets_date(predicate, ctx.symbols) {
                    continue;
                }
                if let Some(days) = predicate_span(predicate, ctx.now)?
                    && days > MAX_RANGE_DAYS
                {
                    return Ok(RuleVerdict::flag(RuleId::BigDateRange, true));
                }
            }
        }
        Ok(RuleVerdict::clear(RuleId::BigDateRange))
    }
}

fn filter_clauses(root: &Node) -> Vec<&Node> {
    root.find_all_by(|n: &Node| matches!(n.kind, Kind::Where | Kind::Join))
}

/// The left operand names a date column, or the predicate casts to a
/// date-like type.
fn targets_date(predicate: &Node, symbols: &SymbolTable) -> bool {
    let Some(left) = predicate.children.first() else {
        return false;
    };
    let Some(column) = left.find(Kind::Column).and_then(Node::column) else {
        return false;
    };
    let name = predicate
        .find(Kind::Cast)
        .and_then(Node::name)
        .unwrap_or_else(|| column.name());
    is_date_name(name) || is_date_column(symbols, column.name())
}

fn predicate_span(predicate: &Node, now: NaiveDate) -> AppResult<Option<f64>> {
    let arithmetic = predicate.contains(Kind::DateSub)
        || predicate.contains(Kind::Sub)
        || (predicate.contains(Kind::Neg) && predicate.contains(Kind::DateAdd));
    if arithmetic {
        let mut span = None;
        for node in predicate.find_all_by(|n: &Node| {
            matches!(n.kind, Kind::DateSub | Kind::Sub | Kind::DateAdd)
        }) {
            if let Some(days) = arithmetic_span(node)? {
                span = Some(span.map_or(days, |s: f64| s.max(days)));
            }
        }
        return Ok(span);
    }
    // Lower bound of BETWEEN, right operand of a comparison
    match predicate.children.get(1).and_then(date_text) {
        Some(text) => literal_span(&text, now),
        None => Ok(None)
    }
}

/// `magnitude * unit` of one date-arithmetic node.
///
/// The unit is the `INTERVAL` unit, else a date-part token passed directly
/// to the node, else the literal factor of a direct multiplication. Date
/// parts of nested calls such as `DATE_TRUNC(d, YEAR)` are not units.
fn arithmetic_span(node: &Node) -> AppResult<Option<f64>> {
    let interval = node
        .child(Kind::Interval)
        .or_else(|| node.find(Kind::Interval));
    let Some(magnitude) = first_count(interval.unwrap_or(node)) else {
        return Ok(None);
    };
    let multiplier = match (interval, node.child(Kind::Var)) {
        (Some(interval), _) => unit_of(interval)?,
        (None, Some(var)) => unit_of(var)?,
        (None, None) => match node.child(Kind::Mul) {
            Some(product) => product
                .children
                .get(1)
                .and_then(Node::literal)
                .and_then(Literal::as_count)
                .ok_or_else(|| {
                    rule_error(
                        RuleId::BigDateRange.as_str(),
                        "non-literal multiplier in date arithmetic"
                    )
                })? as f64,
            None => 1.0
        }
    };
    Ok(Some(magnitude as f64 * multiplier))
}

fn first_count(node: &Node) -> Option<u64> {
    node.find_all(Kind::Literal)
        .into_iter()
        .find_map(|n| n.literal().and_then(Literal::as_count))
}

/// Days of the unit named by an `INTERVAL` or date-part node; one day when
/// the node carries no unit.
fn unit_of(node: &Node) -> AppResult<f64> {
    node.name().map_or(Ok(1.0), unit_days)
}

/// Text of the first literal under `node`, or a date embedded in raw text.
fn date_text(node: &Node) -> Option<String> {
    if let Some(literal) = node.find(Kind::Literal).and_then(Node::literal) {
        return match literal {
            Literal::String(s) => Some(s.clone()),
            Literal::Number(n) => Some(n.to_string()),
            _ => None
        };
    }
    node.find(Kind::Raw)
        .and_then(Node::text)
        .and_then(|text| DATE_TEXT_REGEX.find(text))
        .map(|m| m.as_str().to_string())
}

fn literal_span(text: &str, now: NaiveDate) -> AppResult<Option<f64>> {
    let text = text.replace('\'', "");
    if text.len() <= 9 || !text.contains('-') {
        return Ok(None);
    }
    let head = text.get(..10).unwrap_or(&text);
    let date = NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|e| {
        rule_error(
            RuleId::BigDateRange.as_str(),
            format!("invalid date '{}': {}", head, e)
        )
    })?;
    Ok(Some((now - date).num_days() as f64))
}

/// Big, non-dimension table with no date filter attributable to it
///
/// Date columns are date-named columns plus the date and partition columns
/// the catalog lists for the statement's tables. A date column in a
/// `WHERE`/`JOIN` comparison is attributed to a table through its qualifier
/// (alias, table name or dotted suffix), through the single source of its
/// `SELECT`, or by being a date column of exactly one source. Filtering a CTE
/// by date counts for every big table the CTE reads. Columns that cannot be
/// attributed excuse every table that has a date column of that name.
pub struct BigTableNoDate;

impl Rule for BigTableNoDate {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::BigTableNoDate)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let candidates: Vec<&ResolvedTable> = ctx
            .symbols
            .tables()
            .filter(|t| !t.entry.is_dimension())
            .collect();
        if candidates.is_empty() {
            return Ok(RuleVerdict::clear(RuleId::BigTableNoDate));
        }
        let mut attribution = Attribution::new(ctx.root, ctx.symbols);
        for (predicate, select) in date_predicates(ctx.root) {
            let column = predicate
                .children
                .iter()
                .find_map(|operand| operand.find(Kind::Column).and_then(Node::column));
            if let Some(column) = column
                && is_date_column(ctx.symbols, column.name())
            {
                attribution.attribute(column, select);
            }
        }
        let evidence = candidates
            .into_iter()
            .filter(|t| !attribution.is_filtered(t) && !attribution.is_excused(t))
            .map(|t| Evidence::table(t.qualified_name()))
            .collect();
        Ok(RuleVerdict::from_evidence(RuleId::BigTableNoDate, evidence))
    }
}

/// Date-named, or listed as a date or partition column of a resolved table.
fn is_date_column(symbols: &SymbolTable, name: &str) -> bool {
    is_date_name(name) || symbols.tables().any(|t| t.entry.has_date_column(name))
}

/// Comparisons inside `WHERE`/`JOIN` clauses free of `UNNEST`, paired with
/// their nearest enclosing `SELECT`.
fn date_predicates(root: &Node) -> Vec<(&Node, Option<&Node>)> {
    let mut out = Vec::new();
    root.walk(&mut |node, ancestors| {
        if !matches!(
            node.kind,
            Kind::Between | Kind::GtEq | Kind::Gt | Kind::Eq
        ) {
            return;
        }
        let clause = ancestors
            .iter()
            .rev()
            .find(|a| matches!(a.kind, Kind::Where | Kind::Join));
        if clause.is_some_and(|c| !c.contains(Kind::Unnest)) {
            let select = ancestors.iter().rev().find(|a| a.is(Kind::Select)).copied();
            out.push((node, select));
        }
    });
    out
}

struct Attribution<'a> {
    symbols:  &'a SymbolTable,
    ctes:     HashMap<String, &'a Node>,
    filtered: HashSet<String>,
    unclear:  HashSet<String>
}

impl<'a> Attribution<'a> {
    fn new(root: &'a Node, symbols: &'a SymbolTable) -> Self {
        let ctes = root
            .find_all(Kind::Cte)
            .into_iter()
            .filter_map(|cte| cte.name().map(|name| (name.to_ascii_lowercase(), cte)))
            .collect();
        Self {
            symbols,
            ctes,
            filtered: HashSet::new(),
            unclear: HashSet::new()
        }
    }

    fn attribute(&mut self, column: &ColumnRef, select: Option<&Node>) {
        let symbols = self.symbols;
        let sources: Vec<&TableRef> = select.map(Node::source_tables).unwrap_or_default();
        let (name, qualifier) = resolve_column(column);
        if let Some(qualifier) = qualifier {
            let source = sources.iter().find(|s| names_source(s, &qualifier));
            let table = symbols
                .get(&qualifier)
                .or_else(|| source.and_then(|s| symbols.get(&s.qualified_name())));
            if let Some(table) = table {
                if table.entry.has_date_column(name) {
                    self.mark(table);
                }
            } else if let Some(cte) = self.cte_behind(&qualifier, &sources) {
                self.propagate(cte);
            } else if source.is_none() {
                // Qualifier matches no source of the enclosing SELECT
                self.unclear.insert(name.to_ascii_lowercase());
            }
            return;
        }
        if let [source] = sources.as_slice() {
            if let Some(cte) = self.cte_source(source) {
                self.propagate(cte);
            } else if let Some(table) = symbols.get(&source.qualified_name())
                && table.entry.has_date_column(name)
            {
                self.mark(table);
            }
            return;
        }
        let owners: Vec<&ResolvedTable> = sources
            .iter()
            .filter_map(|s| symbols.get(&s.qualified_name()))
            .filter(|t| t.entry.has_date_column(name))
            .collect();
        match owners.as_slice() {
            [owner] => {
                let owner = *owner;
                self.mark(owner);
            }
            _ => {
                self.unclear.insert(name.to_ascii_lowercase());
            }
        }
    }

    fn mark(&mut self, table: &ResolvedTable) {
        self.filtered.insert(table.qualified_name().to_string());
    }

    /// Every big table read inside the CTE counts as date filtered.
    fn propagate(&mut self, cte: &Node) {
        let symbols = self.symbols;
        for table in referenced_tables(cte) {
            if let Some(resolved) = symbols.get(&table.qualified_name()) {
                self.filtered
                    .insert(resolved.qualified_name().to_string());
            }
        }
    }

    fn cte_source(&self, source: &TableRef) -> Option<&'a Node> {
        if source.is_qualified() {
            return None;
        }
        self.ctes.get(source.name.to_ascii_lowercase().as_str()).copied()
    }

    /// CTE referenced by a column qualifier, directly or through an alias.
    fn cte_behind(&self, qualifier: &str, sources: &[&TableRef]) -> Option<&'a Node> {
        let lower = qualifier.to_ascii_lowercase();
        if let Some(cte) = self.ctes.get(&lower).copied() {
            return Some(cte);
        }
        sources
            .iter()
            .filter(|s| {
                s.alias
                    .as_ref()
                    .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
            })
            .find_map(|s| self.cte_source(s))
    }

    fn is_filtered(&self, table: &ResolvedTable) -> bool {
        self.filtered.contains(table.qualified_name())
    }

    fn is_excused(&self, table: &ResolvedTable) -> bool {
        self.unclear
            .iter()
            .any(|column| table.entry.has_date_column(column))
    }
}

/// Whether a column qualifier denotes `source`: its alias, or a dotted
/// suffix of its qualified name when it has no alias.
fn names_source(source: &TableRef, qualifier: &str) -> bool {
    if let Some(alias) = &source.alias {
        return alias.eq_ignore_ascii_case(qualifier);
    }
    let full = source.qualified_name().to_ascii_lowercase();
    let qualifier = qualifier.to_ascii_lowercase();
    full == qualifier || full.ends_with(&format!(".{}", qualifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{check, triggered};

    #[test]
    fn test_unit_days() {
        assert_eq!(unit_days("DAY").unwrap(), 1.0);
        assert_eq!(unit_days("days").unwrap(), 1.0);
        assert_eq!(unit_days("Month").unwrap(), 30.0);
        assert!(unit_days("FORTNIGHT").is_err());
    }

    #[test]
    fn test_date_sub_interval_over_a_year() {
        let sql = "SELECT a FROM t WHERE event_date >= DATE_SUB(CURRENT_DATE(), INTERVAL 400 DAY)";
        assert!(triggered(&BigDateRange, sql));
    }

    #[test]
    fn test_date_sub_interval_within_a_year() {
        let sql = "SELECT a FROM t WHERE event_date >= DATE_SUB(CURRENT_DATE(), INTERVAL 30 DAY)";
        assert!(!triggered(&BigDateRange, sql));
    }

    #[test]
    fn test_catalog_date_column_is_a_date_target() {
        let sql = "SELECT a FROM proj.ds.big WHERE dt >= DATE_SUB(CURRENT_DATE(), INTERVAL 400 DAY)";
        assert!(triggered(&BigDateRange, sql));
        let unknown = "SELECT a FROM t WHERE dt >= DATE_SUB(CURRENT_DATE(), INTERVAL 400 DAY)";
        assert!(!triggered(&BigDateRange, unknown));
    }

    #[test]
    fn test_interval_unit_multiplies() {
        let sql = "SELECT a FROM t WHERE event_date > DATE_SUB(CURRENT_DATE(), INTERVAL 2 YEAR)";
        assert!(triggered(&BigDateRange, sql));
        let hours = "SELECT a FROM t \
                     WHERE ts_time > TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 9000 HOUR)";
        assert!(!triggered(&BigDateRange, hours));
    }

    #[test]
    fn test_interval_unit_beats_nested_date_part() {
        let sql = "SELECT a FROM t \
                   WHERE event_date >= DATE_SUB(DATE_TRUNC(CURRENT_DATE(), YEAR), INTERVAL 30 DAY)";
        assert!(!triggered(&BigDateRange, sql));
        let wide = "SELECT a FROM t \
                    WHERE event_date >= DATE_SUB(DATE_TRUNC(CURRENT_DATE(), DAY), INTERVAL 2 YEAR)";
        assert!(triggered(&BigDateRange, wide));
    }

    #[test]
    fn test_plain_subtraction() {
        let sql = "SELECT a FROM t WHERE event_date >= CURRENT_DATE() - 400";
        assert!(triggered(&BigDateRange, sql));
    }

    #[test]
    fn test_multiplied_day_count() {
        let weeks = "SELECT a FROM t WHERE event_date >= CURRENT_DATE() - 7 * 60";
        assert!(triggered(&BigDateRange, weeks));
        let short = "SELECT a FROM t WHERE event_date >= CURRENT_DATE() - 7 * 50";
        assert!(!triggered(&BigDateRange, short));
    }

    #[test]
    fn test_literal_lower_bound() {
        let old = "SELECT a FROM t WHERE event_date BETWEEN '2020-01-01' AND '2020-02-01'";
        let recent = "SELECT a FROM t WHERE event_date >= '2025-03-01'";
        assert!(triggered(&BigDateRange, old));
        assert!(!triggered(&BigDateRange, recent));
    }

    #[test]
    fn test_typed_date_literal() {
        let sql = "SELECT a FROM t WHERE event_date >= DATE '2019-05-01'";
        assert!(triggered(&BigDateRange, sql));
    }

    #[test]
    fn test_non_date_column_ignored() {
        let sql = "SELECT a FROM t WHERE amount >= DATE_SUB(CURRENT_DATE(), INTERVAL 900 DAY)";
        assert!(!triggered(&BigDateRange, sql));
    }

    #[test]
    fn test_unknown_unit_is_an_error() {
        let sql = "SELECT a FROM t \
                   WHERE event_date >= DATE_SUB(CURRENT_DATE(), INTERVAL 4000 MILLISECOND)";
        assert!(check(&BigDateRange, sql).is_err());
    }

    #[test]
    fn test_unknown_unit_stops_later_predicates() {
        let failing_first = "SELECT a FROM t \
            WHERE event_time >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 5 MILLISECOND) \
            AND event_date >= DATE_SUB(CURRENT_DATE(), INTERVAL 2 YEAR)";
        assert!(check(&BigDateRange, failing_first).is_err());
        let wide_first = "SELECT a FROM t \
            WHERE event_date >= DATE_SUB(CURRENT_DATE(), INTERVAL 2 YEAR) \
            AND event_time >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 5 MILLISECOND)";
        assert!(triggered(&BigDateRange, wide_first));
    }

    #[test]
    fn test_big_table_without_date_filter() {
        let verdict = check(&BigTableNoDate, "SELECT a FROM proj.ds.big WHERE id = 1").unwrap();
        assert!(verdict.triggered);
        assert_eq!(verdict.evidence, vec![Evidence::table("proj.ds.big")]);
    }

    #[test]
    fn test_single_source_date_filter() {
        let sql = "SELECT a FROM proj.ds.big WHERE dt >= '2025-01-01'";
        assert!(!triggered(&BigTableNoDate, sql));
    }

    #[test]
    fn test_qualified_date_filter_through_alias() {
        let sql = "SELECT a FROM proj.ds.big b JOIN proj.ds.flat f ON b.id = f.id \
                   WHERE b.dt >= '2025-01-01' AND f.event_time > '2025-01-01'";
        assert!(!triggered(&BigTableNoDate, sql));
        let partial = "SELECT a FROM proj.ds.big b JOIN proj.ds.flat f ON b.id = f.id \
                       WHERE b.dt >= '2025-01-01'";
        let verdict = check(&BigTableNoDate, partial).unwrap();
        assert_eq!(verdict.evidence, vec![Evidence::table("proj.ds.flat")]);
    }

    #[test]
    fn test_unqualified_column_attributed_to_sole_owner() {
        let sql = "SELECT a FROM proj.ds.big b JOIN proj.ds.flat f ON b.id = f.id \
                   WHERE event_time > '2025-01-01'";
        let verdict = check(&BigTableNoDate, sql).unwrap();
        assert_eq!(verdict.evidence, vec![Evidence::table("proj.ds.big")]);
    }

    #[test]
    fn test_unknown_source_leaves_single_owner() {
        let sql = "SELECT a FROM proj.ds.big b JOIN proj.ds.other o ON b.id = o.id \
                   WHERE created_at > '2025-01-01'";
        assert!(!triggered(&BigTableNoDate, sql));
    }

    #[test]
    fn test_unclear_column_excuses_table() {
        let self_join = "SELECT a FROM proj.ds.big b1 JOIN proj.ds.big b2 ON b1.id = b2.id \
                         WHERE created_at > '2025-01-01'";
        assert!(!triggered(&BigTableNoDate, self_join));
        let unowned = "SELECT a FROM proj.ds.big b JOIN proj.ds.flat f ON b.id = f.id \
                       WHERE unknown_date > '2025-01-01'";
        let verdict = check(&BigTableNoDate, unowned).unwrap();
        assert_eq!(verdict.evidence.len(), 2);
    }

    #[test]
    fn test_cte_date_filter_propagates() {
        let sql = "WITH c AS (SELECT dt, a FROM proj.ds.big) SELECT a FROM c WHERE dt >= '2025-01-01'";
        assert!(!triggered(&BigTableNoDate, sql));
    }

    #[test]
    fn test_dimension_and_small_tables_ignored() {
        assert!(!triggered(&BigTableNoDate, "SELECT * FROM proj.ds.dim_country"));
        assert!(!triggered(&BigTableNoDate, "SELECT * FROM proj.ds.tiny"));
    }

    #[test]
    fn test_unnest_clause_skipped() {
        let sql = "SELECT a FROM proj.ds.big WHERE EXISTS (SELECT 1 FROM UNNEST(arr) x WHERE x > 1) \
                   AND dt > '2025-01-01'";
        assert!(triggered(&BigTableNoDate, sql));
    }

    #[test]
    fn test_catalog_partition_column_counts_as_date_filter() {
        let sql = "SELECT a FROM proj.ds.sessions WHERE session_day = '2025-05-01'";
        assert!(!triggered(&BigTableNoDate, sql));
    }

    #[test]
    fn test_table_name_qualifier() {
        let bare = "SELECT a FROM proj.ds.big WHERE big.created_at >= '2025-05-01'";
        assert!(!triggered(&BigTableNoDate, bare));
        let dotted = "SELECT a FROM proj.ds.big WHERE ds.big.created_at >= '2025-05-01'";
        assert!(!triggered(&BigTableNoDate, dotted));
        let aliased = "SELECT a FROM proj.ds.big b WHERE big.created_at >= '2025-05-01'";
        assert!(!triggered(&BigTableNoDate, aliased));
    }

    #[test]
    fn test_unknown_qualifier_is_unclear() {
        let sql = "SELECT a FROM proj.ds.big b JOIN proj.ds.flat f ON b.id = f.id \
                   WHERE x.created_at > '2025-01-01'";
        let verdict = check(&BigTableNoDate, sql).unwrap();
        assert_eq!(verdict.evidence, vec![Evidence::table("proj.ds.flat")]);
    }

    #[test]
    fn test_unclear_partition_column_excuses_table() {
        let sql = "SELECT a FROM proj.ds.sessions s1 JOIN proj.ds.sessions s2 ON s1.id = s2.id \
                   WHERE session_day = '2025-05-01'";
        assert!(!triggered(&BigTableNoDate, sql));
    }
}
