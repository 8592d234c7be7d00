use indexmap::{IndexMap, IndexSet};

use super::{Evidence, Rule, RuleContext, RuleId, RuleInfo, RuleVerdict, info_for};
use crate::{
    ast::{Kind, Node},
    error::AppResult,
    resolver::{ResolvedTable, SymbolTable, resolve_column}
};

/// Partitioned big table whose partition column is never filtered on
pub struct PartitionNotUsed;

impl Rule for PartitionNotUsed {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::PartitionNotUsed)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let partitioned: Vec<&ResolvedTable> = ctx
            .symbols
            .tables()
            .filter(|t| t.entry.partition_column.is_some())
            .collect();
        if partitioned.is_empty() {
            return Ok(RuleVerdict::clear(RuleId::PartitionNotUsed));
        }
        let mut used: IndexSet<&str> = IndexSet::new();
        let clauses = ctx
            .root
            .find_all_by(|n: &Node| matches!(n.kind, Kind::Join | Kind::Where));
        for column in clauses
            .into_iter()
            .flat_map(|clause| clause.find_all(Kind::Column))
            .filter_map(Node::column)
        {
            let (name, qualifier) = resolve_column(column);
            match qualifier.as_deref().and_then(|q| ctx.symbols.get(q)) {
                Some(table) => {
                    if table.entry.is_partition_column(name) {
                        used.insert(table.qualified_name());
                    }
                }
                None => {
                    for table in &partitioned {
                        if table.entry.is_partition_column(name) {
                            used.insert(table.qualified_name());
                        }
                    }
                }
            }
        }
        let mut evidence: IndexMap<&str, Evidence> = IndexMap::new();
        for table in partitioned {
            let name = table.qualified_name();
            if used.contains(name) {
                continue;
            }
            if let Some(column) = &table.entry.partition_column {
                evidence
                    .entry(name)
                    .or_insert_with(|| Evidence::partition(name, column.clone()));
            }
        }
        Ok(RuleVerdict::from_evidence(
            RuleId::PartitionNotUsed,
            evidence.into_values().collect()
        ))
    }
}

/// Big, non-dimension table without a partition column
pub struct UnpartitionedTables;

impl Rule for UnpartitionedTables {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::UnpartitionedTables)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let evidence = ctx
            .symbols
            .tables()
            .filter(|t| t.entry.partition_column.is_none() && !t.entry.is_dimension())
            .map(|t| Evidence::table(t.qualified_name()))
            .collect();
        Ok(RuleVerdict::from_evidence(
            RuleId::UnpartitionedTables,
            evidence
        ))
    }
}

/// `DISTINCT` over a table at or above the distinct threshold
pub struct DistinctOnBigTable;

impl Rule for DistinctOnBigTable {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::DistinctOnBigTable)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let symbols = ctx.resolve_at(ctx.thresholds.distinct_function_row_count);
        let evidence = first_big_distinct(ctx.root, &symbols, false);
        Ok(RuleVerdict::from_evidence(
            RuleId::DistinctOnBigTable,
            evidence.into_iter().collect()
        ))
    }
}

/// `COUNT(DISTINCT ...)` over a table at or above the distinct threshold
pub struct CountDistinctOnBigTable;

impl Rule for CountDistinctOnBigTable {
    fn info(&self) -> RuleInfo {
        info_for(RuleId::CountDistinctOnBigTable)
    }

    fn check(&self, ctx: &RuleContext<'_>) -> AppResult<RuleVerdict> {
        let symbols = ctx.resolve_at(ctx.thresholds.distinct_function_row_count);
        let evidence = first_big_distinct(ctx.root, &symbols, true);
        Ok(RuleVerdict::from_evidence(
            RuleId::CountDistinctOnBigTable,
            evidence.into_iter().collect()
        ))
    }
}

/// Evidence for the first `DISTINCT` whose nearest `SELECT` reads a big table
/// in its `FROM`. With `inside_count`, only `COUNT(DISTINCT ...)` qualifies.
fn first_big_distinct(root: &Node, symbols: &SymbolTable, inside_count: bool) -> Option<Evidence> {
    if symbols.is_empty() {
        return None;
    }
    let mut found = None;
    root.walk(&mut |node, ancestors| {
        if found.is_some() || !node.is(Kind::Distinct) {
            return;
        }
        if inside_count && !ancestors.last().is_some_and(|parent| parent.is(Kind::Count)) {
            return;
        }
        let Some(select) = ancestors.iter().rev().find(|a| a.is(Kind::Select)) else {
            return;
        };
        let source = select
            .child(Kind::From)
            .and_then(|from| from.child(Kind::Table))
            .and_then(Node::table);
        if let Some(table) = source.and_then(|t| symbols.get(&t.qualified_name())) {
            found = Some(Evidence::table(table.qualified_name()));
        }
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{check, triggered};

    #[test]
    fn test_partition_not_used() {
        let verdict = check(
            &PartitionNotUsed,
            "SELECT x FROM proj.ds.big WHERE other_col = 1"
        )
        .unwrap();
        assert!(verdict.triggered);
        assert_eq!(verdict.evidence, vec![Evidence::partition("proj.ds.big", "dt")]);
    }

    #[test]
    fn test_partition_used_unqualified() {
        let sql = "SELECT x FROM proj.ds.big WHERE dt = '2025-01-01'";
        assert!(!triggered(&PartitionNotUsed, sql));
    }

    #[test]
    fn test_partition_used_through_alias() {
        let sql = "SELECT x FROM proj.ds.big AS b WHERE b.DT >= '2025-01-01'";
        assert!(!triggered(&PartitionNotUsed, sql));
    }

    #[test]
    fn test_partition_in_join_condition() {
        let sql = "SELECT x FROM proj.ds.flat f JOIN proj.ds.big b ON b.dt = f.event_time";
        assert!(!triggered(&PartitionNotUsed, sql));
    }

    #[test]
    fn test_partition_qualified_with_other_table() {
        let sql = "SELECT x FROM proj.ds.big b JOIN proj.ds.flat f ON b.id = f.id WHERE f.dt > '2025-01-01'";
        assert!(triggered(&PartitionNotUsed, sql));
    }

    #[test]
    fn test_partition_evidence_deduplicated() {
        let sql = "SELECT x FROM proj.ds.big a JOIN proj.ds.big b ON a.id = b.id";
        let verdict = check(&PartitionNotUsed, sql).unwrap();
        assert_eq!(verdict.evidence.len(), 1);
    }

    #[test]
    fn test_small_partitioned_table_invisible() {
        assert!(!triggered(&PartitionNotUsed, "SELECT x FROM proj.ds.tiny"));
    }

    #[test]
    fn test_unpartitioned_tables() {
        let verdict = check(
            &UnpartitionedTables,
            "SELECT * FROM proj.ds.flat JOIN proj.ds.dim_country USING (id) JOIN proj.ds.big USING (id)"
        )
        .unwrap();
        assert_eq!(verdict.evidence, vec![Evidence::table("proj.ds.flat")]);
    }

    #[test]
    fn test_distinct_on_big_table() {
        assert!(triggered(&DistinctOnBigTable, "SELECT DISTINCT a FROM proj.ds.big"));
        assert!(triggered(&DistinctOnBigTable, "SELECT COUNT(DISTINCT a) FROM proj.ds.big"));
    }

    #[test]
    fn test_distinct_threshold() {
        assert!(triggered(&DistinctOnBigTable, "SELECT DISTINCT a FROM proj.ds.flat"));
        assert!(!triggered(&DistinctOnBigTable, "SELECT DISTINCT a FROM proj.ds.tiny"));
    }

    #[test]
    fn test_distinct_over_cte_not_resolved() {
        let sql = "WITH c AS (SELECT a FROM proj.ds.big) SELECT DISTINCT a FROM c";
        assert!(!triggered(&DistinctOnBigTable, sql));
    }

    #[test]
    fn test_count_distinct_on_big_table() {
        let sql = "SELECT COUNT(DISTINCT a) FROM proj.ds.big";
        let verdict = check(&CountDistinctOnBigTable, sql).unwrap();
        assert_eq!(verdict.evidence, vec![Evidence::table("proj.ds.big")]);
        assert!(!triggered(
            &CountDistinctOnBigTable,
            "SELECT DISTINCT a FROM proj.ds.big"
        ));
    }
}
