//! Per-statement symbol resolution against the table catalog.
//!
//! [`resolve`] walks every `FROM`/`JOIN` clause of a lowered statement and
//! maps each qualified table reference (and its alias) to the catalog entry
//! backing it. Only tables at or above the row-count threshold are admitted,
//! so size-sensitive rules see exactly the "big" tables of the statement.
//!
//! The resulting [`SymbolTable`] lives for one statement and is discarded
//! after evaluation.

use std::{collections::HashSet, sync::Arc};

use compact_str::CompactString;
use indexmap::IndexMap;
use tracing::trace;

use crate::{
    ast::{ColumnRef, Kind, Node, TableRef},
    catalog::{TableCatalog, TableCatalogEntry}
};

/// A table reference bound to its catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTable {
    /// Qualified name or alias used as the lookup key
    pub reference_name: CompactString,
    pub entry:          Arc<TableCatalogEntry>,
    pub is_alias:       bool
}

impl ResolvedTable {
    /// Name reported in evidence: the reference as written for qualified
    /// keys, so wildcard patterns stay visible.
    pub fn qualified_name(&self) -> &str {
        if self.is_alias {
            &self.entry.qualified_name
        } else {
            &self.reference_name
        }
    }
}

/// Mapping from reference name to resolved table, scoped to one statement.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    tables: IndexMap<CompactString, ResolvedTable>
}

impl SymbolTable {
    /// Exact lookup first, then a case-insensitive scan.
    pub fn get(&self, name: &str) -> Option<&ResolvedTable> {
        self.tables.get(name).or_else(|| {
            self.tables
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, table)| table)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Entries registered under their qualified name.
    pub fn tables(&self) -> impl Iterator<Item = &ResolvedTable> {
        self.tables.values().filter(|t| !t.is_alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn register(&mut self, reference_name: &str, entry: &Arc<TableCatalogEntry>, is_alias: bool) {
        let key = CompactString::from(reference_name);
        self.tables.entry(key.clone()).or_insert(ResolvedTable {
            reference_name: key,
            entry: Arc::clone(entry),
            is_alias
        });
    }
}

/// Build the symbol table of one statement.
///
/// Unqualified references, CTE names and references whose summed row count
/// is below `min_rows` are left out.
pub fn resolve(root: &Node, catalog: &TableCatalog, min_rows: u64) -> SymbolTable {
    let ctes = cte_names(root);
    let mut symbols = SymbolTable::default();
    for table in referenced_tables(root) {
        if !table.is_qualified() || shadowed_by_cte(table, &ctes) {
            continue;
        }
        let qualified = table.qualified_name();
        let Some(entry) = lookup(catalog, &qualified) else {
            continue;
        };
        if entry.total_rows < min_rows {
            trace!(table = %qualified, rows = entry.total_rows, "below size threshold");
            continue;
        }
        symbols.register(&qualified, &entry, false);
        if let Some(alias) = &table.alias {
            symbols.register(alias, &entry, true);
        }
    }
    symbols
}

/// Table references in every `FROM`/`JOIN` clause, in document order.
pub fn referenced_tables(root: &Node) -> Vec<&TableRef> {
    root.find_all_by(|n: &Node| matches!(n.kind, Kind::From | Kind::Join))
        .into_iter()
        .flat_map(|clause| clause.children.iter())
        .filter_map(Node::table)
        .collect()
}

/// Lower-cased aliases of every CTE defined in the statement.
pub fn cte_names(root: &Node) -> HashSet<String> {
    root.find_all(Kind::Cte)
        .into_iter()
        .filter_map(Node::name)
        .map(str::to_ascii_lowercase)
        .collect()
}

fn shadowed_by_cte(table: &TableRef, ctes: &HashSet<String>) -> bool {
    ctes.contains(&table.qualified_name().to_ascii_lowercase())
        || table
            .alias
            .as_ref()
            .is_some_and(|alias| ctes.contains(alias.to_ascii_lowercase().as_str()))
}

/// Catalog entry for a name, aggregating wildcard shards.
///
/// Shards are visited in lexicographic order: row counts are summed and the
/// partition/date metadata of the last shard wins.
fn lookup(catalog: &TableCatalog, qualified: &str) -> Option<Arc<TableCatalogEntry>> {
    if !qualified.contains('*') {
        return catalog.get(qualified).cloned();
    }
    let mut total_rows = 0u64;
    let mut last: Option<&Arc<TableCatalogEntry>> = None;
    for shard in catalog.matching_wildcard(qualified) {
        total_rows = total_rows.saturating_add(shard.total_rows);
        last = Some(shard);
    }
    let last = last?;
    let mut entry = TableCatalogEntry::new(qualified, total_rows)
        .with_datetime_columns(last.datetime_columns.iter().cloned())
        .with_short_name(last.short_name.clone());
    entry.partition_column = last.partition_column.clone();
    Some(Arc::new(entry))
}

/// Table identifier a column is qualified with, if any.
///
/// `t.col` names `t`, `ds.t.col` names `ds.t` and `p.ds.t.col` names
/// `p.ds.t`. A bare column is ambiguous and yields `None`.
pub fn resolve_column(column: &ColumnRef) -> (&str, Option<String>) {
    let table = match column.qualifiers() {
        [] => None,
        [table] => Some(table.to_string()),
        [dataset, table] => Some(format!("{}.{}", dataset, table)),
        [.., project, dataset, table] => Some(format!("{}.{}.{}", project, dataset, table))
    };
    (column.name(), table)
}
