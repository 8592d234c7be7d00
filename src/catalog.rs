//! Table catalog: per-table size, partition and date-column metadata.
//!
//! The catalog is a read-only snapshot loaded once per run and shared by
//! reference across every job. Entries are keyed by fully qualified name
//! (`project.dataset.table`) in a `BTreeMap`, so wildcard matching walks them
//! in lexicographic order.
//!
//! # File Format
//!
//! JSON (`.json`) or YAML (`.yaml`, `.yml`); unknown extensions are read as
//! JSON.
//!
//! ```json
//! {
//!   "proj.ds.events_20240101": {
//!     "table": "events_20240101",
//!     "total_rows": 50000,
//!     "partitioned_column": "event_date",
//!     "datetime_columns": ["event_date", "created_at"]
//!   }
//! }
//! ```

use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppResult, catalog_error, file_read_error};

/// Metadata about a single warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCatalogEntry {
    /// Fully qualified name, `project.dataset.table`
    pub qualified_name:   CompactString,
    /// Bare table name, used for the `dim_` naming convention
    pub short_name:       CompactString,
    pub total_rows:       u64,
    pub partition_column: Option<CompactString>,
    pub datetime_columns: IndexSet<CompactString>
}

impl TableCatalogEntry {
    pub fn new(qualified_name: impl Into<CompactString>, total_rows: u64) -> Self {
        let qualified_name = qualified_name.into();
        let short_name = short_name_of(&qualified_name);
        Self {
            qualified_name,
            short_name,
            total_rows,
            partition_column: None,
            datetime_columns: IndexSet::new()
        }
    }

    #[must_use]
    pub fn with_partition(mut self, column: impl Into<CompactString>) -> Self {
        self.partition_column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_datetime_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>
    {
        self.datetime_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_short_name(mut self, name: impl Into<CompactString>) -> Self {
        self.short_name = name.into();
        self
    }

    /// Whether `column` is a date/time column or the partition column.
    pub fn has_date_column(&self, column: &str) -> bool {
        self.datetime_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column))
            || self.is_partition_column(column)
    }

    pub fn is_partition_column(&self, column: &str) -> bool {
        self.partition_column
            .as_deref()
            .is_some_and(|p| p.eq_ignore_ascii_case(column))
    }

    /// Dimension tables follow the `dim_` prefix convention.
    pub fn is_dimension(&self) -> bool {
        self.short_name
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("dim_"))
    }
}

/// Record shape of the catalog file.
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(default)]
    table:              Option<CompactString>,
    total_rows:         u64,
    #[serde(default)]
    partitioned_column: Option<CompactString>,
    #[serde(default)]
    datetime_columns:   Vec<CompactString>
}

/// Read-only snapshot of table metadata.
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    entries: BTreeMap<CompactString, Arc<TableCatalogEntry>>
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = TableCatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    pub fn insert(&mut self, entry: TableCatalogEntry) {
        self.entries
            .insert(entry.qualified_name.clone(), Arc::new(entry));
    }

    /// Load a catalog file, picking the format by extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> AppResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
        let catalog = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content)?,
            _ => Self::from_json_str(&content)?
        };
        debug!(path = %path.display(), tables = catalog.len(), "loaded table catalog");
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let records: BTreeMap<CompactString, CatalogRecord> =
            serde_json::from_str(content).map_err(|e| catalog_error(e.to_string()))?;
        Ok(Self::from_records(records))
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let records: BTreeMap<CompactString, CatalogRecord> =
            serde_yaml::from_str(content).map_err(|e| catalog_error(e.to_string()))?;
        Ok(Self::from_records(records))
    }

    fn from_records(records: BTreeMap<CompactString, CatalogRecord>) -> Self {
        Self::from_entries(records.into_iter().map(|(name, record)| {
            let mut entry = TableCatalogEntry::new(name, record.total_rows)
                .with_datetime_columns(record.datetime_columns);
            if let Some(short) = record.table {
                entry = entry.with_short_name(short);
            }
            entry.partition_column = record.partitioned_column.filter(|c| !c.is_empty());
            entry
        }))
    }

    pub fn get(&self, qualified_name: &str) -> Option<&Arc<TableCatalogEntry>> {
        self.entries.get(qualified_name)
    }

    /// Entries whose qualified name contains the literal prefix before the
    /// first `*` of `pattern`, in lexicographic order.
    pub fn matching_wildcard<'a>(
        &'a self,
        pattern: &'a str
    ) -> impl Iterator<Item = &'a Arc<TableCatalogEntry>> + 'a {
        let prefix = pattern.split('*').next().unwrap_or_default();
        self.entries
            .iter()
            .filter(move |(name, _)| name.contains(prefix))
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TableCatalogEntry>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn short_name_of(qualified: &str) -> CompactString {
    CompactString::from(qualified.rsplit('.').next().unwrap_or(qualified))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults_short_name() {
        let entry = TableCatalogEntry::new("p.d.dim_users", 10);
        assert_eq!(entry.short_name, "dim_users");
        assert!(entry.is_dimension());
        assert!(!TableCatalogEntry::new("p.d.users_dim_", 10).is_dimension());
    }

    #[test]
    fn test_entry_date_columns_case_insensitive() {
        let entry = TableCatalogEntry::new("p.d.t", 10)
            .with_partition("DT")
            .with_datetime_columns(["created_at"]);
        assert!(entry.has_date_column("dt"));
        assert!(entry.has_date_column("CREATED_AT"));
        assert!(!entry.has_date_column("id"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "p.d.events": {"table": "events", "total_rows": 5000, "partitioned_column": "dt", "datetime_columns": ["dt"]},
            "p.d.users": {"total_rows": 10}
        }"#;
        let catalog = TableCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        let events = catalog.get("p.d.events").unwrap();
        assert_eq!(events.partition_column.as_deref(), Some("dt"));
        let users = catalog.get("p.d.users").unwrap();
        assert_eq!(users.short_name, "users");
        assert!(users.partition_column.is_none());
    }

    #[test]
    fn test_from_yaml_empty_partition_is_none() {
        let yaml = "p.d.t:\n  table: t\n  total_rows: 7\n  partitioned_column: ''\n";
        let catalog = TableCatalog::from_yaml_str(yaml).unwrap();
        assert!(catalog.get("p.d.t").unwrap().partition_column.is_none());
    }

    #[test]
    fn test_invalid_json() {
        assert!(TableCatalog::from_json_str("{\"p.d.t\": {}}").is_err());
    }

    #[test]
    fn test_wildcard_matches_in_order() {
        let catalog = TableCatalog::from_entries([
            TableCatalogEntry::new("p.d.events_2", 2),
            TableCatalogEntry::new("p.d.events_1", 1),
            TableCatalogEntry::new("p.d.other", 3),
        ]);
        let names: Vec<_> = catalog
            .matching_wildcard("p.d.events_*")
            .map(|e| e.qualified_name.as_str())
            .collect();
        assert_eq!(names, vec!["p.d.events_1", "p.d.events_2"]);
    }
}
