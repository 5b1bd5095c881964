use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{SqlError, SqlResult};
use crate::types::DataType;

/// Column definition in a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

/// Table schema metadata. Columns keep their declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    /// Find column index by name (case-insensitive).
    pub fn find_column(&self, name: &str) -> Option<usize> {
        let lower = name.to_lowercase();
        self.columns
            .iter()
            .position(|c| c.name.to_lowercase() == lower)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Read-only table metadata service consumed by the binder.
///
/// The binder performs a fresh lookup per reference; implementations
/// are expected to make lookups cheap.
pub trait Catalog {
    /// Look up a table by name, returning `None` when absent.
    fn try_table(&self, name: &str) -> Option<&TableDef>;

    /// Look up a table by name, failing when absent.
    fn table(&self, name: &str) -> SqlResult<&TableDef> {
        self.try_table(name)
            .ok_or_else(|| SqlError::UnknownTable(name.to_string()))
    }

    /// Ordered column definitions of a table.
    fn table_cols(&self, name: &str) -> SqlResult<&[ColumnDef]> {
        Ok(&self.table(name)?.columns)
    }
}

/// In-memory catalog keyed by lowercase table name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCatalog {
    tables: HashMap<String, TableDef>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableDef) {
        let key = table.name.to_lowercase();
        self.tables.insert(key, table);
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl Catalog for MemoryCatalog {
    fn try_table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(&name.to_lowercase())
    }
}

#[cfg(test)]
mod catalog_tests {
    use super::*;

    fn users() -> TableDef {
        TableDef {
            name: "users".into(),
            columns: vec![
                ColumnDef { name: "id".into(), data_type: DataType::Int },
                ColumnDef { name: "name".into(), data_type: DataType::Varchar(32) },
            ],
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_table(users());
        assert!(catalog.try_table("USERS").is_some());
        assert_eq!(catalog.table("Users").unwrap().num_columns(), 2);
    }

    #[test]
    fn test_missing_table_fails() {
        let catalog = MemoryCatalog::new();
        let err = catalog.table("ghost").unwrap_err();
        assert_eq!(err, SqlError::UnknownTable("ghost".into()));
    }

    #[test]
    fn test_table_cols_preserve_order() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_table(users());
        let cols = catalog.table_cols("users").unwrap();
        assert_eq!(cols[0].name, "id");
        assert_eq!(cols[1].name, "name");
        assert_eq!(users().find_column("NAME"), Some(1));
        assert_eq!(users().find_column("ghost"), None);
    }
}
