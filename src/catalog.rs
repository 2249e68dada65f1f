//! In-memory table registry.
//!
//! The registry maps table names to [`TableInfo`]. Persisting it is left to
//! the caller, which enumerates it with [`Catalog::list`] and rebuilds it
//! with [`Catalog::register`].

pub mod column;
pub mod table_info;

pub use column::{Column, Schema};
pub use table_info::TableInfo;

use crate::error::DbError;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<String, TableInfo>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, info: TableInfo) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(&info.table_name) {
            return Err(DbError::TableAlreadyExists(info.table_name).into());
        }
        tables.insert(info.table_name.clone(), info);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<TableInfo> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()).into())
    }

    pub fn remove(&self, name: &str) -> Result<TableInfo> {
        self.tables
            .write()
            .remove(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()).into())
    }

    /// All tables, sorted by name.
    pub fn list(&self) -> Vec<TableInfo> {
        let mut tables: Vec<TableInfo> = self.tables.read().values().cloned().collect();
        tables.sort_by(|a, b| a.table_name.cmp(&b.table_name));
        tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::value::DataType;
    use crate::storage::page::PageId;

    fn info(name: &str, page: i32) -> Result<TableInfo> {
        let schema = Schema::new(vec![Column::new("id", DataType::Integer)])?;
        Ok(TableInfo::new(name, PageId(page), schema))
    }

    #[test]
    fn test_register_and_get() -> Result<()> {
        let catalog = Catalog::new();
        catalog.register(info("users", 0)?)?;

        let users = catalog.get("users")?;
        assert_eq!(users.first_page_id, PageId(0));
        assert!(catalog.contains("users"));
        Ok(())
    }

    #[test]
    fn test_duplicate_table_name() -> Result<()> {
        let catalog = Catalog::new();
        catalog.register(info("users", 0)?)?;

        let err = catalog.register(info("users", 3)?).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::TableAlreadyExists("users".to_string()))
        );
        assert_eq!(catalog.get("users")?.first_page_id, PageId(0));
        Ok(())
    }

    #[test]
    fn test_missing_table() {
        let catalog = Catalog::new();
        let err = catalog.get("nope").unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::TableNotFound("nope".to_string()))
        );
        assert!(catalog.remove("nope").is_err());
    }

    #[test]
    fn test_list_tables() -> Result<()> {
        let catalog = Catalog::new();
        catalog.register(info("users", 0)?)?;
        catalog.register(info("orders", 1)?)?;
        catalog.register(info("products", 2)?)?;

        let names: Vec<String> = catalog.list().into_iter().map(|t| t.table_name).collect();
        assert_eq!(names, vec!["orders", "products", "users"]);

        catalog.remove("products")?;
        assert_eq!(catalog.list().len(), 2);
        Ok(())
    }
}
