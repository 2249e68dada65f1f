//! Column and schema definitions.

use crate::access::value::DataType;
use crate::error::DbError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column list. Column order is row layout order.
///
/// Deserialization goes through the same duplicate-name check as `new`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct Schema {
    columns: Vec<Column>,
}

impl TryFrom<Vec<Column>> for Schema {
    type Error = DbError;

    fn try_from(columns: Vec<Column>) -> std::result::Result<Self, DbError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self { columns })
    }
}

impl From<Schema> for Vec<Column> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

impl Schema {
    /// Build a schema, rejecting duplicate column names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        Ok(Self::try_from(columns)?)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Index and type of `name`, or `DbError::UnknownColumn`.
    pub fn resolve(&self, name: &str) -> Result<(usize, DataType)> {
        self.column_index(name)
            .map(|i| (i, self.columns[i].data_type))
            .ok_or_else(|| DbError::UnknownColumn(name.to_string()).into())
    }

    pub fn data_types(&self) -> Vec<DataType> {
        self.columns.iter().map(|c| c.data_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() -> Result<()> {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ])?;

        assert_eq!(schema.column_count(), 2);
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
        assert_eq!(schema.resolve("id")?, (0, DataType::Integer));
        assert_eq!(
            schema.data_types(),
            vec![DataType::Integer, DataType::Varchar]
        );
        Ok(())
    }

    #[test]
    fn test_unknown_column() -> Result<()> {
        let schema = Schema::new(vec![Column::new("id", DataType::Integer)])?;
        let err = schema.resolve("age").unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::UnknownColumn("age".to_string()))
        );
        Ok(())
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("id", DataType::Varchar),
        ])
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::DuplicateColumn("id".to_string()))
        );
    }

    #[test]
    fn test_deserialized_schema_is_validated() -> Result<()> {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ])?;
        let bytes = bincode::serialize(&schema)?;
        assert_eq!(bincode::deserialize::<Schema>(&bytes)?, schema);

        let duplicated = vec![
            Column::new("id", DataType::Integer),
            Column::new("id", DataType::Varchar),
        ];
        let bytes = bincode::serialize(&duplicated)?;
        let err = bincode::deserialize::<Schema>(&bytes).unwrap_err();
        assert!(err.to_string().contains("id"));
        Ok(())
    }
}
