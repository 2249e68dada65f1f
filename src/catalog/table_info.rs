//! Table metadata handed to and from the external catalog file.

use crate::catalog::Schema;
use crate::storage::page::PageId;
use serde::{Deserialize, Serialize};

/// What the catalog saver needs to reattach a table: its name, the head of
/// its page chain and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub table_name: String,
    pub first_page_id: PageId,
    pub schema: Schema,
}

impl TableInfo {
    pub fn new(table_name: impl Into<String>, first_page_id: PageId, schema: Schema) -> Self {
        Self {
            table_name: table_name.into(),
            first_page_id,
            schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DataType;
    use crate::catalog::Column;
    use anyhow::Result;

    #[test]
    fn test_table_info_survives_catalog_encoding() -> Result<()> {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ])?;
        let info = TableInfo::new("users", PageId(3), schema);

        let bytes = bincode::serialize(&info)?;
        let decoded: TableInfo = bincode::deserialize(&bytes)?;
        assert_eq!(decoded, info);
        assert_eq!(decoded.schema.resolve("name")?, (1, DataType::Varchar));
        Ok(())
    }
}
