use crate::access::{Predicate, Rid, TableHeap, Tuple, Value};
use crate::catalog::{Catalog, Schema, TableInfo};
use crate::error::DbError;
use crate::recovery::{RecoveryStats, RedoRecovery};
use crate::storage::page::PageId;
use crate::storage::wal::{WalConfig, WalManager, WalRecord, MAX_INSERT_ROW_SIZE};
use crate::storage::PageManager;
use anyhow::Result;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Where the database keeps its files.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Data file holding heap and index pages.
    pub data_path: PathBuf,
    /// Write-ahead log file.
    pub wal_path: PathBuf,
    /// Sync the data file after every page write.
    pub sync_on_write: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("v2v-1.db"),
            wal_path: PathBuf::from("wal.log"),
            sync_on_write: true,
        }
    }
}

impl DatabaseConfig {
    /// `<base>.db` and `<base>.wal`.
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            data_path: base.with_extension("db"),
            wal_path: base.with_extension("wal"),
            ..Default::default()
        }
    }
}

/// High-level database interface that integrates all layers.
///
/// Opening runs redo recovery to completion before the handle is returned,
/// so no table is reachable while the log is being replayed.
pub struct Database {
    config: DatabaseConfig,
    store: Arc<PageManager>,
    wal: WalManager,
    catalog: Catalog,
    next_txn_id: AtomicI32,
    recovery_stats: RecoveryStats,
}

impl Database {
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let store = Arc::new(PageManager::open_with_options(
            &config.data_path,
            config.sync_on_write,
        )?);

        let recovery_stats = RedoRecovery::new(&store, &config.wal_path).run()?;
        let wal = WalManager::open(WalConfig::new(&config.wal_path))?;
        let next_txn_id = recovery_stats.max_txn_id.map_or(0, |id| id + 1);

        info!(
            "opened database {:?} ({} pages), next {}",
            config.data_path,
            store.num_pages()?,
            wal.next_lsn()
        );

        Ok(Self {
            config,
            store,
            wal,
            catalog: Catalog::new(),
            next_txn_id: AtomicI32::new(next_txn_id),
            recovery_stats,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PageManager> {
        &self.store
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery_stats
    }

    /// Allocate a new empty table and register it under `name`.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<TableInfo> {
        if self.catalog.contains(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()).into());
        }
        let heap = TableHeap::create(self.store.clone(), schema)?;
        let info = TableInfo::new(name, heap.first_page_id(), heap.schema().clone());
        self.catalog.register(info.clone())?;
        info!("created table {} at page {}", name, info.first_page_id);
        Ok(info)
    }

    /// Reattach an existing table, as loaded from a saved catalog.
    pub fn register_table(&self, name: &str, first_page_id: PageId, schema: Schema) -> Result<()> {
        self.catalog.register(TableInfo::new(name, first_page_id, schema))
    }

    pub fn open_table(&self, name: &str) -> Result<TableHeap> {
        let info = self.catalog.get(name)?;
        Ok(TableHeap::open(self.store.clone(), info.first_page_id, info.schema))
    }

    /// Registered tables, sorted by name.
    pub fn tables(&self) -> Vec<TableInfo> {
        self.catalog.list()
    }

    /// Forget a table. Its pages stay in the data file.
    pub fn drop_table(&self, name: &str) -> Result<TableInfo> {
        let info = self.catalog.remove(name)?;
        info!("dropped table {}", name);
        Ok(info)
    }

    /// Insert a row as its own logged transaction.
    ///
    /// The row is validated before anything is logged. `Begin` and the
    /// `Insert` record reach the log before the page is written; `Commit`
    /// follows once it has been.
    pub fn insert(&self, table: &str, tuple: &Tuple) -> Result<Rid> {
        let heap = self.open_table(table)?;
        heap.encode_row(tuple, MAX_INSERT_ROW_SIZE)?;

        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let begin_lsn = self.wal.append(&mut WalRecord::begin(txn_id))?;

        match heap.insert_logged(tuple, &self.wal, txn_id, begin_lsn) {
            Ok((rid, insert_lsn)) => {
                self.wal.append(&mut WalRecord::commit(txn_id, insert_lsn))?;
                self.wal.flush()?;
                Ok(rid)
            }
            Err(e) => {
                warn!("insert into {} failed, aborting txn {}: {:#}", table, txn_id, e);
                self.wal.append(&mut WalRecord::abort(txn_id, begin_lsn))?;
                self.wal.flush()?;
                Err(e)
            }
        }
    }

    /// Parse one literal per column and insert the row.
    pub fn insert_literals(&self, table: &str, literals: &[&str]) -> Result<Rid> {
        let schema = self.catalog.get(table)?.schema;
        if literals.len() != schema.column_count() {
            return Err(DbError::ColumnCountMismatch {
                expected: schema.column_count(),
                actual: literals.len(),
            }
            .into());
        }

        let values = literals
            .iter()
            .zip(schema.columns())
            .map(|(literal, column)| Value::parse(literal, column.data_type))
            .collect::<Result<Vec<_>>>()?;
        self.insert(table, &Tuple::new(values))
    }

    pub fn scan(&self, table: &str) -> Result<Vec<Tuple>> {
        self.open_table(table)?.scan()
    }

    pub fn fetch(&self, table: &str, rid: Rid) -> Result<Option<Tuple>> {
        self.open_table(table)?.fetch(rid)
    }

    pub fn delete(&self, table: &str, predicate: &Predicate) -> Result<usize> {
        self.open_table(table)?.delete(predicate)
    }

    pub fn update(
        &self,
        table: &str,
        predicate: &Predicate,
        set_column: &str,
        literal: &str,
    ) -> Result<usize> {
        self.open_table(table)?.update(predicate, set_column, literal)
    }

    /// Flush buffered log records.
    pub fn flush(&self) -> Result<()> {
        self.wal.flush()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best effort flush on drop
        if let Err(e) = self.flush() {
            warn!("failed to flush WAL on close: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::DataType;
    use crate::catalog::Column;
    use crate::storage::wal::{Lsn, WalRecordType};
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Varchar),
        ])
        .unwrap()
    }

    fn config(dir: &tempfile::TempDir) -> DatabaseConfig {
        DatabaseConfig::with_base(dir.path().join("test"))
    }

    #[test]
    fn test_config_paths() {
        let config = DatabaseConfig::with_base("/tmp/data/shop");
        assert_eq!(config.data_path, PathBuf::from("/tmp/data/shop.db"));
        assert_eq!(config.wal_path, PathBuf::from("/tmp/data/shop.wal"));
        assert!(config.sync_on_write);

        let default = DatabaseConfig::default();
        assert_eq!(default.data_path, PathBuf::from("v2v-1.db"));
        assert_eq!(default.wal_path, PathBuf::from("wal.log"));
    }

    #[test]
    fn test_create_and_open_table() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(config(&dir))?;

        let info = db.create_table("users", schema())?;
        assert_eq!(info.first_page_id, PageId(0));

        let heap = db.open_table("users")?;
        assert_eq!(heap.first_page_id(), PageId(0));
        assert_eq!(db.tables().len(), 1);
        Ok(())
    }

    #[test]
    fn test_table_errors() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(config(&dir))?;
        db.create_table("users", schema())?;

        let err = db.create_table("users", schema()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::TableAlreadyExists("users".to_string()))
        );

        let err = db.scan("nope").unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::TableNotFound("nope".to_string()))
        );

        db.drop_table("users")?;
        assert!(db.open_table("users").is_err());
        Ok(())
    }

    #[test]
    fn test_insert_logs_a_transaction() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(config(&dir))?;
        db.create_table("users", schema())?;

        let rid = db.insert_literals("users", &["1", "alice"])?;
        assert_eq!(
            db.fetch("users", rid)?,
            Some(Tuple::new(vec![
                Value::Integer(1),
                Value::Varchar("alice".to_string())
            ]))
        );

        let records = WalManager::read_records(&db.config().wal_path)?;
        let kinds: Vec<_> = records.iter().map(|r| r.record_type()).collect();
        assert_eq!(
            kinds,
            vec![
                WalRecordType::Begin,
                WalRecordType::Insert,
                WalRecordType::Commit
            ]
        );
        assert!(records.iter().all(|r| r.txn_id == 0));
        Ok(())
    }

    #[test]
    fn test_rejected_insert_logs_nothing() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::open(config(&dir))?;
        db.create_table("users", schema())?;

        let err = db.insert_literals("users", &["x", "alice"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::InvalidInteger("x".to_string()))
        );
        assert!(db.insert_literals("users", &["1"]).is_err());

        let long = "x".repeat(MAX_INSERT_ROW_SIZE);
        let err = db.insert_literals("users", &["1", long.as_str()]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::RowTooLarge { .. })
        ));

        assert!(WalManager::read_records(&db.config().wal_path)?.is_empty());
        assert!(db.scan("users")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_txn_ids_continue_after_reopen() -> Result<()> {
        let dir = tempdir()?;
        let first_page = {
            let db = Database::open(config(&dir))?;
            let info = db.create_table("users", schema())?;
            db.insert_literals("users", &["1", "a"])?;
            db.insert_literals("users", &["2", "b"])?;
            info.first_page_id
        };

        let db = Database::open(config(&dir))?;
        assert_eq!(db.recovery_stats().skipped_applied, 2);
        assert_eq!(db.recovery_stats().inserts_redone, 0);
        db.register_table("users", first_page, schema())?;
        db.insert_literals("users", &["3", "c"])?;

        let records = WalManager::read_records(&db.config().wal_path)?;
        let last = records.last().map(|r| (r.lsn, r.txn_id));
        assert_eq!(last, Some((Lsn(8), 2)));
        assert_eq!(db.scan("users")?.len(), 3);
        Ok(())
    }
}
