//! WAL manager implementation.
//!
//! The WAL manager assigns LSNs, stages encoded records in an in-memory
//! buffer, and appends the buffer to the log file on `flush`.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::BytesMut;
use log::{debug, warn};
use parking_lot::Mutex;

use super::record::{Lsn, WalRecord, MAX_RECORD_SIZE};
use crate::storage::error::StorageError;

/// Default capacity of the in-memory WAL buffer (1MB).
const WAL_BUFFER_SIZE: usize = 1024 * 1024;

/// WAL manager configuration.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Path of the append-only log file.
    pub path: PathBuf,
    /// Bytes buffered before an append forces a flush.
    pub buffer_capacity: usize,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            path: PathBuf::from("wal.log"),
            buffer_capacity: WAL_BUFFER_SIZE,
        }
    }
}

impl WalConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WalConfig {
            path: path.into(),
            ..Default::default()
        }
    }
}

struct WalState {
    file: File,
    buffer: BytesMut,
    staging: Box<[u8; MAX_RECORD_SIZE]>,
    next_lsn: Lsn,
    persistent_lsn: Lsn,
}

/// Write-ahead log over a single append-only file.
///
/// `append` and `flush` run under one exclusive lock. Records are never
/// rewritten once they reach the file.
pub struct WalManager {
    config: WalConfig,
    state: Mutex<WalState>,
}

impl WalManager {
    /// Open (or create) the log file.
    ///
    /// LSNs continue after the highest one already in the file so that they
    /// stay monotonic across restarts; a fresh log starts at 0.
    pub fn open(config: WalConfig) -> Result<Self> {
        let (existing, valid_len) = Self::scan_log(&config.path)?;
        let last_lsn = existing.iter().map(|r| r.lsn).max().unwrap_or(Lsn::INVALID);

        Self::truncate_torn_tail(&config.path, valid_len)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .with_context(|| format!("Failed to open WAL file: {:?}", config.path))?;

        debug!(
            "opened WAL {:?} with {} records, next {}",
            config.path,
            existing.len(),
            last_lsn.next()
        );

        let state = WalState {
            file,
            buffer: BytesMut::with_capacity(config.buffer_capacity),
            staging: Box::new([0u8; MAX_RECORD_SIZE]),
            next_lsn: last_lsn.next(),
            persistent_lsn: last_lsn,
        };

        Ok(WalManager {
            config,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Assign the next LSN to `record`, encode it and buffer it.
    ///
    /// Nothing reaches the file until `flush`, unless the buffer would
    /// overflow its configured capacity.
    pub fn append(&self, record: &mut WalRecord) -> Result<Lsn> {
        let mut state = self.state.lock();

        let size = record.size();
        if size > MAX_RECORD_SIZE {
            return Err(StorageError::RecordTooLarge {
                size,
                max: MAX_RECORD_SIZE,
            }
            .into());
        }

        record.lsn = state.next_lsn;
        let state = &mut *state;
        let written = record.serialize_into(&mut state.staging[..])?;

        if !state.buffer.is_empty() && state.buffer.len() + written > self.config.buffer_capacity {
            Self::flush_locked(state)?;
        }

        state.buffer.extend_from_slice(&state.staging[..written]);
        state.next_lsn = state.next_lsn.next();

        Ok(record.lsn)
    }

    /// Append the buffered records to the log file and sync it.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::flush_locked(&mut state)
    }

    fn flush_locked(state: &mut WalState) -> Result<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }

        state
            .file
            .write_all(&state.buffer)
            .context("Failed to append to WAL")?;
        state.file.sync_data().context("Failed to sync WAL")?;

        debug!(
            "flushed {} WAL bytes through LSN {}",
            state.buffer.len(),
            state.next_lsn.0 - 1
        );
        state.persistent_lsn = Lsn(state.next_lsn.0 - 1);
        state.buffer.clear();

        Ok(())
    }

    /// The LSN the next appended record will receive.
    pub fn next_lsn(&self) -> Lsn {
        self.state.lock().next_lsn
    }

    /// Highest LSN known to be in the log file.
    pub fn persistent_lsn(&self) -> Lsn {
        self.state.lock().persistent_lsn
    }

    /// Bytes appended but not yet flushed.
    pub fn buffered_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Read every complete record from the log at `path`.
    ///
    /// A missing or empty file yields no records. A torn or corrupt record
    /// ends the log: it and anything after it are reported and ignored.
    pub fn read_records(path: &Path) -> Result<Vec<WalRecord>> {
        Ok(Self::scan_log(path)?.0)
    }

    /// Cut the file back to its last complete record, so records appended
    /// after a crash follow directly on the readable prefix.
    fn truncate_torn_tail(path: &Path, valid_len: u64) -> Result<()> {
        let Some(file_len) = std::fs::metadata(path).ok().map(|m| m.len()) else {
            return Ok(());
        };
        if file_len <= valid_len {
            return Ok(());
        }

        warn!(
            "truncating WAL {:?} from {} to {} bytes to drop a torn tail",
            path, file_len, valid_len
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open WAL file for truncation: {:?}", path))?;
        file.set_len(valid_len)
            .context("Failed to truncate WAL torn tail")?;
        file.sync_all().context("Failed to sync truncated WAL")?;
        Ok(())
    }

    /// Complete records plus the byte length of the readable prefix.
    fn scan_log(path: &Path) -> Result<(Vec<WalRecord>, u64)> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read WAL file: {:?}", path))
            }
        };

        let mut records = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            match WalRecord::deserialize(&data[offset..], offset) {
                Ok((record, size)) => {
                    records.push(record);
                    offset += size;
                }
                Err(e) => {
                    warn!(
                        "stopping WAL read at offset {} of {}: {}",
                        offset,
                        data.len(),
                        e
                    );
                    break;
                }
            }
        }

        Ok((records, offset as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wal::record::WalRecordPayload;
    use crate::storage::PageId;
    use tempfile::TempDir;

    fn create_test_wal_manager() -> Result<(WalManager, TempDir)> {
        let temp_dir = TempDir::new()?;
        let manager = WalManager::open(WalConfig::new(temp_dir.path().join("wal.log")))?;
        Ok((manager, temp_dir))
    }

    #[test]
    fn test_lsn_starts_at_zero() -> Result<()> {
        let (manager, _temp_dir) = create_test_wal_manager()?;

        assert_eq!(manager.next_lsn(), Lsn(0));
        assert_eq!(manager.persistent_lsn(), Lsn::INVALID);

        let lsn0 = manager.append(&mut WalRecord::begin(1))?;
        let lsn1 = manager.append(&mut WalRecord::commit(1, lsn0))?;
        assert_eq!(lsn0, Lsn(0));
        assert_eq!(lsn1, Lsn(1));

        Ok(())
    }

    #[test]
    fn test_append_is_buffered_until_flush() -> Result<()> {
        let (manager, _temp_dir) = create_test_wal_manager()?;

        manager.append(&mut WalRecord::begin(1))?;
        assert_eq!(manager.buffered_len(), 20);
        assert!(WalManager::read_records(manager.path())?.is_empty());

        manager.flush()?;
        assert_eq!(manager.buffered_len(), 0);
        assert_eq!(manager.persistent_lsn(), Lsn(0));
        assert_eq!(WalManager::read_records(manager.path())?.len(), 1);

        Ok(())
    }

    #[test]
    fn test_write_and_read_records() -> Result<()> {
        let (manager, _temp_dir) = create_test_wal_manager()?;

        let mut begin = WalRecord::begin(1);
        let lsn1 = manager.append(&mut begin)?;
        let mut insert = WalRecord::insert(1, lsn1, PageId(10), b"payload".to_vec());
        let lsn2 = manager.append(&mut insert)?;
        let mut commit = WalRecord::commit(1, lsn2);
        manager.append(&mut commit)?;
        manager.flush()?;

        let records = WalManager::read_records(manager.path())?;
        assert_eq!(records, vec![begin, insert, commit]);
        assert_eq!(
            records[1].payload,
            WalRecordPayload::Insert {
                page_id: PageId(10),
                row: b"payload".to_vec()
            }
        );

        Ok(())
    }

    #[test]
    fn test_flush_appends() -> Result<()> {
        let (manager, _temp_dir) = create_test_wal_manager()?;

        manager.append(&mut WalRecord::begin(1))?;
        manager.flush()?;
        manager.append(&mut WalRecord::begin(2))?;
        manager.flush()?;
        manager.flush()?;

        let records = WalManager::read_records(manager.path())?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].txn_id, 1);
        assert_eq!(records[1].txn_id, 2);

        Ok(())
    }

    #[test]
    fn test_lsn_continues_after_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("wal.log");

        {
            let manager = WalManager::open(WalConfig::new(&path))?;
            for txn in 0..3 {
                manager.append(&mut WalRecord::begin(txn))?;
            }
            manager.flush()?;
        }

        let manager = WalManager::open(WalConfig::new(&path))?;
        assert_eq!(manager.persistent_lsn(), Lsn(2));
        assert_eq!(manager.append(&mut WalRecord::begin(9))?, Lsn(3));

        Ok(())
    }

    #[test]
    fn test_buffer_overflow_forces_flush() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = WalConfig {
            path: temp_dir.path().join("wal.log"),
            buffer_capacity: 50,
        };
        let manager = WalManager::open(config)?;

        manager.append(&mut WalRecord::begin(1))?;
        manager.append(&mut WalRecord::begin(2))?;
        assert!(WalManager::read_records(manager.path())?.is_empty());

        // The third record would exceed 50 bytes, so the first two are written out.
        manager.append(&mut WalRecord::begin(3))?;
        assert_eq!(WalManager::read_records(manager.path())?.len(), 2);
        assert_eq!(manager.buffered_len(), 20);

        Ok(())
    }

    #[test]
    fn test_oversized_record_rejected() -> Result<()> {
        let (manager, _temp_dir) = create_test_wal_manager()?;

        let mut record = WalRecord::insert(1, Lsn(0), PageId(0), vec![0; MAX_RECORD_SIZE]);
        assert!(manager.append(&mut record).is_err());
        assert_eq!(manager.next_lsn(), Lsn(0));
        assert_eq!(manager.buffered_len(), 0);

        Ok(())
    }

    #[test]
    fn test_torn_tail_is_ignored() -> Result<()> {
        let (manager, _temp_dir) = create_test_wal_manager()?;

        manager.append(&mut WalRecord::begin(1))?;
        manager.append(&mut WalRecord::insert(1, Lsn(0), PageId(0), vec![1; 32]))?;
        manager.flush()?;

        let full = std::fs::read(manager.path())?;
        std::fs::write(manager.path(), &full[..full.len() - 5])?;

        let records = WalManager::read_records(manager.path())?;
        assert_eq!(records.len(), 1);

        Ok(())
    }

    #[test]
    fn test_reopen_drops_torn_tail_before_appending() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("wal.log");

        let begin_lsn = {
            let manager = WalManager::open(WalConfig::new(&path))?;
            let lsn = manager.append(&mut WalRecord::begin(1))?;
            manager.flush()?;
            lsn
        };
        let clean_len = std::fs::metadata(&path)?.len();

        let mut torn = std::fs::read(&path)?;
        torn.extend_from_slice(&[0xAB; 6]);
        std::fs::write(&path, &torn)?;

        let manager = WalManager::open(WalConfig::new(&path))?;
        assert_eq!(std::fs::metadata(&path)?.len(), clean_len);

        let mut insert = WalRecord::insert(1, begin_lsn, PageId(0), b"row".to_vec());
        manager.append(&mut insert)?;
        manager.flush()?;

        let records = WalManager::read_records(&path)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], insert);

        Ok(())
    }

    #[test]
    fn test_missing_log_reads_empty() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(WalManager::read_records(&temp_dir.path().join("none.log"))?.is_empty());
        Ok(())
    }
}
