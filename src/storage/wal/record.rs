//! WAL record types and their on-disk encoding.
//!
//! Every record starts with a 20-byte header; `Insert` records carry the
//! target page and the raw serialized row after it:
//!
//! ```text
//! | size (4) | lsn (4) | prev_lsn (4) | txn_id (4) | type (4) | [page_id (4) | len (4) | row] |
//! ```
//!
//! `size` covers the whole record, so a reader can walk a log by adding each
//! record's size to a cursor.

use crate::storage::error::StorageError;
use crate::storage::page::PageId;
use crate::storage::PAGE_SIZE;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

pub const RECORD_HEADER_SIZE: usize = 20;
const INSERT_PREFIX_SIZE: usize = 8;

/// Largest encoded record the log accepts; records are staged in a page-sized buffer.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE;

/// Largest row payload an `Insert` record can carry.
pub const MAX_INSERT_ROW_SIZE: usize = MAX_RECORD_SIZE - RECORD_HEADER_SIZE - INSERT_PREFIX_SIZE;

/// Log Sequence Number. Assigned at append time, starting at 0; `-1` means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn(pub i32);

impl Lsn {
    pub const INVALID: Lsn = Lsn(-1);

    pub fn next(&self) -> Self {
        Lsn(self.0 + 1)
    }

    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LSN({})", self.0)
    }
}

pub type TxnId = i32;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalRecordType {
    Invalid = 0,
    Insert = 1,
    Commit = 2,
    Abort = 3,
    Begin = 4,
}

impl WalRecordType {
    fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(WalRecordType::Invalid),
            1 => Some(WalRecordType::Insert),
            2 => Some(WalRecordType::Commit),
            3 => Some(WalRecordType::Abort),
            4 => Some(WalRecordType::Begin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecordPayload {
    Begin,
    Insert { page_id: PageId, row: Vec<u8> },
    Commit,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub lsn: Lsn,
    pub prev_lsn: Lsn,
    pub txn_id: TxnId,
    pub payload: WalRecordPayload,
}

impl WalRecord {
    fn with_payload(txn_id: TxnId, prev_lsn: Lsn, payload: WalRecordPayload) -> Self {
        Self {
            lsn: Lsn::INVALID,
            prev_lsn,
            txn_id,
            payload,
        }
    }

    pub fn begin(txn_id: TxnId) -> Self {
        Self::with_payload(txn_id, Lsn::INVALID, WalRecordPayload::Begin)
    }

    pub fn insert(txn_id: TxnId, prev_lsn: Lsn, page_id: PageId, row: Vec<u8>) -> Self {
        Self::with_payload(txn_id, prev_lsn, WalRecordPayload::Insert { page_id, row })
    }

    pub fn commit(txn_id: TxnId, prev_lsn: Lsn) -> Self {
        Self::with_payload(txn_id, prev_lsn, WalRecordPayload::Commit)
    }

    pub fn abort(txn_id: TxnId, prev_lsn: Lsn) -> Self {
        Self::with_payload(txn_id, prev_lsn, WalRecordPayload::Abort)
    }

    pub fn record_type(&self) -> WalRecordType {
        match self.payload {
            WalRecordPayload::Begin => WalRecordType::Begin,
            WalRecordPayload::Insert { .. } => WalRecordType::Insert,
            WalRecordPayload::Commit => WalRecordType::Commit,
            WalRecordPayload::Abort => WalRecordType::Abort,
        }
    }

    /// Encoded length in bytes, the value stored in the `size` field.
    pub fn size(&self) -> usize {
        match &self.payload {
            WalRecordPayload::Insert { row, .. } => {
                RECORD_HEADER_SIZE + INSERT_PREFIX_SIZE + row.len()
            }
            _ => RECORD_HEADER_SIZE,
        }
    }

    /// Encode into the front of `dest`, returning the number of bytes written.
    pub fn serialize_into(&self, dest: &mut [u8]) -> Result<usize, StorageError> {
        let size = self.size();
        if size > MAX_RECORD_SIZE || size > dest.len() {
            return Err(StorageError::RecordTooLarge {
                size,
                max: MAX_RECORD_SIZE.min(dest.len()),
            });
        }

        LittleEndian::write_i32(&mut dest[0..], size as i32);
        LittleEndian::write_i32(&mut dest[4..], self.lsn.0);
        LittleEndian::write_i32(&mut dest[8..], self.prev_lsn.0);
        LittleEndian::write_i32(&mut dest[12..], self.txn_id);
        LittleEndian::write_i32(&mut dest[16..], self.record_type() as i32);

        if let WalRecordPayload::Insert { page_id, row } = &self.payload {
            LittleEndian::write_i32(&mut dest[20..], page_id.0);
            LittleEndian::write_i32(&mut dest[24..], row.len() as i32);
            dest[28..28 + row.len()].copy_from_slice(row);
        }

        Ok(size)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; self.size()];
        self.serialize_into(&mut buf)?;
        Ok(buf)
    }

    /// Decode the record at the front of `data`, returning it with its size.
    ///
    /// `offset` is only used to label errors.
    pub fn deserialize(data: &[u8], offset: usize) -> Result<(Self, usize), StorageError> {
        let corrupt = |reason: String| StorageError::CorruptLogRecord { offset, reason };

        if data.len() < RECORD_HEADER_SIZE {
            return Err(corrupt(format!(
                "truncated header: {} of {} bytes",
                data.len(),
                RECORD_HEADER_SIZE
            )));
        }

        let size = LittleEndian::read_i32(&data[0..]);
        if size < RECORD_HEADER_SIZE as i32 || size as usize > data.len() {
            return Err(corrupt(format!(
                "record size {} with {} bytes remaining",
                size,
                data.len()
            )));
        }
        let size = size as usize;

        let lsn = Lsn(LittleEndian::read_i32(&data[4..]));
        let prev_lsn = Lsn(LittleEndian::read_i32(&data[8..]));
        let txn_id = LittleEndian::read_i32(&data[12..]);
        let raw_type = LittleEndian::read_i32(&data[16..]);
        let record_type = WalRecordType::from_i32(raw_type)
            .ok_or_else(|| corrupt(format!("unknown record type {}", raw_type)))?;

        let payload = match record_type {
            WalRecordType::Begin => WalRecordPayload::Begin,
            WalRecordType::Commit => WalRecordPayload::Commit,
            WalRecordType::Abort => WalRecordPayload::Abort,
            WalRecordType::Insert => {
                if size < RECORD_HEADER_SIZE + INSERT_PREFIX_SIZE {
                    return Err(corrupt(format!("insert record of {} bytes", size)));
                }
                let page_id = PageId(LittleEndian::read_i32(&data[20..]));
                let len = LittleEndian::read_i32(&data[24..]);
                if len < 0 || RECORD_HEADER_SIZE + INSERT_PREFIX_SIZE + len as usize != size {
                    return Err(corrupt(format!(
                        "row length {} inconsistent with record size {}",
                        len, size
                    )));
                }
                let start = RECORD_HEADER_SIZE + INSERT_PREFIX_SIZE;
                WalRecordPayload::Insert {
                    page_id,
                    row: data[start..size].to_vec(),
                }
            }
            WalRecordType::Invalid => return Err(corrupt("invalid record type".to_string())),
        };

        Ok((
            WalRecord {
                lsn,
                prev_lsn,
                txn_id,
                payload,
            },
            size,
        ))
    }
}
