use crate::access::value::Value;
use crate::catalog::Schema;
use crate::error::DbError;
use crate::storage::page::PageId;
use anyhow::{bail, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row locator: a heap page and the row's position within it.
///
/// Ordered by page, then slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rid {
    pub page_id: PageId,
    pub slot: u32,
}

impl Rid {
    /// Encoded size inside a B+Tree leaf entry.
    pub const SIZE: usize = 8;

    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        LittleEndian::write_i32(&mut bytes[0..4], self.page_id.0);
        LittleEndian::write_u32(&mut bytes[4..8], self.slot);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            page_id: PageId(LittleEndian::read_i32(&bytes[0..4])),
            slot: LittleEndian::read_u32(&bytes[4..8]),
        }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RID({}, {})", self.page_id, self.slot)
    }
}

/// A row: values in schema column order.
///
/// Encoded as `count: u32` followed by each value's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of this row with the value at `index` replaced.
    pub fn with_value(&self, index: usize, value: Value) -> Tuple {
        let mut values = self.values.clone();
        values[index] = value;
        Tuple { values }
    }

    pub fn serialized_size(&self) -> usize {
        4 + self.values.iter().map(Value::serialized_size).sum::<usize>()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        let mut count = [0u8; 4];
        LittleEndian::write_u32(&mut count, self.values.len() as u32);
        out.extend_from_slice(&count);
        for value in &self.values {
            value.serialize_into(&mut out);
        }
        out
    }

    /// Decode one row from the front of `data`, returning it with the number
    /// of bytes consumed.
    pub fn deserialize(data: &[u8], schema: &Schema) -> Result<(Tuple, usize)> {
        if data.len() < 4 {
            bail!("Invalid row: need 4 bytes for column count, {} available", data.len());
        }

        let count = LittleEndian::read_u32(data) as usize;
        if count != schema.column_count() {
            bail!(
                "Invalid row: stored column count {} does not match schema ({})",
                count,
                schema.column_count()
            );
        }

        let mut offset = 4;
        let mut values = Vec::with_capacity(count);
        for column in schema.columns() {
            let (value, consumed) = Value::deserialize(&data[offset..], column.data_type)?;
            values.push(value);
            offset += consumed;
        }

        Ok((Tuple { values }, offset))
    }

    /// Check value count and per-column types against `schema`.
    pub fn check_schema(&self, schema: &Schema) -> Result<()> {
        if self.values.len() != schema.column_count() {
            return Err(DbError::ColumnCountMismatch {
                expected: schema.column_count(),
                actual: self.values.len(),
            }
            .into());
        }

        for (value, column) in self.values.iter().zip(schema.columns()) {
            if !value.is_compatible_with(column.data_type) {
                return Err(DbError::TypeMismatch {
                    column: column.name.clone(),
                    expected: column.data_type,
                }
                .into());
            }
        }

        Ok(())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}
