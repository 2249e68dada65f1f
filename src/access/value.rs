use crate::error::DbError;
use anyhow::{bail, Result};
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column types supported by the database
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer = 1,
    Varchar = 2,
}

impl DataType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(DataType::Integer),
            2 => Ok(DataType::Varchar),
            _ => bail!("Unknown data type: {}", value),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INT"),
            DataType::Varchar => write!(f, "VARCHAR"),
        }
    }
}

/// A single column value.
///
/// Encoded without a type tag: `Integer` is 4 little-endian bytes, `Varchar`
/// is a `u32` byte length followed by the UTF-8 bytes. The schema supplies
/// the type when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Integer(i32),
    Varchar(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) => DataType::Integer,
            Value::Varchar(_) => DataType::Varchar,
        }
    }

    pub fn is_compatible_with(&self, data_type: DataType) -> bool {
        self.data_type() == data_type
    }

    /// Parse a literal as a value of `data_type`.
    ///
    /// Integer literals must be a complete decimal `i32`; anything else is
    /// `DbError::InvalidInteger`. Varchar literals are taken verbatim.
    pub fn parse(literal: &str, data_type: DataType) -> Result<Value> {
        match data_type {
            DataType::Integer => literal
                .trim()
                .parse::<i32>()
                .map(Value::Integer)
                .map_err(|_| DbError::InvalidInteger(literal.to_string()).into()),
            DataType::Varchar => Ok(Value::Varchar(literal.to_string())),
        }
    }

    /// Predicate comparison: integers compare by their decimal rendering,
    /// strings byte for byte.
    pub fn matches_literal(&self, literal: &str) -> bool {
        match self {
            Value::Integer(i) => i.to_string() == literal,
            Value::Varchar(s) => s == literal,
        }
    }

    pub fn serialized_size(&self) -> usize {
        match self {
            Value::Integer(_) => 4,
            Value::Varchar(s) => 4 + s.len(),
        }
    }

    pub fn serialize_into(&self, out: &mut Vec<u8>) {
        let mut word = [0u8; 4];
        match self {
            Value::Integer(i) => {
                LittleEndian::write_i32(&mut word, *i);
                out.extend_from_slice(&word);
            }
            Value::Varchar(s) => {
                LittleEndian::write_u32(&mut word, s.len() as u32);
                out.extend_from_slice(&word);
                out.extend_from_slice(s.as_bytes());
            }
        }
    }

    /// Decode one value of `data_type` from the front of `data`, returning
    /// it with the number of bytes consumed.
    pub fn deserialize(data: &[u8], data_type: DataType) -> Result<(Value, usize)> {
        if data.len() < 4 {
            bail!(
                "Invalid {} value: need 4 bytes, {} available",
                data_type,
                data.len()
            );
        }

        match data_type {
            DataType::Integer => Ok((Value::Integer(LittleEndian::read_i32(data)), 4)),
            DataType::Varchar => {
                let len = LittleEndian::read_u32(data) as usize;
                if data.len() - 4 < len {
                    bail!(
                        "Invalid VARCHAR value: length {} exceeds {} remaining bytes",
                        len,
                        data.len() - 4
                    );
                }
                let s = String::from_utf8(data[4..4 + len].to_vec())?;
                Ok((Value::Varchar(s), 4 + len))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Varchar(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_conversion() -> Result<()> {
        assert_eq!(DataType::from_u8(1)?, DataType::Integer);
        assert_eq!(DataType::from_u8(2)?, DataType::Varchar);
        assert!(DataType::from_u8(99).is_err());
        Ok(())
    }

    #[test]
    fn test_value_compatibility() {
        assert!(Value::Integer(42).is_compatible_with(DataType::Integer));
        assert!(Value::Varchar("hello".to_string()).is_compatible_with(DataType::Varchar));
        assert!(!Value::Integer(42).is_compatible_with(DataType::Varchar));
    }

    #[test]
    fn test_encoding_layout() {
        let mut out = Vec::new();
        Value::Integer(-2).serialize_into(&mut out);
        Value::Varchar("ab".to_string()).serialize_into(&mut out);
        assert_eq!(out, vec![0xFE, 0xFF, 0xFF, 0xFF, 2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn test_decode_values() -> Result<()> {
        let values = [
            Value::Integer(i32::MIN),
            Value::Integer(0),
            Value::Varchar(String::new()),
            Value::Varchar("x".repeat(1000)),
            Value::Varchar("héllo".to_string()),
        ];

        for value in values {
            let mut out = Vec::new();
            value.serialize_into(&mut out);
            assert_eq!(out.len(), value.serialized_size());

            let (decoded, consumed) = Value::deserialize(&out, value.data_type())?;
            assert_eq!(decoded, value);
            assert_eq!(consumed, out.len());
        }

        Ok(())
    }

    #[test]
    fn test_truncated_varchar() {
        let mut out = Vec::new();
        Value::Varchar("hello".to_string()).serialize_into(&mut out);
        assert!(Value::deserialize(&out[..6], DataType::Varchar).is_err());
        assert!(Value::deserialize(&out[..2], DataType::Varchar).is_err());
    }

    #[test]
    fn test_parse_literals() -> Result<()> {
        assert_eq!(Value::parse("42", DataType::Integer)?, Value::Integer(42));
        assert_eq!(Value::parse("-7", DataType::Integer)?, Value::Integer(-7));
        assert_eq!(
            Value::parse("42", DataType::Varchar)?,
            Value::Varchar("42".to_string())
        );

        let err = Value::parse("12abc", DataType::Integer).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::InvalidInteger("12abc".to_string()))
        );
        assert!(Value::parse("99999999999", DataType::Integer).is_err());

        Ok(())
    }

    #[test]
    fn test_matches_literal() {
        assert!(Value::Integer(3).matches_literal("3"));
        assert!(!Value::Integer(3).matches_literal("03"));
        assert!(Value::Varchar("abc".to_string()).matches_literal("abc"));
        assert!(!Value::Varchar("abc".to_string()).matches_literal("ABC"));
    }
}
