//! Single-column equality predicates used by delete and update.

use crate::access::tuple::Tuple;
use crate::catalog::Schema;
use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
}

impl CompareOp {
    pub fn parse(op: &str) -> Result<Self> {
        match op {
            "=" => Ok(CompareOp::Eq),
            "!=" | "<>" => Ok(CompareOp::NotEq),
            _ => bail!("Unsupported comparison operator: {}", op),
        }
    }
}

/// `column op literal`, or a match-all predicate when no column is given.
///
/// The literal is compared against the column's value in text form, so an
/// integer column matches `"3"` but not `"03"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    column: Option<String>,
    op: CompareOp,
    literal: String,
}

impl Predicate {
    /// Matches every row.
    pub fn all() -> Self {
        Self {
            column: None,
            op: CompareOp::Eq,
            literal: String::new(),
        }
    }

    /// An empty column name yields a match-all predicate.
    pub fn new(column: &str, op: CompareOp, literal: impl Into<String>) -> Self {
        Self {
            column: if column.is_empty() {
                None
            } else {
                Some(column.to_string())
            },
            op,
            literal: literal.into(),
        }
    }

    pub fn eq(column: &str, literal: impl Into<String>) -> Self {
        Self::new(column, CompareOp::Eq, literal)
    }

    pub fn not_eq(column: &str, literal: impl Into<String>) -> Self {
        Self::new(column, CompareOp::NotEq, literal)
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Resolve the column against `schema`. Fails with
    /// `DbError::UnknownColumn` before any row is touched.
    pub fn bind<'a>(&'a self, schema: &Schema) -> Result<BoundPredicate<'a>> {
        let column = match &self.column {
            Some(name) => Some(schema.resolve(name)?.0),
            None => None,
        };
        Ok(BoundPredicate {
            column,
            op: self.op,
            literal: &self.literal,
        })
    }
}

pub struct BoundPredicate<'a> {
    column: Option<usize>,
    op: CompareOp,
    literal: &'a str,
}

impl BoundPredicate<'_> {
    pub fn matches(&self, tuple: &Tuple) -> bool {
        let Some(index) = self.column else {
            return true;
        };
        let hit = tuple
            .value(index)
            .is_some_and(|value| value.matches_literal(self.literal));
        match self.op {
            CompareOp::Eq => hit,
            CompareOp::NotEq => !hit,
        }
    }
}
