#[cfg(test)]
mod tests;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
};
use ulid::Ulid;

///
/// Value
///
/// The scalar currency of every tracked record: property maps, original-value
/// snapshots, and wire payloads all carry these.
///
/// Total equality and ordering are required because values act as map keys
/// and participate in deterministic snapshot diffing; floats compare by
/// `total_cmp` and hash by bit pattern, cross-variant comparison falls back
/// to the variant rank.
///

#[derive(Clone, Debug, Deserialize, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    #[display("null")]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Ulid(Ulid),
}

impl Value {
    // ── Variant ranks (do not reorder) ─────────────────
    pub(crate) const RANK_NULL: u8 = 0;
    pub(crate) const RANK_BOOL: u8 = 1;
    pub(crate) const RANK_INT: u8 = 2;
    pub(crate) const RANK_UINT: u8 = 3;
    pub(crate) const RANK_FLOAT: u8 = 4;
    pub(crate) const RANK_TEXT: u8 = 5;
    pub(crate) const RANK_ULID: u8 = 6;

    pub(crate) const fn variant_rank(&self) -> u8 {
        match self {
            Self::Null => Self::RANK_NULL,
            Self::Bool(_) => Self::RANK_BOOL,
            Self::Int(_) => Self::RANK_INT,
            Self::Uint(_) => Self::RANK_UINT,
            Self::Float(_) => Self::RANK_FLOAT,
            Self::Text(_) => Self::RANK_TEXT,
            Self::Ulid(_) => Self::RANK_ULID,
        }
    }

    /// Stable label for diagnostics and error messages.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Ulid(_) => "ulid",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Ulid(a), Self::Ulid(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.variant_rank());
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Uint(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Text(v) => v.hash(state),
            Self::Ulid(v) => v.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => Ord::cmp(a, b),
            (Self::Int(a), Self::Int(b)) => Ord::cmp(a, b),
            (Self::Uint(a), Self::Uint(b)) => Ord::cmp(a, b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => Ord::cmp(a, b),
            (Self::Ulid(a), Self::Ulid(b)) => Ord::cmp(a, b),

            _ => Ord::cmp(&self.variant_rank(), &other.variant_rank()), // fallback for cross-type comparison
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Ulid> for Value {
    fn from(v: Ulid) -> Self {
        Self::Ulid(v)
    }
}
