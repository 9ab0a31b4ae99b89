//! Module: key
//! Responsibility: stable entity identity derived from declared key members.
//! Does not own: model declarations or identity-map bookkeeping.
//! Boundary: all identity construction for set lookup and deduplication.
//!
//! Invariants:
//! - A `Key` is always one of the keyable scalar variants.
//! - An `EntityKey` carries exactly one `Key` per declared key member, in
//!   declaration order.
//! - Identity equality is value equality; two records sharing an `EntityKey`
//!   are the same logical entity to their set's identity map.

#[cfg(test)]
mod tests;

use crate::{
    error::{EngineError, ErrorClass, ErrorOrigin},
    value::Value,
};
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};
use thiserror::Error as ThisError;
use ulid::Ulid;

///
/// KeyError
///

#[derive(Debug, ThisError)]
pub enum KeyError {
    #[error("value of kind '{kind}' is not keyable")]
    NotKeyable { kind: &'static str },

    #[error("key member '{field}' is missing")]
    MissingKeyMember { field: String },
}

impl From<KeyError> for EngineError {
    fn from(err: KeyError) -> Self {
        Self::new(ErrorClass::InvariantViolation, ErrorOrigin::Key, err.to_string())
    }
}

///
/// Key
///
/// One keyable scalar. The keyable subset of [`Value`]: floats and null are
/// excluded so identity comparison stays exact.
///

#[derive(Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Text(String),
    Ulid(Ulid),
}

impl Key {
    /// Convert a scalar value into its key representation.
    pub fn try_from_value(value: &Value) -> Result<Self, KeyError> {
        match value {
            Value::Bool(v) => Ok(Self::Bool(*v)),
            Value::Int(v) => Ok(Self::Int(*v)),
            Value::Uint(v) => Ok(Self::Uint(*v)),
            Value::Text(v) => Ok(Self::Text(v.clone())),
            Value::Ulid(v) => Ok(Self::Ulid(*v)),

            Value::Null | Value::Float(_) => Err(KeyError::NotKeyable {
                kind: value.kind_label(),
            }),
        }
    }

    const fn variant_rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int(_) => 1,
            Self::Uint(_) => 2,
            Self::Text(_) => 3,
            Self::Ulid(_) => 4,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Ord::cmp(a, b),
            (Self::Int(a), Self::Int(b)) => Ord::cmp(a, b),
            (Self::Uint(a), Self::Uint(b)) => Ord::cmp(a, b),
            (Self::Text(a), Self::Text(b)) => Ord::cmp(a, b),
            (Self::Ulid(a), Self::Ulid(b)) => Ord::cmp(a, b),

            _ => Ord::cmp(&self.variant_rank(), &other.variant_rank()), // fallback for cross-type comparison
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(Ord::cmp(self, other))
    }
}

///
/// EntityKey
///
/// Ordered composite over an entity's declared key members.
///

#[derive(Clone, Debug, Deref, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[deref(forward)]
pub struct EntityKey(Box<[Key]>);

impl EntityKey {
    #[must_use]
    pub fn new(parts: Vec<Key>) -> Self {
        Self(parts.into_boxed_slice())
    }

    #[must_use]
    pub fn parts(&self) -> &[Key] {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.parts() {
            return write!(f, "{single}");
        }

        f.write_str("(")?;
        for (i, part) in self.parts().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str(")")
    }
}

/// Derive an entity key from a property map and the declared key members.
pub fn entity_key_from_values(
    key_members: &[&str],
    values: &BTreeMap<&'static str, Value>,
) -> Result<EntityKey, KeyError> {
    let mut parts = Vec::with_capacity(key_members.len());

    for member in key_members {
        let value = values.get(*member).ok_or_else(|| KeyError::MissingKeyMember {
            field: (*member).to_string(),
        })?;
        parts.push(Key::try_from_value(value)?);
    }

    Ok(EntityKey::new(parts))
}
