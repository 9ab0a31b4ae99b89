use crate::{
    error::{EngineError, ErrorClass, ErrorOrigin},
    graph::record::EntityId,
    key::EntityKey,
    model::{EntityModel, SetCapability},
};
use std::collections::HashMap;
use thiserror::Error as ThisError;

///
/// SetError
///

#[derive(Debug, ThisError)]
pub enum SetError {
    #[error("entity set '{entity}' already tracks key {key}")]
    DuplicateKey { entity: &'static str, key: String },

    #[error("entity set '{entity}' does not support {operation}")]
    OperationNotSupported {
        entity: &'static str,
        operation: &'static str,
    },
}

impl From<SetError> for EngineError {
    fn from(err: SetError) -> Self {
        let class = match err {
            SetError::DuplicateKey { .. } => ErrorClass::Conflict,
            SetError::OperationNotSupported { .. } => ErrorClass::Unsupported,
        };

        Self::new(class, ErrorOrigin::Set, err.to_string())
    }
}

///
/// EntitySet
///
/// Identity-mapped membership for one entity type within one container.
///
/// The identity map covers live records (New/Unmodified/Modified); Deleted
/// records vacate it and park on the removed list, which is what makes
/// delete-then-readd under the same key legal. Insertion order is preserved
/// for deterministic enumeration.
///

pub struct EntitySet {
    model: &'static EntityModel,
    by_key: HashMap<EntityKey, EntityId>,
    order: Vec<EntityId>,
    removed: Vec<EntityId>,
}

impl EntitySet {
    pub(crate) fn new(model: &'static EntityModel) -> Self {
        Self {
            model,
            by_key: HashMap::new(),
            order: Vec::new(),
            removed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.model.entity_name
    }

    /// Live record count (excludes Deleted records).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate live record ids in insertion order.
    pub fn iter_live(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.order.iter().copied()
    }

    /// Iterate Deleted record ids in removal order.
    pub fn iter_removed(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.removed.iter().copied()
    }

    /// Iterate every tracked id: live first, then removed.
    pub fn iter_tracked(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.iter_live().chain(self.iter_removed())
    }

    /// Identity-map lookup over live records.
    #[must_use]
    pub fn lookup(&self, key: &EntityKey) -> Option<EntityId> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn ensure_capability(&self, required: SetCapability) -> Result<(), SetError> {
        if self.model.capability.contains(required) {
            return Ok(());
        }

        let operation = if required == SetCapability::ADD {
            "add"
        } else if required == SetCapability::REMOVE {
            "remove"
        } else {
            "edit"
        };

        Err(SetError::OperationNotSupported {
            entity: self.name(),
            operation,
        })
    }

    /// Track a live record, claiming its identity when keyed.
    pub(crate) fn insert_live(
        &mut self,
        id: EntityId,
        key: Option<EntityKey>,
    ) -> Result<(), SetError> {
        if let Some(key) = key {
            if self.by_key.contains_key(&key) {
                return Err(SetError::DuplicateKey {
                    entity: self.name(),
                    key: key.to_string(),
                });
            }
            self.by_key.insert(key, id);
        }
        self.order.push(id);

        Ok(())
    }

    /// Re-index a New record whose key members were edited.
    pub(crate) fn rekey(
        &mut self,
        id: EntityId,
        old: Option<&EntityKey>,
        new: Option<EntityKey>,
    ) -> Result<(), SetError> {
        if let Some(new) = &new {
            if self.by_key.get(new).is_some_and(|occupant| *occupant != id) {
                return Err(SetError::DuplicateKey {
                    entity: self.name(),
                    key: new.to_string(),
                });
            }
        }
        if let Some(old) = old {
            self.by_key.remove(old);
        }
        if let Some(new) = new {
            self.by_key.insert(new, id);
        }

        Ok(())
    }

    /// Move a live record onto the removed list, vacating its identity.
    pub(crate) fn mark_removed(&mut self, id: EntityId, key: Option<&EntityKey>) {
        if let Some(key) = key {
            if self.by_key.get(key).is_some_and(|occupant| *occupant == id) {
                self.by_key.remove(key);
            }
        }
        self.order.retain(|tracked| *tracked != id);
        self.removed.push(id);
    }

    /// Move a removed record back into the live collection (delete reject).
    pub(crate) fn restore_live(
        &mut self,
        id: EntityId,
        key: Option<EntityKey>,
    ) -> Result<(), SetError> {
        if let Some(key) = &key {
            if self.by_key.contains_key(key) {
                return Err(SetError::DuplicateKey {
                    entity: self.name(),
                    key: key.to_string(),
                });
            }
        }
        self.removed.retain(|tracked| *tracked != id);
        if let Some(key) = key {
            self.by_key.insert(key, id);
        }
        self.order.push(id);

        Ok(())
    }

    /// Drop a record from tracking entirely (detach or accepted delete).
    pub(crate) fn drop_tracked(&mut self, id: EntityId, key: Option<&EntityKey>) {
        if let Some(key) = key {
            if self.by_key.get(key).is_some_and(|occupant| *occupant == id) {
                self.by_key.remove(key);
            }
        }
        self.order.retain(|tracked| *tracked != id);
        self.removed.retain(|tracked| *tracked != id);
    }

    pub(crate) fn clear(&mut self) {
        self.by_key.clear();
        self.order.clear();
        self.removed.clear();
    }
}
