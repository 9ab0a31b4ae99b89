//! Module: changeset
//! Responsibility: the pure transform from pending graph state to an
//! ordered, dependency-resolved list of wire operation entries.
//! Does not own: graph mutation or transport.
//! Boundary: `EntityContainer::get_changes` produces the snapshot; `build`
//! compiles it; `validate` gates submission.
//!
//! Invariants:
//! - Correlation ids are small positive integers assigned in enumeration
//!   order; every entry referenced by another's associations has an id.
//! - The snapshot is ephemeral: produced once, consumed once, never mutated.
//! - No structurally unsatisfiable change set leaves `build` unvalidated.

mod builder;
mod entry;
mod validate;

#[cfg(test)]
mod tests;

pub use builder::build_operations;
pub use entry::{ChangeSetEntry, EntityPayload, EntryOperation};
pub use validate::validate_entries;

use crate::{
    graph::{EntityId, EntityState},
    key::EntityKey,
};

///
/// ChangedEntity
///
/// One changed-entity descriptor inside the snapshot.
///

#[derive(Clone, Debug)]
pub struct ChangedEntity {
    pub id: EntityId,
    pub entity_name: &'static str,
    pub key: Option<EntityKey>,
    pub state: EntityState,
}

///
/// EntityChangeSet
///
/// Ephemeral snapshot of every pending change across a container,
/// deduplicated across all sets.
///

#[derive(Debug, Default)]
pub struct EntityChangeSet {
    pub added: Vec<ChangedEntity>,
    pub modified: Vec<ChangedEntity>,
    pub removed: Vec<ChangedEntity>,
}

impl EntityChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Iterate every changed entity: added, then modified, then removed.
    pub fn iter_all(&self) -> impl Iterator<Item = &ChangedEntity> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .chain(self.removed.iter())
    }
}
