//! Core runtime for Ebb: scalar values, entity identity, static entity
//! models, the tracked entity graph, and the change-set pipeline that turns
//! local edits into replayable wire operations.

// public exports are one module level down
pub mod changeset;
pub mod error;
pub mod graph;
pub mod key;
pub mod model;
pub mod obs;
pub mod submit;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Maximum number of key members allowed on an entity.
///
/// This limit keeps composite identities small and bounds the fixed-arity
/// checks in the model registry.
pub const MAX_KEY_MEMBERS: usize = 4;

/// Maximum composition depth allowed in one container.
///
/// Composition graphs are acyclic by construction; the depth cap additionally
/// bounds every recursive traversal over them.
pub const MAX_COMPOSITION_DEPTH: usize = 64;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, sinks, or internal helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        changeset::{ChangeSetEntry, EntityChangeSet, EntryOperation},
        graph::{
            EntityContainer, EntityData, EntityId, EntityState, GraphEvent, LoadMerge, LoadOptions,
        },
        key::{EntityKey, Key},
        model::{
            AssociationModel, Cardinality, EntityFieldModel, EntityModel, FieldKind, SetCapability,
        },
        value::Value,
    };
}
