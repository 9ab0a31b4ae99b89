//! Module: graph
//! Responsibility: the tracked entity graph: records, sets, container, and
//! every state transition over them.
//! Does not own: model declarations, change-set compilation, or transport.
//! Boundary: all mutation of tracked entities flows through
//! [`EntityContainer`]; cross-entity lookup always takes the explicit
//! container reference.
//!
//! Invariants:
//! - A live key is unique within its set; Deleted records vacate the
//!   identity map.
//! - A composed record has 0 or 1 composing parent at any instant.
//! - Composition graphs are acyclic, enforced at assignment time.
//! - Current membership lists contain live children only; snapshots preserve
//!   the pre-change membership for diffing and rollback.
//! - Every public mutating operation leaves the graph fully consistent at
//!   return.

mod accept;
mod composition;
mod container;
mod data;
mod events;
mod lifecycle;
mod record;
mod set;
mod state;


pub use composition::CompositionError;
pub use container::EntityContainer;
pub use data::EntityData;
pub use events::{ChangedProperty, CollectionChange, GraphEvent, PropertyTarget};
pub use lifecycle::{LoadMerge, LoadOptions};
pub use record::{EntityError, EntityId, EntityInvocation, EntityRecord, ParentLink};
pub use set::{EntitySet, SetError};
pub use state::EntityState;

pub(crate) use composition::foreign_key_of;
