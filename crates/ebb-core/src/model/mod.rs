//! Static, per-entity-type descriptor tables.
//!
//! These replace runtime reflection: every property access and association
//! traversal dispatches through an [`EntityModel`] declared as a `static`
//! (by hand or by code generation) and validated once per container by the
//! [`ModelRegistry`].

mod association;
mod entity;
mod field;
mod registry;

#[cfg(test)]
mod tests;

pub use association::{AssociationModel, Cardinality};
pub use entity::{EntityModel, SetCapability};
pub use field::{EntityFieldModel, FieldKind};
pub use registry::{ModelError, ModelRegistry};
