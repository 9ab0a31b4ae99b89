use crate::model::{association::AssociationModel, field::EntityFieldModel};
use std::fmt;

///
/// EntityModel
/// Minimal, statically-declared runtime model for one entity type.
///
#[derive(Debug)]
pub struct EntityModel {
    /// Fully-qualified Rust type path (for dispatch and diagnostics).
    pub path: &'static str,
    /// Stable external name used in sets, payloads, and routing.
    pub entity_name: &'static str,
    /// Key members (each points at an entry in `fields`).
    pub key: &'static [&'static str],
    /// Ordered field list (authoritative for load validation).
    pub fields: &'static [EntityFieldModel],
    /// Associations declared on this type's child side.
    pub associations: &'static [AssociationModel],
    /// Operations the entity's set supports.
    pub capability: SetCapability,
}

impl EntityModel {
    /// Look up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static EntityFieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Look up a child-side association by name.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<&'static AssociationModel> {
        self.associations.iter().find(|assoc| assoc.name == name)
    }

    /// Return whether a field participates in this entity's key.
    #[must_use]
    pub fn is_key_member(&self, name: &str) -> bool {
        self.key.contains(&name)
    }

    /// Iterate the composed child-side associations.
    pub fn composed_associations(&self) -> impl Iterator<Item = &'static AssociationModel> {
        self.associations.iter().filter(|assoc| assoc.composition)
    }
}

///
/// SetCapability
///
/// Supported-operations bitmask for one entity set.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SetCapability(u8);

impl SetCapability {
    pub const NONE: Self = Self(0);
    pub const ADD: Self = Self(1);
    pub const REMOVE: Self = Self(1 << 1);
    pub const EDIT: Self = Self(1 << 2);
    pub const ALL: Self = Self(Self::ADD.0 | Self::REMOVE.0 | Self::EDIT.0);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl fmt::Display for SetCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut labels = Vec::new();
        if self.contains(Self::ADD) {
            labels.push("add");
        }
        if self.contains(Self::REMOVE) {
            labels.push("remove");
        }
        if self.contains(Self::EDIT) {
            labels.push("edit");
        }
        if labels.is_empty() {
            labels.push("none");
        }
        f.write_str(&labels.join("|"))
    }
}
