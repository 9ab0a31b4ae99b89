use std::fmt;

///
/// AssociationModel
///
/// Per-type description of one relationship, declared on the child type
/// (the side that carries the foreign-key members). The parent's composed
/// collection is addressed by the same association name, so one descriptor
/// covers both directions: the child's parent reference is the
/// back-reference, the parent's membership list is the collection.
///
#[derive(Debug)]
pub struct AssociationModel {
    /// Stable association name, unique across the registry.
    pub name: &'static str,
    /// Child-side scalar members holding the parent's key, in the parent's
    /// key-member order.
    pub fk_members: &'static [&'static str],
    /// Entity name of the parent type.
    pub parent_entity: &'static str,
    /// Shape of the parent-side slot.
    pub cardinality: Cardinality,
    /// Composition binds the child's lifetime and single ownership to the
    /// parent; parent deletion cascades.
    pub composition: bool,
}

///
/// Cardinality
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Cardinality {
    /// The parent holds at most one child in this slot.
    One,
    /// The parent holds a collection of children.
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("one"),
            Self::Many => f.write_str("many"),
        }
    }
}
