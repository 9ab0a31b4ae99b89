use crate::{
    graph::state::EntityState,
    key::{EntityKey, entity_key_from_values},
    model::EntityModel,
    value::Value,
};
use derive_more::Display;
use serde::Serialize;
use std::collections::BTreeMap;

///
/// EntityId
///
/// Object identity of one tracked record, assigned by the container and
/// never reused. Distinct from [`EntityKey`]: a delete-then-readd under the
/// same key is two records, two `EntityId`s.
///

#[derive(
    Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
    serde::Deserialize,
)]
#[display("#{_0}")]
pub struct EntityId(pub(crate) u64);

///
/// ParentLink
///
/// Weak, non-owning relation from a composed child to its composing parent:
/// a key lookup, never a strong reference.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ParentLink {
    pub parent: EntityId,
    pub association: &'static str,
}

///
/// EntityInvocation
///
/// One queued custom-method invocation, drained on accept and dropped on
/// reject.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EntityInvocation {
    pub method: String,
    pub args: Vec<Value>,
}

///
/// EntityError
///
/// Validation/conflict annotation attached by the submit-result layer.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, serde::Deserialize)]
pub struct EntityError {
    pub message: String,
    #[serde(default)]
    pub is_conflict: bool,
}

///
/// EntityRecord
///
/// One tracked entity: lifecycle state, current and original property maps,
/// and the association caches for both composition directions.
///
/// Snapshot discipline: `original_values` exists only while the record is
/// Modified or Deleted; the association snapshots (`original_children`,
/// `original_parent`) are captured on first membership change and are
/// independent of the scalar snapshot, because an Unmodified record can
/// still participate in a changed association.
///

pub struct EntityRecord {
    id: EntityId,
    model: &'static EntityModel,
    state: EntityState,
    values: BTreeMap<&'static str, Value>,
    original_values: Option<BTreeMap<&'static str, Value>>,
    // current composed membership, association name -> live child ids
    children: BTreeMap<&'static str, Vec<EntityId>>,
    original_children: Option<BTreeMap<&'static str, Vec<EntityId>>>,
    parent: Option<ParentLink>,
    original_parent: Option<Option<ParentLink>>,
    invocations: Vec<EntityInvocation>,
    errors: Vec<EntityError>,
}

impl EntityRecord {
    pub(crate) const fn new(
        id: EntityId,
        model: &'static EntityModel,
        state: EntityState,
        values: BTreeMap<&'static str, Value>,
    ) -> Self {
        Self {
            id,
            model,
            state,
            values,
            original_values: None,
            children: BTreeMap::new(),
            original_children: None,
            parent: None,
            original_parent: None,
            invocations: Vec::new(),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub const fn entity_name(&self) -> &'static str {
        self.model.entity_name
    }

    #[must_use]
    pub const fn state(&self) -> EntityState {
        self.state
    }

    pub(crate) const fn set_state(&mut self, state: EntityState) {
        self.state = state;
    }

    #[must_use]
    pub const fn values(&self) -> &BTreeMap<&'static str, Value> {
        &self.values
    }

    #[must_use]
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub(crate) fn write_value(&mut self, field: &'static str, value: Value) {
        self.values.insert(field, value);
    }

    pub(crate) fn replace_values(&mut self, values: BTreeMap<&'static str, Value>) {
        self.values = values;
    }

    /// Current identity, if every key member is present and keyable.
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        entity_key_from_values(self.model.key, &self.values).ok()
    }

    /// Display handle for diagnostics: `Name[key]` or `Name[#id]`.
    #[must_use]
    pub fn display_handle(&self) -> String {
        match self.key() {
            Some(key) => format!("{}[{key}]", self.entity_name()),
            None => format!("{}[{}]", self.entity_name(), self.id),
        }
    }

    // ── Scalar snapshot ────────────────────────────────

    pub(crate) fn ensure_value_snapshot(&mut self) {
        if self.original_values.is_none() {
            self.original_values = Some(self.values.clone());
        }
    }

    #[must_use]
    pub const fn original_values(&self) -> Option<&BTreeMap<&'static str, Value>> {
        self.original_values.as_ref()
    }

    /// Original property map, falling back to current when unchanged.
    #[must_use]
    pub const fn original_values_or_current(&self) -> &BTreeMap<&'static str, Value> {
        match &self.original_values {
            Some(original) => original,
            None => &self.values,
        }
    }

    pub(crate) fn restore_values(&mut self) {
        if let Some(original) = self.original_values.take() {
            self.values = original;
        }
    }

    // ── Association caches ─────────────────────────────

    #[must_use]
    pub const fn children_map(&self) -> &BTreeMap<&'static str, Vec<EntityId>> {
        &self.children
    }

    #[must_use]
    pub fn children(&self, association: &str) -> &[EntityId] {
        self.children.get(association).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub const fn original_children_map(&self) -> Option<&BTreeMap<&'static str, Vec<EntityId>>> {
        self.original_children.as_ref()
    }

    /// Original membership for one association, falling back to current.
    #[must_use]
    pub fn original_children_or_current(&self, association: &str) -> &[EntityId] {
        self.original_children
            .as_ref()
            .unwrap_or(&self.children)
            .get(association)
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) fn ensure_children_snapshot(&mut self) {
        if self.original_children.is_none() {
            self.original_children = Some(self.children.clone());
        }
    }

    pub(crate) fn push_child(&mut self, association: &'static str, child: EntityId) {
        let list = self.children.entry(association).or_default();
        if !list.contains(&child) {
            list.push(child);
        }
    }

    pub(crate) fn remove_child(&mut self, association: &str, child: EntityId) {
        if let Some(list) = self.children.get_mut(association) {
            list.retain(|id| *id != child);
        }
    }

    #[must_use]
    pub const fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    pub(crate) const fn set_parent_link(&mut self, link: Option<ParentLink>) {
        self.parent = link;
    }

    #[must_use]
    pub const fn original_parent_or_current(&self) -> Option<ParentLink> {
        match self.original_parent {
            Some(original) => original,
            None => self.parent,
        }
    }

    pub(crate) const fn ensure_parent_snapshot(&mut self) {
        if self.original_parent.is_none() {
            self.original_parent = Some(self.parent);
        }
    }

    // ── Invocations and annotations ────────────────────

    #[must_use]
    pub fn invocations(&self) -> &[EntityInvocation] {
        &self.invocations
    }

    pub(crate) fn push_invocation(&mut self, invocation: EntityInvocation) {
        self.invocations.push(invocation);
    }

    #[must_use]
    pub fn entity_errors(&self) -> &[EntityError] {
        &self.errors
    }

    pub(crate) fn set_entity_errors(&mut self, errors: Vec<EntityError>) {
        self.errors = errors;
    }

    // ── Pending-change bookkeeping ─────────────────────

    /// Return whether this record itself carries a pending change.
    /// Composed-descendant recursion lives on the container.
    #[must_use]
    pub const fn has_own_change(&self) -> bool {
        self.state.has_pending_change()
    }

    /// Erase a vanished id from every association cache, current and
    /// original.
    pub(crate) fn scrub_reference(&mut self, id: EntityId) {
        for list in self.children.values_mut() {
            list.retain(|child| *child != id);
        }
        if let Some(original) = &mut self.original_children {
            for list in original.values_mut() {
                list.retain(|child| *child != id);
            }
        }
        if self.parent.is_some_and(|link| link.parent == id) {
            self.parent = None;
        }
        if let Some(original) = &mut self.original_parent {
            if original.is_some_and(|link| link.parent == id) {
                *original = None;
            }
        }
    }

    /// Drop association snapshots that match current state again.
    pub(crate) fn collapse_snapshots(&mut self) {
        if self
            .original_values
            .as_ref()
            .is_some_and(|original| *original == self.values)
        {
            self.original_values = None;
        }
        if self
            .original_children
            .as_ref()
            .is_some_and(|original| children_maps_equal(original, &self.children))
        {
            self.original_children = None;
        }
        if self.original_parent.is_some_and(|original| original == self.parent) {
            self.original_parent = None;
        }
    }

    /// Commit the current values and associations as the new baseline.
    pub(crate) fn commit_baseline(&mut self) {
        self.original_values = None;
        self.original_children = None;
        self.original_parent = None;
        self.invocations.clear();
        self.errors.clear();
    }

    /// Finalize a rollback: back to Unmodified, pending extras dropped,
    /// association snapshots kept only while they still differ (deleted
    /// descendants restore them on their own reject).
    pub(crate) fn finish_reject(&mut self) {
        self.state = EntityState::Unmodified;
        self.original_values = None;
        self.invocations.clear();
        self.errors.clear();
        self.collapse_snapshots();
    }

    /// Return whether every snapshot matches current state, meaning the
    /// record can collapse back to Unmodified.
    #[must_use]
    pub(crate) fn is_effectively_clean(&self) -> bool {
        if !self.invocations.is_empty() {
            return false;
        }
        if self
            .original_values
            .as_ref()
            .is_some_and(|original| *original != self.values)
        {
            return false;
        }
        if self
            .original_children
            .as_ref()
            .is_some_and(|original| !children_maps_equal(original, &self.children))
        {
            return false;
        }
        if self
            .original_parent
            .is_some_and(|original| original != self.parent)
        {
            return false;
        }

        true
    }
}

// Membership comparison ignores empty lists so a drained entry equals an
// absent one.
fn children_maps_equal(
    a: &BTreeMap<&'static str, Vec<EntityId>>,
    b: &BTreeMap<&'static str, Vec<EntityId>>,
) -> bool {
    let mut names: Vec<&&'static str> = a.keys().chain(b.keys()).collect();
    names.sort_unstable();
    names.dedup();

    names.into_iter().all(|name| {
        let left = a.get(*name).map_or(&[] as &[EntityId], Vec::as_slice);
        let right = b.get(*name).map_or(&[] as &[EntityId], Vec::as_slice);
        left == right
    })
}
