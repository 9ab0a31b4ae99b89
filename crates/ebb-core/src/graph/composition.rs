//! Composition synchronizer.
//!
//! Keeps composed-collection membership, single-parent exclusivity, and
//! foreign-key scalars consistent as entities move through the graph.
//!
//! Invariants:
//! - A composed child occupies exactly one attached composed slot until its
//!   parent changes; assignment eagerly detaches from the previous parent.
//! - Self/ancestor parent assignment fails immediately, never deferred.
//! - Foreign-key scalars resynchronize to the new parent's key on every
//!   parent assignment.
//! - Raw wiring (load/attach inference, rollback restoration) never touches
//!   snapshots, states, or notifications.

use crate::{
    MAX_COMPOSITION_DEPTH,
    error::{EngineError, ErrorClass, ErrorOrigin},
    graph::{
        container::EntityContainer,
        record::{EntityId, EntityRecord, ParentLink},
        state::EntityState,
    },
    key::{EntityKey, Key},
    model::AssociationModel,
    obs::{self, MetricsEvent, MutationKind},
    value::Value,
};
use std::collections::HashSet;
use thiserror::Error as ThisError;

///
/// CompositionError
///

#[derive(Debug, ThisError)]
pub enum CompositionError {
    #[error("unknown association '{association}' on entity '{entity}'")]
    UnknownAssociation {
        association: String,
        entity: &'static str,
    },

    #[error("association '{association}' is not a composition")]
    NotComposition { association: String },

    #[error("entity {entity} cannot be its own composed parent")]
    SelfComposition { entity: String },

    #[error("entity {entity} cannot be composed under its own descendant")]
    AncestorComposition { entity: String },

    #[error("composition depth exceeds max {max}")]
    DepthExceeded { max: usize },
}

impl From<CompositionError> for EngineError {
    fn from(err: CompositionError) -> Self {
        let class = match err {
            CompositionError::UnknownAssociation { .. } => ErrorClass::NotFound,
            CompositionError::NotComposition { .. } => ErrorClass::Unsupported,
            _ => ErrorClass::InvariantViolation,
        };

        Self::new(class, ErrorOrigin::Composition, err.to_string())
    }
}

impl EntityContainer {
    // ── Public surface ─────────────────────────────────

    /// Composed membership of one association slot.
    pub fn children(&self, id: EntityId, association: &str) -> Result<Vec<EntityId>, EngineError> {
        Ok(self.record(id)?.children(association).to_vec())
    }

    /// Composing parent link, if any.
    pub fn parent(&self, id: EntityId) -> Result<Option<ParentLink>, EngineError> {
        Ok(self.record(id)?.parent())
    }

    /// Assign (or clear) a composed child's parent.
    ///
    /// The move is a legal local graph edit even after attach (a
    /// cross-parent move surfaces later, at changeset validation), but
    /// self/ancestor parents and deleted endpoints fail here, immediately.
    pub fn set_parent(
        &mut self,
        child: EntityId,
        association: &str,
        parent: Option<EntityId>,
    ) -> Result<(), EngineError> {
        // Phase 1: resolve and validate; no mutation yet.
        let child_record = self.record(child)?;
        let child_model = child_record.model();
        let child_state = child_record.state();
        let child_handle = child_record.display_handle();
        let current_link = child_record.parent();

        let assoc = child_model.association(association).ok_or_else(|| {
            CompositionError::UnknownAssociation {
                association: association.to_string(),
                entity: child_model.entity_name,
            }
        })?;
        if !assoc.composition {
            return Err(CompositionError::NotComposition {
                association: association.to_string(),
            }
            .into());
        }
        if child_state == EntityState::Deleted {
            return Err(EngineError::invariant(
                ErrorOrigin::Composition,
                format!("cannot reparent deleted entity {child_handle}"),
            ));
        }

        if let Some(pid) = parent {
            if pid == child {
                return Err(CompositionError::SelfComposition {
                    entity: child_handle,
                }
                .into());
            }

            let parent_record = self.record(pid)?;
            if parent_record.state() == EntityState::Deleted {
                return Err(EngineError::invariant(
                    ErrorOrigin::Composition,
                    format!(
                        "cannot compose {child_handle} into deleted parent {}",
                        parent_record.display_handle()
                    ),
                ));
            }
            if parent_record.entity_name() != assoc.parent_entity {
                return Err(EngineError::invariant(
                    ErrorOrigin::Composition,
                    format!(
                        "association '{}' expects parent '{}', got '{}'",
                        assoc.name,
                        assoc.parent_entity,
                        parent_record.entity_name()
                    ),
                ));
            }
            if self.has_composed_ancestor(pid, child) {
                return Err(CompositionError::AncestorComposition {
                    entity: child_handle,
                }
                .into());
            }
            if self.composition_depth(pid) + 1 + self.subtree_height(child)
                > MAX_COMPOSITION_DEPTH
            {
                return Err(CompositionError::DepthExceeded {
                    max: MAX_COMPOSITION_DEPTH,
                }
                .into());
            }
        }

        let new_link = parent.map(|pid| ParentLink {
            parent: pid,
            association: assoc.name,
        });
        if current_link == new_link {
            return Ok(());
        }

        // Phase 2: eagerly detach from the previous parent.
        if let Some(old) = current_link {
            self.mark_parent_modified(old.parent)?;
            let old_record = self.record_mut(old.parent)?;
            old_record.ensure_children_snapshot();
            old_record.remove_child(old.association, child);
        }

        // Phase 3: attach to the new parent and resolve the fk scalars.
        let mut fk_writes: Vec<(&'static str, Value)> = Vec::new();
        if let Some(pid) = parent {
            if assoc.cardinality == crate::model::Cardinality::One {
                let occupants: Vec<EntityId> = self
                    .record(pid)?
                    .children(assoc.name)
                    .iter()
                    .copied()
                    .filter(|occupant| *occupant != child)
                    .collect();
                for occupant in occupants {
                    self.unlink_child(occupant)?;
                }
            }

            self.mark_parent_modified(pid)?;
            let parent_record = self.record_mut(pid)?;
            parent_record.ensure_children_snapshot();
            parent_record.push_child(assoc.name, child);

            let parent_record = self.record(pid)?;
            let parent_key_members = parent_record.model().key;
            for (fk, key_member) in assoc
                .fk_members
                .iter()
                .copied()
                .zip(parent_key_members.iter().copied())
            {
                let value = parent_record.value(key_member).cloned().unwrap_or(Value::Null);
                fk_writes.push((fk, value));
            }
        } else {
            for fk in assoc.fk_members.iter().copied() {
                fk_writes.push((fk, Value::Null));
            }
        }

        // Phase 4: update the child itself.
        let entity_name = child_model.entity_name;
        let child_record = self.record_mut(child)?;
        child_record.ensure_parent_snapshot();
        if child_state == EntityState::Unmodified {
            child_record.ensure_value_snapshot();
            child_record.set_state(EntityState::Modified);
            self.events.note_state(entity_name, child);
        } else if child_state == EntityState::Modified {
            self.record_mut(child)?.ensure_value_snapshot();
        }
        let child_record = self.record_mut(child)?;
        for (fk, value) in fk_writes {
            child_record.write_value(fk, value);
        }
        child_record.set_parent_link(new_link);

        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Reparent,
            entity: entity_name,
        });

        Ok(())
    }

    // ── Internal synchronization ───────────────────────

    /// Snapshot and transition a parent whose composed membership is being
    /// edited through the parent side.
    pub(crate) fn mark_parent_modified(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self.record(id)?;
        if record.state() != EntityState::Unmodified {
            return Ok(());
        }
        let entity_name = record.entity_name();

        let record = self.record_mut(id)?;
        record.ensure_value_snapshot();
        record.set_state(EntityState::Modified);
        self.events.note_state(entity_name, id);

        Ok(())
    }

    /// Displace a composed child from its current slot: membership removal,
    /// back-reference clear, fk scalars nulled, child marked modified.
    pub(crate) fn unlink_child(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let Some(link) = record.parent() else {
            return Ok(());
        };
        let entity_name = record.entity_name();
        let state = record.state();
        let fk_members = record
            .model()
            .association(link.association)
            .map_or(&[] as &[&'static str], |assoc| assoc.fk_members);

        let parent_record = self.record_mut(link.parent)?;
        parent_record.ensure_children_snapshot();
        parent_record.remove_child(link.association, id);

        let record = self.record_mut(id)?;
        record.ensure_parent_snapshot();
        if state == EntityState::Unmodified {
            record.ensure_value_snapshot();
            record.set_state(EntityState::Modified);
            self.events.note_state(entity_name, id);
        } else if state == EntityState::Modified {
            self.record_mut(id)?.ensure_value_snapshot();
        }
        let record = self.record_mut(id)?;
        for fk in fk_members.iter().copied() {
            record.write_value(fk, Value::Null);
        }
        record.set_parent_link(None);

        Ok(())
    }

    /// Wire a parent link without snapshots, state transitions, or events.
    /// Load/attach inference and rollback restoration only.
    pub(crate) fn wire_parent_raw(
        &mut self,
        child: EntityId,
        assoc: &'static AssociationModel,
        parent: EntityId,
    ) -> Result<(), EngineError> {
        if parent == child || self.has_composed_ancestor(parent, child) {
            let handle = self.record(child)?.display_handle();
            return Err(CompositionError::AncestorComposition { entity: handle }.into());
        }

        let parent_record = self.record(parent)?;
        let parent_key_members = parent_record.model().key;
        let fk_values: Vec<(&'static str, Value)> = assoc
            .fk_members
            .iter()
            .zip(parent_key_members)
            .map(|(fk, key_member)| {
                (*fk, parent_record.value(key_member).cloned().unwrap_or(Value::Null))
            })
            .collect();

        self.record_mut(parent)?.push_child(assoc.name, child);
        let child_record = self.record_mut(child)?;
        for (fk, value) in fk_values {
            child_record.write_value(fk, value);
        }
        child_record.set_parent_link(Some(ParentLink {
            parent,
            association: assoc.name,
        }));

        Ok(())
    }

    // ── Traversal helpers ──────────────────────────────

    /// Transitive composed descendants, preorder, excluding the root.
    /// Walks current membership lists, so only live descendants appear.
    pub(crate) fn composed_descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack: Vec<EntityId> = self.child_ids(id);
        stack.reverse();

        while let Some(current) = stack.pop() {
            out.push(current);
            let mut children = self.child_ids(current);
            children.reverse();
            stack.extend(children);
        }

        out
    }

    fn child_ids(&self, id: EntityId) -> Vec<EntityId> {
        self.record_opt(id).map_or_else(Vec::new, |record| {
            record.children_map().values().flatten().copied().collect()
        })
    }

    /// Whether `ancestor` appears on `id`'s composed parent chain.
    pub(crate) fn has_composed_ancestor(&self, id: EntityId, ancestor: EntityId) -> bool {
        let mut current = id;
        for _ in 0..MAX_COMPOSITION_DEPTH {
            let Some(link) = self.record_opt(current).and_then(EntityRecord::parent) else {
                return false;
            };
            if link.parent == ancestor {
                return true;
            }
            current = link.parent;
        }

        false
    }

    /// Number of composed ancestors above a record.
    pub(crate) fn composition_depth(&self, id: EntityId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(link) = self.record_opt(current).and_then(EntityRecord::parent) {
            depth += 1;
            current = link.parent;
            if depth >= MAX_COMPOSITION_DEPTH {
                break;
            }
        }

        depth
    }

    fn subtree_height(&self, id: EntityId) -> usize {
        self.child_ids(id)
            .into_iter()
            .map(|child| 1 + self.subtree_height(child))
            .max()
            .unwrap_or(0)
    }

    // ── Back-reference inference ───────────────────────

    /// Wire composition back-references for freshly attached/loaded records
    /// by matching foreign-key scalars against already-present entities, in
    /// both directions: children find parents, parents adopt orphans.
    pub(crate) fn infer_links_for(&mut self, ids: &[EntityId]) -> Result<(), EngineError> {
        // Phase 1: plan, read-only.
        let mut plans: Vec<(EntityId, &'static AssociationModel, EntityId)> = Vec::new();

        for &id in ids {
            let Some(record) = self.record_opt(id) else {
                continue;
            };

            // Child side: resolve this record's own parent.
            if record.parent().is_none() {
                for assoc in record.model().composed_associations() {
                    let Some(fk_key) = foreign_key_of(record, assoc) else {
                        continue;
                    };
                    let parent_model = self.registry().get(assoc.parent_entity)?;
                    if let Some(pid) = self.set_for(parent_model).lookup(&fk_key) {
                        if pid != id {
                            plans.push((id, assoc, pid));
                            break;
                        }
                    }
                }
            }

            // Parent side: adopt already-present orphans.
            let Some(my_key) = record.key() else {
                continue;
            };
            for (child_entity, assoc) in self
                .registry()
                .child_associations(record.entity_name())
                .iter()
                .copied()
            {
                if !assoc.composition {
                    continue;
                }
                let child_model = self.registry().get(child_entity)?;
                for cid in self.set_for(child_model).iter_live() {
                    if cid == id {
                        continue;
                    }
                    let Some(child_record) = self.record_opt(cid) else {
                        continue;
                    };
                    if child_record.parent().is_some() {
                        continue;
                    }
                    if foreign_key_of(child_record, assoc).as_ref() == Some(&my_key) {
                        plans.push((cid, assoc, id));
                    }
                }
            }
        }

        // Phase 2: wire, first plan per child wins.
        let mut wired: HashSet<EntityId> = HashSet::new();
        for (child, assoc, parent) in plans {
            if !wired.insert(child) {
                continue;
            }
            if self.record(child)?.parent().is_some() {
                continue;
            }
            self.wire_parent_raw(child, assoc, parent)?;
        }

        Ok(())
    }
}

// Derive the parent identity a child's foreign-key scalars point at.
pub(crate) fn foreign_key_of(record: &EntityRecord, assoc: &AssociationModel) -> Option<EntityKey> {
    let mut parts = Vec::with_capacity(assoc.fk_members.len());
    for fk in assoc.fk_members {
        let value = record.value(fk)?;
        if value.is_null() {
            return None;
        }
        parts.push(Key::try_from_value(value).ok()?);
    }

    Some(EntityKey::new(parts))
}
