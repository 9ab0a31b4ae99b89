//! Accept/Reject: transactional commit and rollback of pending changes.
//!
//! Contract:
//! - Per-entity Accept and Reject never cascade; clearing a hierarchy is
//!   strictly bottom-up, and the container-level operations enforce that
//!   order uniformly (descendants before ancestors).
//! - Accept commits the current values/associations as the new baseline;
//!   Reject restores the snapshots, reconnecting membership, back-references
//!   and foreign keys.
//! - Both are idempotent on an already-clean entity.

use crate::{
    error::{EngineError, ErrorOrigin},
    graph::{
        container::EntityContainer,
        events::CollectionChange,
        record::{EntityId, ParentLink},
        state::EntityState,
    },
    obs::{self, MetricsEvent},
};

impl EntityContainer {
    // ── Accept ─────────────────────────────────────────

    /// Commit one entity's pending change: New/Modified → Unmodified,
    /// Deleted → Detached (leaves its set permanently). Composed descendants
    /// keep whatever state they are in.
    pub fn accept(&mut self, id: EntityId) -> Result<(), EngineError> {
        match self.state(id) {
            EntityState::Detached => Err(EngineError::not_attached(
                ErrorOrigin::Graph,
                "cannot accept a detached entity",
            )),
            EntityState::Unmodified => Ok(()),
            EntityState::New => self.accept_insert(id),
            EntityState::Modified => self.accept_update(id),
            EntityState::Deleted => self.accept_delete(id),
        }
    }

    fn accept_insert(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let model = record.model();
        let entity_name = model.entity_name;
        let handle = record.display_handle();
        let key = record.key().ok_or_else(|| {
            EngineError::invariant(
                ErrorOrigin::Graph,
                format!("cannot accept {handle} without a key"),
            )
        })?;

        // The identity map normally already holds a keyed New record; claim
        // the slot if the key arrived late (server-assigned).
        if self.set_for(model).lookup(&key) != Some(id) {
            self.set_for_mut(model).rekey(id, None, Some(key))?;
        }

        let record = self.record_mut(id)?;
        record.set_state(EntityState::Unmodified);
        record.commit_baseline();
        self.events.note_state(entity_name, id);
        obs::emit(MetricsEvent::Accepted { entity: entity_name });

        Ok(())
    }

    fn accept_update(&mut self, id: EntityId) -> Result<(), EngineError> {
        let entity_name = self.record(id)?.entity_name();

        let record = self.record_mut(id)?;
        record.set_state(EntityState::Unmodified);
        record.commit_baseline();
        self.events.note_state(entity_name, id);
        obs::emit(MetricsEvent::Accepted { entity: entity_name });

        Ok(())
    }

    fn accept_delete(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let model = record.model();
        let key = record.key();

        self.set_for_mut(model).drop_tracked(id, key.as_ref());
        self.remove_record(id);
        // The delete is committed: no surviving baseline may reference it.
        self.scrub_references(id);

        self.events.note_state(model.entity_name, id);
        obs::emit(MetricsEvent::Accepted {
            entity: model.entity_name,
        });

        Ok(())
    }

    // ── Reject ─────────────────────────────────────────

    /// Roll back one entity's pending change: New → Detached (insert
    /// cancelled, cascading detach), Modified → Unmodified (values and
    /// membership restored), Deleted → Unmodified (re-attached). Does not
    /// retroactively clear an ancestor carrying independent edits.
    pub fn reject(&mut self, id: EntityId) -> Result<(), EngineError> {
        match self.state(id) {
            EntityState::Detached => Err(EngineError::not_attached(
                ErrorOrigin::Graph,
                "cannot reject a detached entity",
            )),
            EntityState::Unmodified => Ok(()),
            EntityState::New => {
                let entity_name = self.record(id)?.entity_name();
                self.detach_subtree(id);
                obs::emit(MetricsEvent::Rejected { entity: entity_name });
                Ok(())
            }
            EntityState::Modified => self.reject_update(id),
            EntityState::Deleted => self.reject_delete(id),
        }
    }

    fn reject_update(&mut self, id: EntityId) -> Result<(), EngineError> {
        let entity_name = self.record(id)?.entity_name();

        // Phase 1: scalars.
        self.record_mut(id)?.restore_values();

        // Phase 2: this record's own parent slot.
        let record = self.record(id)?;
        let current = record.parent();
        let target = record.original_parent_or_current();
        if current != target {
            if let Some(link) = current {
                if let Ok(parent_record) = self.record_mut(link.parent) {
                    parent_record.remove_child(link.association, id);
                }
                self.collapse_if_clean(link.parent);
            }
            self.restore_parent_slot(id, target)?;
        }

        // Phase 3: composed membership this record owns.
        self.restore_memberships(id)?;

        // Phase 4: finalize.
        let record = self.record_mut(id)?;
        record.finish_reject();
        self.events.note_state(entity_name, id);
        obs::emit(MetricsEvent::Rejected { entity: entity_name });

        Ok(())
    }

    fn reject_delete(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let model = record.model();
        let entity_name = model.entity_name;

        // Phase 1: re-claim the identity slot, checking occupancy before
        // the snapshot is consumed so a conflict leaves the record intact.
        let key = crate::key::entity_key_from_values(model.key, record.original_values_or_current())
            .ok();
        if let Some(key) = &key {
            if self.set_for(model).lookup(key).is_some() {
                return Err(EngineError::conflict(
                    ErrorOrigin::Set,
                    format!(
                        "cannot restore deleted entity: set '{entity_name}' already tracks key {key}"
                    ),
                ));
            }
        }
        self.record_mut(id)?.restore_values();
        self.set_for_mut(model).restore_live(id, key)?;

        // Phase 2: rejoin the composing parent's live membership.
        if let Some(link) = self.record(id)?.parent() {
            if let Ok(parent_record) = self.record_mut(link.parent) {
                parent_record.push_child(link.association, id);
            }
            self.collapse_if_clean(link.parent);
        }

        // Phase 3: finalize. Own membership snapshots stay until the
        // deleted descendants are themselves rejected.
        let record = self.record_mut(id)?;
        record.finish_reject();
        self.events
            .note_membership(entity_name, CollectionChange::Added(id));
        self.events.note_state(entity_name, id);
        obs::emit(MetricsEvent::Rejected { entity: entity_name });

        Ok(())
    }

    /// Restore this record's parent link to its snapshot target, rewiring
    /// membership and foreign keys when the target parent is still live.
    fn restore_parent_slot(
        &mut self,
        id: EntityId,
        target: Option<ParentLink>,
    ) -> Result<(), EngineError> {
        let Some(link) = target else {
            self.record_mut(id)?.set_parent_link(None);
            return Ok(());
        };

        let assoc = self
            .record(id)?
            .model()
            .association(link.association);
        let parent_live = self
            .record_opt(link.parent)
            .is_some_and(|parent| parent.state() != EntityState::Deleted);

        if let (Some(assoc), true) = (assoc, parent_live) {
            self.wire_parent_raw(id, assoc, link.parent)?;
            self.collapse_if_clean(link.parent);
        } else {
            // A deleted original parent keeps the link for diffing; its
            // membership is restored by rejecting the parent itself.
            self.record_mut(id)?.set_parent_link(Some(link));
        }

        Ok(())
    }

    /// Re-insert moved-away children and release added ones, reconnecting
    /// their back-references and foreign keys. Never changes another
    /// record's scalar state: un-deleting a child is its own reject.
    fn restore_memberships(&mut self, id: EntityId) -> Result<(), EngineError> {
        let Some(record) = self.record_opt(id) else {
            return Ok(());
        };
        let Some(original_map) = record.original_children_map().cloned() else {
            return Ok(());
        };
        let current_map = record.children_map().clone();

        let mut names: Vec<&'static str> =
            original_map.keys().chain(current_map.keys()).copied().collect();
        names.sort_unstable();
        names.dedup();

        for name in names {
            let original = original_map.get(name).cloned().unwrap_or_default();
            let current = current_map.get(name).cloned().unwrap_or_default();

            // Moved-away children come home.
            for child in original.iter().filter(|child| !current.contains(child)) {
                let Some(child_record) = self.record_opt(*child) else {
                    continue;
                };
                if child_record.state() == EntityState::Deleted {
                    continue;
                }
                let Some(assoc) = child_record.model().association(name) else {
                    continue;
                };

                if let Some(link) = child_record.parent() {
                    if link.parent != id {
                        if let Ok(parent_record) = self.record_mut(link.parent) {
                            parent_record.remove_child(link.association, *child);
                        }
                        self.collapse_if_clean(link.parent);
                    }
                }
                self.wire_parent_raw(*child, assoc, id)?;
                self.collapse_if_clean(*child);
            }

            // Added children return to their own original slot.
            for child in current.iter().filter(|child| !original.contains(child)) {
                let Some(child_record) = self.record_opt(*child) else {
                    continue;
                };
                let target = child_record.original_parent_or_current();
                if target.is_some_and(|link| link.parent == id) {
                    continue;
                }
                let Some(assoc) = child_record.model().association(name) else {
                    continue;
                };
                let fk_members = assoc.fk_members;

                self.record_mut(id)?.remove_child(name, *child);

                let target_live = target.is_some_and(|link| {
                    self.record_opt(link.parent)
                        .is_some_and(|parent| parent.state() != EntityState::Deleted)
                });
                if let (Some(link), true) = (target, target_live) {
                    let Some(target_assoc) = self
                        .record(*child)?
                        .model()
                        .association(link.association)
                    else {
                        continue;
                    };
                    self.wire_parent_raw(*child, target_assoc, link.parent)?;
                } else {
                    let child_record = self.record_mut(*child)?;
                    child_record.set_parent_link(None);
                    for fk in fk_members.iter().copied() {
                        child_record.write_value(fk, crate::value::Value::Null);
                    }
                }
                self.collapse_if_clean(*child);
            }
        }

        Ok(())
    }

    /// Collapse a record whose snapshots all match current state back to
    /// Unmodified. A rolled-back move leaves no residue on its waypoints.
    pub(crate) fn collapse_if_clean(&mut self, id: EntityId) {
        let Some(record) = self.record_opt(id) else {
            return;
        };
        let entity_name = record.entity_name();

        match record.state() {
            EntityState::Modified if record.is_effectively_clean() => {
                if let Ok(record) = self.record_mut(id) {
                    record.set_state(EntityState::Unmodified);
                    record.commit_baseline();
                }
                self.events.note_state(entity_name, id);
            }
            EntityState::Unmodified => {
                if let Ok(record) = self.record_mut(id) {
                    record.collapse_snapshots();
                }
            }
            _ => {}
        }
    }

    // ── Container-wide propagation ─────────────────────

    /// Accept every pending change, strictly bottom-up.
    pub fn accept_changes(&mut self) -> Result<(), EngineError> {
        for id in self.pending_bottom_up() {
            if self.state(id).has_pending_change() {
                self.accept(id)?;
            }
        }

        Ok(())
    }

    /// Roll back every pending change, strictly bottom-up.
    pub fn reject_changes(&mut self) -> Result<(), EngineError> {
        for id in self.pending_bottom_up() {
            if self.state(id).has_pending_change() {
                self.reject(id)?;
            }
        }

        Ok(())
    }

    /// Pending ids ordered descendants-first (composition depth descending,
    /// id ascending within a depth).
    pub(crate) fn pending_bottom_up(&self) -> Vec<EntityId> {
        let mut pending: Vec<(usize, EntityId)> = self
            .tracked_ids()
            .into_iter()
            .filter(|id| self.state(*id).has_pending_change())
            .map(|id| (self.composition_depth(id), id))
            .collect();

        pending.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        pending.into_iter().map(|(_, id)| id).collect()
    }
}
