//! Tracking lifecycle: Add, Attach, Load, Remove, Detach.
//!
//! Add and Attach accept whole detached graphs (nested `EntityData`
//! children) and cascade over composed descendants; Remove cascades delete,
//! Detach is unconditional teardown. Load merges against the identity map
//! and wires composition back-references by foreign-key inference.

use crate::{
    error::{EngineError, ErrorOrigin},
    graph::{
        container::EntityContainer,
        data::EntityData,
        events::CollectionChange,
        record::{EntityId, EntityRecord},
        state::EntityState,
    },
    model::{AssociationModel, EntityModel, SetCapability},
    obs::{self, MetricsEvent, MutationKind},
    value::Value,
};
use std::collections::BTreeMap;

///
/// LoadMerge
///
/// Merge behavior when a loaded key is already live.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadMerge {
    /// Refresh Unmodified records only; pending edits win.
    #[default]
    KeepCurrent,
    /// Refresh Modified records too, discarding their pending edits.
    OverwriteCurrent,
}

///
/// LoadOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct LoadOptions {
    pub merge: LoadMerge,
    /// Full-graph loads carry nested composed children; flat loads rely on
    /// foreign-key inference only and refuse nested payloads.
    pub is_full_graph: bool,
}

impl EntityContainer {
    // ── Add ────────────────────────────────────────────

    /// Track a detached graph as pending inserts: the root and every nested
    /// composed descendant transition Detached → New.
    pub fn add(&mut self, data: EntityData) -> Result<EntityId, EngineError> {
        let model = self.registry().get(&data.entity)?;
        self.set_for(model).ensure_capability(SetCapability::ADD)?;

        let mut created = Vec::new();
        match self.add_graph(&data, &mut created) {
            Ok(id) => Ok(id),
            Err(err) => {
                // Unwind the partial cascade so the graph stays consistent.
                self.forget_created(&created);
                Err(err)
            }
        }
    }

    fn add_graph(
        &mut self,
        data: &EntityData,
        created: &mut Vec<EntityId>,
    ) -> Result<EntityId, EngineError> {
        let model = self.registry().get(&data.entity)?;
        let id = self.materialize_record(model, data, EntityState::New)?;
        created.push(id);

        let key = self.record(id)?.key();
        self.set_for_mut(model).insert_live(id, key)?;
        self.events
            .note_membership(model.entity_name, CollectionChange::Added(id));
        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Add,
            entity: model.entity_name,
        });

        for (assoc_name, kids) in &data.children {
            for kid in kids {
                let assoc = self.resolve_nested(model, assoc_name, kid)?;
                let kid_id = self.add_graph(kid, created)?;
                self.wire_parent_raw(kid_id, assoc, id)?;
            }
        }

        Ok(id)
    }

    // ── Attach ─────────────────────────────────────────

    /// Track a detached graph as already-persisted state: the root and every
    /// nested composed descendant transition Detached → Unmodified, then
    /// back-references are inferred against the whole container.
    pub fn attach(&mut self, data: EntityData) -> Result<EntityId, EngineError> {
        let mut created = Vec::new();
        let result = self.attach_graph(&data, &mut created);

        match result {
            Ok(id) => {
                self.infer_links_for(&created)?;
                Ok(id)
            }
            Err(err) => {
                self.forget_created(&created);
                Err(err)
            }
        }
    }

    fn attach_graph(
        &mut self,
        data: &EntityData,
        created: &mut Vec<EntityId>,
    ) -> Result<EntityId, EngineError> {
        let model = self.registry().get(&data.entity)?;
        let id = self.materialize_record(model, data, EntityState::Unmodified)?;
        created.push(id);

        let key = self.record(id)?.key().ok_or_else(|| {
            EngineError::invariant(
                ErrorOrigin::Graph,
                format!("cannot attach '{}' without a key", model.entity_name),
            )
        })?;
        self.set_for_mut(model).insert_live(id, Some(key))?;
        self.events
            .note_membership(model.entity_name, CollectionChange::Added(id));
        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Attach,
            entity: model.entity_name,
        });

        for (assoc_name, kids) in &data.children {
            for kid in kids {
                let assoc = self.resolve_nested(model, assoc_name, kid)?;
                let kid_id = self.attach_graph(kid, created)?;
                self.wire_parent_raw(kid_id, assoc, id)?;
            }
        }

        Ok(id)
    }

    // ── Load ───────────────────────────────────────────

    /// Load already-deserialized entities, merging against the identity map
    /// and inferring composition back-references from foreign-key scalars.
    /// Returns the root-level ids, whether inserted or merged.
    pub fn load_entities(
        &mut self,
        entities: Vec<EntityData>,
        options: LoadOptions,
    ) -> Result<Vec<EntityId>, EngineError> {
        let mut touched = Vec::new();
        let mut roots = Vec::with_capacity(entities.len());

        for data in &entities {
            let id = self.load_one(data, options, &mut touched)?;
            roots.push(id);
        }

        self.infer_links_for(&touched)?;

        Ok(roots)
    }

    fn load_one(
        &mut self,
        data: &EntityData,
        options: LoadOptions,
        touched: &mut Vec<EntityId>,
    ) -> Result<EntityId, EngineError> {
        if !options.is_full_graph && !data.children.is_empty() {
            return Err(EngineError::invariant(
                ErrorOrigin::Graph,
                format!("flat load of '{}' cannot carry nested entities", data.entity),
            ));
        }

        let model = self.registry().get(&data.entity)?;
        let probe = self.materialize_values(model, data)?;
        let key = crate::key::entity_key_from_values(model.key, &probe).map_err(|_| {
            EngineError::invariant(
                ErrorOrigin::Graph,
                format!("cannot load '{}' without a key", model.entity_name),
            )
        })?;

        let id = if let Some(existing) = self.set_for(model).lookup(&key) {
            self.merge_loaded(existing, probe, options.merge)?;
            existing
        } else {
            let id = self.allocate_id();
            self.insert_record(EntityRecord::new(id, model, EntityState::Unmodified, probe));
            self.set_for_mut(model).insert_live(id, Some(key))?;
            self.events
                .note_membership(model.entity_name, CollectionChange::Added(id));
            obs::emit(MetricsEvent::Mutation {
                kind: MutationKind::Load,
                entity: model.entity_name,
            });
            id
        };
        touched.push(id);

        for (assoc_name, kids) in &data.children {
            for kid in kids {
                let assoc = self.resolve_nested(model, assoc_name, kid)?;
                let kid_id = self.load_one(kid, options, touched)?;
                self.rewire_loaded(kid_id, assoc, id)?;
            }
        }

        Ok(id)
    }

    /// Merge a loaded payload into an already-tracked record.
    fn merge_loaded(
        &mut self,
        id: EntityId,
        values: BTreeMap<&'static str, Value>,
        merge: LoadMerge,
    ) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let entity_name = record.entity_name();

        match (record.state(), merge) {
            (EntityState::Unmodified, _) => {
                let record = self.record_mut(id)?;
                record.replace_values(values);
            }
            (EntityState::Modified, LoadMerge::OverwriteCurrent) => {
                let record = self.record_mut(id)?;
                record.replace_values(values);
                record.commit_baseline();
                record.set_state(EntityState::Unmodified);
                self.events.note_state(entity_name, id);
            }
            // Pending edits win: Modified under KeepCurrent, and New always.
            _ => {}
        }

        Ok(())
    }

    /// Nested payloads are authoritative for membership: rewire a loaded
    /// child under its loaded parent without snapshots or transitions.
    fn rewire_loaded(
        &mut self,
        child: EntityId,
        assoc: &'static AssociationModel,
        parent: EntityId,
    ) -> Result<(), EngineError> {
        let current = self.record(child)?.parent();
        if current.is_some_and(|link| link.parent == parent && link.association == assoc.name) {
            return Ok(());
        }

        if let Some(link) = current {
            if let Ok(old_parent) = self.record_mut(link.parent) {
                old_parent.remove_child(link.association, child);
            }
        }
        self.wire_parent_raw(child, assoc, parent)
    }

    // ── Remove ─────────────────────────────────────────

    /// Schedule a pending delete (Unmodified/Modified → Deleted), cascading
    /// to every transitively composed descendant; a New root cancels its
    /// pending insert instead, cascading detach.
    pub fn remove(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self
            .record(id)
            .map_err(|_| EngineError::not_attached(ErrorOrigin::Graph, "cannot remove a detached entity"))?;
        let model = record.model();
        let state = record.state();

        if state == EntityState::Deleted {
            return Err(EngineError::invariant(
                ErrorOrigin::Graph,
                format!("entity {} is already removed", record.display_handle()),
            ));
        }
        self.set_for(model).ensure_capability(SetCapability::REMOVE)?;

        if state == EntityState::New {
            self.detach_subtree(id);
        } else {
            self.delete_subtree(id);
        }

        Ok(())
    }

    /// Re-add a previously removed entity under its key: Deleted → Modified.
    ///
    /// The original-value snapshot survives, so the pending change becomes
    /// an update against the store, not an insert.
    pub fn readd(&mut self, id: EntityId) -> Result<(), EngineError> {
        let record = self
            .record(id)
            .map_err(|_| EngineError::not_attached(ErrorOrigin::Graph, "cannot re-add a detached entity"))?;
        let model = record.model();
        let entity_name = model.entity_name;

        if record.state() != EntityState::Deleted {
            return Err(EngineError::invariant(
                ErrorOrigin::Graph,
                format!("only removed entities can be re-added, {} is {}", record.display_handle(), record.state()),
            ));
        }
        self.set_for(model).ensure_capability(SetCapability::ADD)?;

        let key = record.key();
        let link = record.parent();
        self.set_for_mut(model).restore_live(id, key)?;

        if let Some(link) = link {
            if let Ok(parent_record) = self.record_mut(link.parent) {
                parent_record.push_child(link.association, id);
            }
        }

        self.record_mut(id)?.set_state(EntityState::Modified);
        self.events
            .note_membership(entity_name, CollectionChange::Added(id));
        self.events.note_state(entity_name, id);
        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Add,
            entity: entity_name,
        });

        Ok(())
    }

    fn delete_subtree(&mut self, root: EntityId) {
        let mut nodes = vec![root];
        nodes.extend(self.composed_descendants(root));

        for node in nodes {
            match self.state(node) {
                EntityState::New => self.detach_node(node),
                EntityState::Unmodified | EntityState::Modified => self.delete_node(node),
                _ => {}
            }
        }
    }

    fn delete_node(&mut self, id: EntityId) {
        let Some(record) = self.record_opt(id) else {
            return;
        };
        let model = record.model();
        let key = record.key();
        let link = record.parent();

        // Membership leaves the live collection; the parent's snapshot keeps
        // the pre-delete membership and its state stays untouched.
        if let Some(link) = link {
            if let Ok(parent_record) = self.record_mut(link.parent) {
                parent_record.ensure_children_snapshot();
                parent_record.remove_child(link.association, id);
            }
        }

        if let Ok(record) = self.record_mut(id) {
            record.ensure_value_snapshot();
            record.set_state(EntityState::Deleted);
        }
        self.set_for_mut(model).mark_removed(id, key.as_ref());

        self.events
            .note_membership(model.entity_name, CollectionChange::Removed(id));
        self.events.note_state(model.entity_name, id);
        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Remove,
            entity: model.entity_name,
        });
    }

    // ── Detach ─────────────────────────────────────────

    /// Unconditional removal from tracking regardless of prior state,
    /// cascading to composed descendants. Non-transactional teardown.
    pub fn detach(&mut self, id: EntityId) -> Result<(), EngineError> {
        self.record(id)
            .map_err(|_| EngineError::not_attached(ErrorOrigin::Graph, "cannot detach a detached entity"))?;
        self.detach_subtree(id);

        Ok(())
    }

    pub(crate) fn detach_subtree(&mut self, root: EntityId) {
        let mut nodes = vec![root];
        nodes.extend(self.composed_descendants(root));

        for node in nodes {
            self.detach_node(node);
        }
    }

    fn detach_node(&mut self, id: EntityId) {
        let Some(record) = self.record_opt(id) else {
            return;
        };
        let model = record.model();
        let key = record.key();
        let link = record.parent();

        if let Some(link) = link {
            if let Ok(parent_record) = self.record_mut(link.parent) {
                parent_record.remove_child(link.association, id);
            }
        }

        self.set_for_mut(model).drop_tracked(id, key.as_ref());
        self.remove_record(id);
        self.scrub_references(id);

        self.events
            .note_membership(model.entity_name, CollectionChange::Removed(id));
        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Detach,
            entity: model.entity_name,
        });
    }

    /// Erase a vanished id from every surviving association cache, current
    /// and original; teardown must not leave dangling ids.
    pub(crate) fn scrub_references(&mut self, id: EntityId) {
        for record in self.records_mut() {
            record.scrub_reference(id);
        }
    }

    // ── Shared construction helpers ────────────────────

    /// Validate a payload against the model and produce the full property
    /// map: every declared field present, absent scalars as null.
    fn materialize_values(
        &self,
        model: &'static EntityModel,
        data: &EntityData,
    ) -> Result<BTreeMap<&'static str, Value>, EngineError> {
        let mut values: BTreeMap<&'static str, Value> = model
            .fields
            .iter()
            .map(|field| (field.name, Value::Null))
            .collect();

        for (field, value) in &data.values {
            let field_model = model.field(field).ok_or_else(|| {
                EngineError::invariant(
                    ErrorOrigin::Graph,
                    format!("unknown field '{field}' on entity '{}'", model.entity_name),
                )
            })?;
            if !field_model.kind.admits(value) {
                return Err(EngineError::invariant(
                    ErrorOrigin::Graph,
                    format!(
                        "field '{}.{field}' expects {}, got {}",
                        model.entity_name,
                        field_model.kind.label(),
                        value.kind_label()
                    ),
                ));
            }
            values.insert(field_model.name, value.clone());
        }

        Ok(values)
    }

    fn materialize_record(
        &mut self,
        model: &'static EntityModel,
        data: &EntityData,
        state: EntityState,
    ) -> Result<EntityId, EngineError> {
        let values = self.materialize_values(model, data)?;
        let id = self.allocate_id();
        self.insert_record(EntityRecord::new(id, model, state, values));

        Ok(id)
    }

    /// Resolve and validate one nested child payload: the association must
    /// exist on the child's model, be a composition, and point back here.
    fn resolve_nested(
        &self,
        parent_model: &'static EntityModel,
        assoc_name: &str,
        kid: &EntityData,
    ) -> Result<&'static AssociationModel, EngineError> {
        let kid_model = self.registry().get(&kid.entity)?;
        let assoc = kid_model.association(assoc_name).ok_or_else(|| {
            EngineError::not_found(
                ErrorOrigin::Graph,
                format!(
                    "unknown association '{assoc_name}' on entity '{}'",
                    kid_model.entity_name
                ),
            )
        })?;

        if !assoc.composition {
            return Err(EngineError::unsupported(
                ErrorOrigin::Graph,
                format!("association '{assoc_name}' is not a composition"),
            ));
        }
        if assoc.parent_entity != parent_model.entity_name {
            return Err(EngineError::invariant(
                ErrorOrigin::Graph,
                format!(
                    "association '{assoc_name}' expects parent '{}', got '{}'",
                    assoc.parent_entity, parent_model.entity_name
                ),
            ));
        }

        Ok(assoc)
    }

    /// Drop records created by a failed cascade, newest first.
    fn forget_created(&mut self, created: &[EntityId]) {
        for &id in created.iter().rev() {
            if let Some(record) = self.record_opt(id) {
                let model = record.model();
                let key = record.key();
                self.set_for_mut(model).drop_tracked(id, key.as_ref());
                self.remove_record(id);
                self.events
                    .note_membership(model.entity_name, CollectionChange::Removed(id));
            }
        }
    }
}
