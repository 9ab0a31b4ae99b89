use crate::{
    changeset::{ChangedEntity, EntityChangeSet},
    error::{EngineError, ErrorOrigin},
    graph::{
        events::{CollectionChange, EventLog, GraphEvent},
        record::{EntityError, EntityId, EntityInvocation, EntityRecord},
        set::EntitySet,
        state::EntityState,
    },
    key::EntityKey,
    model::{EntityModel, ModelRegistry, SetCapability},
    obs::{self, MetricsEvent, MutationKind},
    value::Value,
};
use std::collections::{BTreeMap, HashMap};

///
/// EntityContainer
///
/// Aggregate owner of all entity sets for one client data context, plus the
/// identity-keyed arena every tracked record lives in. One container per
/// context; exclusively owned; single-threaded.
///
/// Parent/child links are `EntityId` lookups into the arena, no shared
/// ownership, no strong cycles.
///

pub struct EntityContainer {
    registry: ModelRegistry,
    sets: Vec<EntitySet>,
    set_index: HashMap<&'static str, usize>,
    entities: BTreeMap<EntityId, EntityRecord>,
    next_id: u64,
    pub(crate) events: EventLog,
}

impl EntityContainer {
    /// Build a container and one set per registered model.
    pub fn new(models: &[&'static EntityModel]) -> Result<Self, EngineError> {
        let registry = ModelRegistry::new(models)?;
        let sets: Vec<EntitySet> = registry.models().map(EntitySet::new).collect();
        let set_index = sets
            .iter()
            .enumerate()
            .map(|(index, set)| (set.name(), index))
            .collect();

        Ok(Self {
            registry,
            sets,
            set_index,
            entities: BTreeMap::new(),
            next_id: 0,
            events: EventLog::default(),
        })
    }

    #[must_use]
    pub(crate) const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    // ── Lookup ─────────────────────────────────────────

    /// Borrow the set for an entity name.
    pub fn set(&self, entity: &str) -> Result<&EntitySet, EngineError> {
        let model = self.registry.get(entity)?;
        Ok(self.set_for(model))
    }

    /// Iterate sets in model declaration order.
    pub fn sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.sets.iter()
    }

    pub(crate) fn set_for(&self, model: &'static EntityModel) -> &EntitySet {
        // Registry validation guarantees every model has a set.
        let index = self.set_index[model.entity_name];
        &self.sets[index]
    }

    pub(crate) fn set_for_mut(&mut self, model: &'static EntityModel) -> &mut EntitySet {
        let index = self.set_index[model.entity_name];
        &mut self.sets[index]
    }

    /// Borrow a tracked record.
    pub fn record(&self, id: EntityId) -> Result<&EntityRecord, EngineError> {
        self.entities.get(&id).ok_or_else(|| {
            EngineError::not_attached(ErrorOrigin::Graph, format!("entity {id} is not attached"))
        })
    }

    pub(crate) fn record_mut(&mut self, id: EntityId) -> Result<&mut EntityRecord, EngineError> {
        self.entities.get_mut(&id).ok_or_else(|| {
            EngineError::not_attached(ErrorOrigin::Graph, format!("entity {id} is not attached"))
        })
    }

    pub(crate) fn record_opt(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// State of an id; untracked ids read as Detached.
    #[must_use]
    pub fn state(&self, id: EntityId) -> EntityState {
        self.entities
            .get(&id)
            .map_or(EntityState::Detached, EntityRecord::state)
    }

    /// Identity-map lookup: live record of one type under one key.
    pub fn lookup(&self, entity: &str, key: &EntityKey) -> Result<Option<EntityId>, EngineError> {
        Ok(self.set(entity)?.lookup(key))
    }

    /// Current value of one field.
    pub fn value(&self, id: EntityId, field: &str) -> Result<Value, EngineError> {
        let record = self.record(id)?;
        record.value(field).cloned().ok_or_else(|| {
            EngineError::not_found(
                ErrorOrigin::Graph,
                format!("unknown field '{field}' on entity '{}'", record.entity_name()),
            )
        })
    }

    pub(crate) fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    pub(crate) fn insert_record(&mut self, record: EntityRecord) {
        self.entities.insert(record.id(), record);
    }

    pub(crate) fn remove_record(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.entities.remove(&id)
    }

    pub(crate) fn tracked_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut EntityRecord> {
        self.entities.values_mut()
    }

    // ── Scalar edits ───────────────────────────────────

    /// Edit one scalar property.
    ///
    /// Key members are immutable once attached; on a New record a key edit
    /// re-indexes the identity map instead.
    pub fn set_value(
        &mut self,
        id: EntityId,
        field: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let model = record.model();
        let state = record.state();

        if state == EntityState::Deleted {
            return Err(EngineError::invariant(
                ErrorOrigin::Graph,
                format!("cannot edit deleted entity {}", record.display_handle()),
            ));
        }

        let field_model = model.field(field).ok_or_else(|| {
            EngineError::not_found(
                ErrorOrigin::Graph,
                format!("unknown field '{field}' on entity '{}'", model.entity_name),
            )
        })?;
        if !field_model.kind.admits(&value) {
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

        self.set_for(model).ensure_capability(SetCapability::EDIT)?;

        if record.value(field) == Some(&value) {
            return Ok(());
        }

        // Key-member edits: re-index New records, refuse attached ones.
        let rekey = if model.is_key_member(field) {
            if state != EntityState::New {
                return Err(EngineError::invariant(
                    ErrorOrigin::Graph,
                    format!(
                        "key member '{}.{field}' is immutable once attached",
                        model.entity_name
                    ),
                ));
            }

            let old_key = record.key();
            let mut prospective = record.values().clone();
            prospective.insert(field_model.name, value.clone());
            let new_key =
                crate::key::entity_key_from_values(model.key, &prospective).ok();

            // Conflict check happens before any mutation.
            if let Some(new_key) = &new_key {
                if self
                    .set_for(model)
                    .lookup(new_key)
                    .is_some_and(|occupant| occupant != id)
                {
                    return Err(EngineError::conflict(
                        ErrorOrigin::Set,
                        format!(
                            "entity set '{}' already tracks key {new_key}",
                            model.entity_name
                        ),
                    ));
                }
            }
            Some((old_key, new_key))
        } else {
            None
        };

        let entity_name = model.entity_name;
        let record = self.record_mut(id)?;
        if state == EntityState::Unmodified {
            record.ensure_value_snapshot();
            record.set_state(EntityState::Modified);
            self.events.note_state(entity_name, id);
        }
        let record = self.record_mut(id)?;
        record.write_value(field_model.name, value);

        if let Some((old_key, new_key)) = rekey {
            self.set_for_mut(model)
                .rekey(id, old_key.as_ref(), new_key)?;
        }

        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Edit,
            entity: entity_name,
        });

        Ok(())
    }

    /// Merge store-refreshed values into a record without an edit
    /// transition. Used by the submit-result layer.
    pub(crate) fn refresh_values(
        &mut self,
        id: EntityId,
        refreshed: &BTreeMap<String, Value>,
    ) -> Result<(), EngineError> {
        let record = self.record(id)?;
        let model = record.model();
        let state = record.state();
        let old_key = record.key();

        let mut writes = Vec::with_capacity(refreshed.len());
        for (field, value) in refreshed {
            let field_model = model.field(field).ok_or_else(|| {
                EngineError::not_found(
                    ErrorOrigin::Submit,
                    format!("unknown field '{field}' on entity '{}'", model.entity_name),
                )
            })?;
            if !field_model.kind.admits(value) {
                return Err(EngineError::invariant(
                    ErrorOrigin::Submit,
                    format!(
                        "field '{}.{field}' expects {}, got {}",
                        model.entity_name,
                        field_model.kind.label(),
                        value.kind_label()
                    ),
                ));
            }
            writes.push((field_model.name, value.clone()));
        }

        let record = self.record_mut(id)?;
        for (field, value) in writes {
            record.write_value(field, value);
        }

        // A refresh may assign the server key of a pending insert.
        if state == EntityState::New {
            let new_key = self.record(id)?.key();
            if new_key != old_key {
                self.set_for_mut(model).rekey(id, old_key.as_ref(), new_key)?;
            }
        }

        Ok(())
    }

    // ── Custom-method invocations ──────────────────────

    /// Queue a named custom-method invocation against an attached entity.
    pub fn invoke(
        &mut self,
        id: EntityId,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<(), EngineError> {
        let method = method.into();
        let record = self.record(id)?;
        let model = record.model();
        let entity_name = model.entity_name;

        if record.state() == EntityState::Deleted {
            return Err(EngineError::invariant(
                ErrorOrigin::Graph,
                format!("cannot invoke '{method}' on deleted entity {}", record.display_handle()),
            ));
        }
        self.set_for(model).ensure_capability(SetCapability::EDIT)?;

        if record
            .invocations()
            .iter()
            .any(|invocation| invocation.method == method)
        {
            return Err(EngineError::conflict(
                ErrorOrigin::Graph,
                format!(
                    "invocation '{method}' is already queued on entity {}",
                    record.display_handle()
                ),
            ));
        }

        let state = record.state();
        let record = self.record_mut(id)?;
        if state == EntityState::Unmodified {
            record.ensure_value_snapshot();
            record.set_state(EntityState::Modified);
            self.events.note_state(entity_name, id);
        }
        let record = self.record_mut(id)?;
        record.push_invocation(EntityInvocation { method, args });

        obs::emit(MetricsEvent::Mutation {
            kind: MutationKind::Invoke,
            entity: entity_name,
        });

        Ok(())
    }

    /// Attach validation/conflict annotations from the submit-result layer.
    pub fn attach_entity_errors(
        &mut self,
        id: EntityId,
        errors: Vec<EntityError>,
    ) -> Result<(), EngineError> {
        self.record_mut(id)?.set_entity_errors(errors);
        Ok(())
    }

    // ── Pending-change queries ─────────────────────────

    /// Derived, never stored: pending change on the record itself or on any
    /// composed descendant (deleted descendants count via their preserved
    /// parent links).
    #[must_use]
    pub fn entity_has_changes(&self, id: EntityId) -> bool {
        let Some(record) = self.entities.get(&id) else {
            return false;
        };
        if record.has_own_change() {
            return true;
        }

        self.entities.values().any(|other| {
            other.has_own_change() && self.has_composed_ancestor(other.id(), id)
        })
    }

    /// Whether any entity of one set carries a pending change.
    pub fn set_has_changes(&self, entity: &str) -> Result<bool, EngineError> {
        let set = self.set(entity)?;
        Ok(set
            .iter_tracked()
            .filter_map(|id| self.entities.get(&id))
            .any(EntityRecord::has_own_change))
    }

    /// Whether any tracked entity carries a pending change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entities.values().any(EntityRecord::has_own_change)
    }

    /// Snapshot every pending change across all sets, deduplicated, in
    /// deterministic set-then-insertion order.
    #[must_use]
    pub fn get_changes(&self) -> EntityChangeSet {
        let mut changes = EntityChangeSet::default();

        for set in &self.sets {
            for id in set.iter_live() {
                let Some(record) = self.entities.get(&id) else {
                    continue;
                };
                let descriptor = ChangedEntity {
                    id,
                    entity_name: record.entity_name(),
                    key: record.key(),
                    state: record.state(),
                };
                match record.state() {
                    EntityState::New => changes.added.push(descriptor),
                    EntityState::Modified => changes.modified.push(descriptor),
                    _ => {}
                }
            }
            for id in set.iter_removed() {
                let Some(record) = self.entities.get(&id) else {
                    continue;
                };
                changes.removed.push(ChangedEntity {
                    id,
                    entity_name: record.entity_name(),
                    key: record.key(),
                    state: record.state(),
                });
            }
        }

        changes
    }

    // ── Teardown ───────────────────────────────────────

    /// Drop every tracked record and reset all sets.
    pub fn clear(&mut self) {
        self.entities.clear();
        for set in &mut self.sets {
            set.clear();
            self.events
                .note_membership(set.name(), CollectionChange::Reset);
        }
    }

    /// Drain buffered change notifications.
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        self.events.take()
    }
}
