use crate::{
    changeset::{
        ChangedEntity, EntityChangeSet,
        entry::{ChangeSetEntry, EntityPayload, EntryOperation},
        validate::validate_entries,
    },
    error::{EngineError, ErrorClass, ErrorOrigin},
    graph::{EntityContainer, EntityId, EntityRecord, EntityState},
    obs::{self, MetricsEvent},
};
use std::collections::BTreeMap;

///
/// AssociationDelta
///
/// Current and original association membership of one entry, as
/// (association name, member ids) pairs. Parent-side collections win a name
/// collision with the child-side back-reference (self-referential
/// compositions); the back-reference stays recoverable from the fk scalars.
///

#[derive(Default)]
struct AssociationDelta {
    current: BTreeMap<&'static str, Vec<EntityId>>,
    original: BTreeMap<&'static str, Vec<EntityId>>,
}

impl AssociationDelta {
    fn referenced(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.current
            .values()
            .chain(self.original.values())
            .flatten()
            .copied()
    }
}

/// Compile a pending-change snapshot into the ordered wire operation list.
///
/// Correlation ids are assigned 1..=n over added, modified, removed, then
/// synthesized participants, so every referenced entry has an id before any
/// entry referencing it. The structural validation pass always runs before
/// the list is returned.
pub fn build_operations(
    container: &EntityContainer,
    changes: &EntityChangeSet,
) -> Result<Vec<ChangeSetEntry>, EngineError> {
    // Phase 1: correlation ids for the changed entities.
    let mut op_ids: BTreeMap<EntityId, i64> = BTreeMap::new();
    let mut next_id = 1i64;
    for changed in changes.iter_all() {
        if !op_ids.contains_key(&changed.id) {
            op_ids.insert(changed.id, next_id);
            next_id += 1;
        }
    }

    // Phase 2: association deltas, synthesizing None participants for
    // unmodified entities that a changed association references.
    let mut deltas: BTreeMap<EntityId, AssociationDelta> = BTreeMap::new();
    let mut extras: Vec<EntityId> = Vec::new();
    for changed in changes.iter_all() {
        let record = container.record(changed.id)?;
        let delta = association_delta(record, changed.state);

        for referenced in delta.referenced() {
            if op_ids.contains_key(&referenced) {
                continue;
            }
            // Referenced entities must still be tracked; a dangling id means
            // the snapshot outlived the graph it described.
            container.record(referenced).map_err(|_| {
                EngineError::new(
                    ErrorClass::InvariantViolation,
                    ErrorOrigin::ChangeSet,
                    format!("association references untracked entity {referenced}"),
                )
            })?;
            op_ids.insert(referenced, next_id);
            next_id += 1;
            extras.push(referenced);
        }

        deltas.insert(changed.id, delta);
    }

    // Phase 3: entries, changed entities first, then the None participants.
    let mut entries = Vec::with_capacity(changes.len() + extras.len());
    for changed in changes.iter_all() {
        let record = container.record(changed.id)?;
        let delta = deltas.remove(&changed.id).unwrap_or_default();
        entries.push(make_entry(record, changed, &delta, &op_ids)?);
    }
    for id in extras {
        let record = container.record(id)?;
        entries.push(ChangeSetEntry {
            id: op_ids[&id],
            entity_id: id,
            operation: EntryOperation::None,
            entity: payload_of(record.entity_name(), record.values()),
            original_entity: None,
            associations: BTreeMap::new(),
            original_associations: BTreeMap::new(),
            invocations: Vec::new(),
            errors: Vec::new(),
        });
    }

    // Phase 4: no structurally unsatisfiable change set reaches transport.
    validate_entries(container, &entries)?;

    obs::emit(MetricsEvent::ChangeSetBuilt {
        entries: entries.len() as u64,
    });

    Ok(entries)
}

fn payload_of(
    entity: &'static str,
    values: &BTreeMap<&'static str, crate::value::Value>,
) -> EntityPayload {
    EntityPayload {
        entity,
        values: values.clone(),
    }
}

// Resolve the association lists one entry carries, by operation.
fn association_delta(record: &EntityRecord, state: EntityState) -> AssociationDelta {
    let mut delta = AssociationDelta::default();

    match state {
        // Insert: full current membership plus the current back-reference.
        EntityState::New => {
            for (name, members) in record.children_map() {
                if !members.is_empty() {
                    delta.current.insert(*name, members.clone());
                }
            }
            if let Some(link) = record.parent() {
                delta
                    .current
                    .entry(link.association)
                    .or_insert_with(|| vec![link.parent]);
            }
        }

        // Update: only associations whose membership actually changed.
        EntityState::Modified => {
            let mut names: Vec<&'static str> = record.children_map().keys().copied().collect();
            if let Some(original) = record.original_children_map() {
                names.extend(original.keys().copied());
            }
            names.sort_unstable();
            names.dedup();

            for name in names {
                let current = record.children(name);
                let original = record.original_children_or_current(name);
                if current != original {
                    delta.current.insert(name, current.to_vec());
                    delta.original.insert(name, original.to_vec());
                }
            }

            let current_link = record.parent();
            let original_link = record.original_parent_or_current();
            if current_link != original_link {
                if let Some(link) = current_link {
                    delta
                        .current
                        .entry(link.association)
                        .or_insert_with(|| vec![link.parent]);
                }
                if let Some(link) = original_link {
                    delta
                        .original
                        .entry(link.association)
                        .or_insert_with(|| vec![link.parent]);
                }
            }
        }

        // Delete: the pre-delete membership is what the server must undo;
        // the preserved back-reference names the owning parent.
        EntityState::Deleted => {
            let mut names: Vec<&'static str> = record.children_map().keys().copied().collect();
            if let Some(original) = record.original_children_map() {
                names.extend(original.keys().copied());
            }
            names.sort_unstable();
            names.dedup();

            for name in names {
                let original = record.original_children_or_current(name);
                if !original.is_empty() {
                    delta.original.insert(name, original.to_vec());
                }
            }
            if let Some(link) = record.original_parent_or_current() {
                delta
                    .original
                    .entry(link.association)
                    .or_insert_with(|| vec![link.parent]);
            }
            if let Some(link) = record.parent() {
                delta
                    .current
                    .entry(link.association)
                    .or_insert_with(|| vec![link.parent]);
            }
        }

        _ => {}
    }

    delta
}

fn make_entry(
    record: &EntityRecord,
    changed: &ChangedEntity,
    delta: &AssociationDelta,
    op_ids: &BTreeMap<EntityId, i64>,
) -> Result<ChangeSetEntry, EngineError> {
    let operation = match changed.state {
        EntityState::New => EntryOperation::Insert,
        EntityState::Modified => EntryOperation::Update,
        EntityState::Deleted => EntryOperation::Delete,
        _ => EntryOperation::None,
    };

    let original_entity = match operation {
        EntryOperation::Update | EntryOperation::Delete => Some(payload_of(
            record.entity_name(),
            record.original_values_or_current(),
        )),
        _ => None,
    };

    Ok(ChangeSetEntry {
        id: op_ids[&changed.id],
        entity_id: changed.id,
        operation,
        entity: payload_of(record.entity_name(), record.values()),
        original_entity,
        associations: map_members(&delta.current, op_ids)?,
        original_associations: map_members(&delta.original, op_ids)?,
        invocations: record.invocations().to_vec(),
        errors: record.entity_errors().to_vec(),
    })
}

fn map_members(
    members: &BTreeMap<&'static str, Vec<EntityId>>,
    op_ids: &BTreeMap<EntityId, i64>,
) -> Result<BTreeMap<&'static str, Vec<i64>>, EngineError> {
    let mut out = BTreeMap::new();
    for (name, ids) in members {
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let op_id = op_ids.get(id).ok_or_else(|| {
                EngineError::new(
                    ErrorClass::Internal,
                    ErrorOrigin::ChangeSet,
                    format!("association '{name}' references entity {id} with no correlation id"),
                )
            })?;
            resolved.push(*op_id);
        }
        out.insert(*name, resolved);
    }

    Ok(out)
}
