use crate::{
    changeset::entry::{ChangeSetEntry, EntryOperation},
    error::{EngineError, ErrorOrigin},
    graph::{EntityContainer, foreign_key_of},
};

/// Structural validation pass over a built change set, run before/at
/// submission: no change set that violates the parent-owns-child contract
/// can ever be satisfied server-side, so violations fail here, naming the
/// offending entity.
///
/// Checks, per Modified/Deleted entry whose entity carries a composition:
/// - the post-change parent identity equals the pre-change parent identity
///   (a cross-parent move cannot be expressed as add/update/delete);
/// - the foreign-key scalars agree with the linked parent's key;
/// - no entity is its own composed ancestor.
pub fn validate_entries(
    container: &EntityContainer,
    entries: &[ChangeSetEntry],
) -> Result<(), EngineError> {
    for entry in entries {
        let record = container.record(entry.entity_id)?;

        if matches!(entry.operation, EntryOperation::Update | EntryOperation::Delete) {
            let current = record.parent();
            let original = record.original_parent_or_current();

            if current.map(|link| link.parent) != original.map(|link| link.parent) {
                return Err(EngineError::invariant(
                    ErrorOrigin::ChangeSet,
                    format!(
                        "composed entity {} changed parents; a composed child belongs to the parent it was loaded with",
                        record.display_handle()
                    ),
                ));
            }

            // FK scalars must agree with the linked parent: a bare fk edit
            // is a reparent attempt in disguise.
            if let Some(link) = current {
                let assoc = record.model().association(link.association);
                let parent_key = container
                    .record_opt(link.parent)
                    .and_then(|parent| parent.key());
                if let (Some(assoc), Some(parent_key)) = (assoc, parent_key) {
                    if let Some(fk_key) = foreign_key_of(record, assoc) {
                        if fk_key != parent_key {
                            return Err(EngineError::invariant(
                                ErrorOrigin::ChangeSet,
                                format!(
                                    "composed entity {} foreign key {fk_key} disagrees with parent key {parent_key}",
                                    record.display_handle()
                                ),
                            ));
                        }
                    }
                }
            }
        }

        // Acyclicity is enforced at assignment time; re-assert it here so a
        // corrupted graph is named before any round trip.
        if container.has_composed_ancestor(entry.entity_id, entry.entity_id) {
            return Err(EngineError::invariant(
                ErrorOrigin::ChangeSet,
                format!("entity {} is its own composed ancestor", record.display_handle()),
            ));
        }
    }

    Ok(())
}
