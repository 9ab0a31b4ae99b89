//! Submit-result application.
//!
//! The transport layer replays a built change set remotely and hands back
//! one result per entry. Success merges the store-refreshed values (a
//! refresh, not an edit) and accepts the pending change; failure attaches
//! the returned errors and leaves the entity Modified/Deleted for
//! inspection. Accepts apply descendants-first, never in wire order.

use crate::{
    changeset::{ChangeSetEntry, EntryOperation},
    error::{EngineError, ErrorOrigin},
    graph::{EntityContainer, EntityError, EntityId},
    value::Value,
};
use serde::Deserialize;
use std::collections::BTreeMap;

///
/// SubmitResult
///
/// Store outcome for one change-set entry, correlated by entry id.
///

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitResult {
    pub entry_id: i64,
    /// Store-refreshed property values (server-assigned keys, computed
    /// columns) to merge before accepting.
    #[serde(default)]
    pub refreshed: Option<BTreeMap<String, Value>>,
    /// Validation/conflict annotations; non-empty means the operation
    /// failed server-side.
    #[serde(default)]
    pub errors: Vec<EntityError>,
}

///
/// SubmitOutcome
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubmitOutcome {
    pub accepted: usize,
    pub failed: usize,
}

/// Apply submit results onto the graph.
pub fn apply_submit_results(
    container: &mut EntityContainer,
    entries: &[ChangeSetEntry],
    results: Vec<SubmitResult>,
) -> Result<SubmitOutcome, EngineError> {
    // Phase 1: correlate results back onto tracked entities.
    let by_entry: BTreeMap<i64, &ChangeSetEntry> =
        entries.iter().map(|entry| (entry.id, entry)).collect();

    let mut failures: Vec<(EntityId, Vec<EntityError>)> = Vec::new();
    let mut successes: Vec<(EntityId, EntryOperation, Option<BTreeMap<String, Value>>)> =
        Vec::new();

    for result in results {
        let entry = by_entry.get(&result.entry_id).ok_or_else(|| {
            EngineError::not_found(
                ErrorOrigin::Submit,
                format!("unknown change-set entry id {}", result.entry_id),
            )
        })?;

        if result.errors.is_empty() {
            successes.push((entry.entity_id, entry.operation, result.refreshed));
        } else {
            failures.push((entry.entity_id, result.errors));
        }
    }

    // Phase 2: failures first; the entity stays Modified/Deleted with its
    // errors attached for inspection.
    let failed = failures.len();
    for (id, errors) in failures {
        container.attach_entity_errors(id, errors)?;
    }

    // Phase 3: merge refreshes, then accept descendants-first.
    for (id, _, refreshed) in &successes {
        if let Some(refreshed) = refreshed {
            container.refresh_values(*id, refreshed)?;
        }
    }

    let mut pending: Vec<(usize, EntityId)> = successes
        .iter()
        .filter(|(_, operation, _)| *operation != EntryOperation::None)
        .map(|(id, _, _)| (container.composition_depth(*id), *id))
        .collect();
    pending.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut accepted = 0;
    for (_, id) in pending {
        if container.state(id).has_pending_change() {
            container.accept(id)?;
            accepted += 1;
        }
    }

    Ok(SubmitOutcome { accepted, failed })
}
