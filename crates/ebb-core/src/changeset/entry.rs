use crate::{
    graph::{EntityError, EntityId, EntityInvocation},
    value::Value,
};
use serde::Serialize;
use std::collections::BTreeMap;

///
/// EntryOperation
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOperation {
    None,
    Insert,
    Update,
    Delete,
}

///
/// EntityPayload
///
/// One entity's property map as it travels on the wire.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EntityPayload {
    pub entity: &'static str,
    pub values: BTreeMap<&'static str, Value>,
}

///
/// ChangeSetEntry
///
/// Wire-level record of one entity's operation plus its association deltas:
/// the exact shape serialized for replay on the remote store. The internal
/// `entity_id` correlates submit results back onto the graph and never
/// leaves the process.
///

#[derive(Clone, Debug, Serialize)]
pub struct ChangeSetEntry {
    /// Correlation id, a small positive integer assigned locally.
    pub id: i64,
    #[serde(skip)]
    pub entity_id: EntityId,
    pub operation: EntryOperation,
    pub entity: EntityPayload,
    pub original_entity: Option<EntityPayload>,
    /// Association name → correlation ids of current members.
    pub associations: BTreeMap<&'static str, Vec<i64>>,
    /// Pre-edit equivalent, populated for Update/Delete entries.
    pub original_associations: BTreeMap<&'static str, Vec<i64>>,
    pub invocations: Vec<EntityInvocation>,
    pub errors: Vec<EntityError>,
}
