use crate::value::Value;
use serde::Deserialize;
use std::collections::BTreeMap;

///
/// EntityData
///
/// The already-deserialized shape the load layer hands the engine: one
/// entity's property map plus nested composed children keyed by association
/// name. Also the input to Add and Attach, which accept whole detached
/// graphs.
///

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EntityData {
    pub entity: String,
    #[serde(default)]
    pub values: BTreeMap<String, Value>,
    #[serde(default)]
    pub children: BTreeMap<String, Vec<EntityData>>,
}

impl EntityData {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, association: impl Into<String>, child: Self) -> Self {
        self.children.entry(association.into()).or_default().push(child);
        self
    }
}
