use crate::{
    MAX_KEY_MEMBERS,
    error::{EngineError, ErrorClass, ErrorOrigin},
    model::{association::AssociationModel, entity::EntityModel},
};
use std::collections::HashMap;
use thiserror::Error as ThisError;

///
/// ModelError
///

#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("duplicate entity name '{entity}'")]
    DuplicateEntityName { entity: &'static str },

    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error("entity '{entity}' declares no key members")]
    EmptyKey { entity: &'static str },

    #[error("entity '{entity}' declares {len} key members (max {max})")]
    TooManyKeyMembers {
        entity: &'static str,
        len: usize,
        max: usize,
    },

    #[error("entity '{entity}' key member '{field}' is not a declared field")]
    UnknownKeyMember {
        entity: &'static str,
        field: &'static str,
    },

    #[error("entity '{entity}' key member '{field}' is not keyable")]
    UnkeyableKeyMember {
        entity: &'static str,
        field: &'static str,
    },

    #[error("duplicate association name '{association}'")]
    DuplicateAssociationName { association: &'static str },

    #[error("association '{association}' targets unknown entity '{parent}'")]
    UnknownAssociationTarget {
        association: &'static str,
        parent: &'static str,
    },

    #[error("association '{association}' foreign-key member '{field}' is not a declared field")]
    UnknownForeignKeyMember {
        association: &'static str,
        field: &'static str,
    },

    #[error(
        "association '{association}' declares {len} foreign-key members but '{parent}' has {expected} key members"
    )]
    ForeignKeyArityMismatch {
        association: &'static str,
        parent: &'static str,
        len: usize,
        expected: usize,
    },
}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        let class = match err {
            ModelError::UnknownEntity { .. } => ErrorClass::NotFound,
            _ => ErrorClass::InvariantViolation,
        };

        Self::new(class, ErrorOrigin::Model, err.to_string())
    }
}

///
/// ModelRegistry
///
/// The validated set of entity models for one container. Declaration order
/// is preserved; it drives deterministic set enumeration everywhere.
///
#[derive(Debug)]
pub struct ModelRegistry {
    models: Vec<&'static EntityModel>,
    by_name: HashMap<&'static str, usize>,
    // parent entity name -> (child entity name, association) pairs
    children: HashMap<&'static str, Vec<(&'static str, &'static AssociationModel)>>,
}

impl ModelRegistry {
    /// Validate a model list into a registry.
    pub fn new(models: &[&'static EntityModel]) -> Result<Self, ModelError> {
        // Phase 1: register names.
        let mut by_name = HashMap::with_capacity(models.len());
        for (index, model) in models.iter().enumerate() {
            if by_name.insert(model.entity_name, index).is_some() {
                return Err(ModelError::DuplicateEntityName {
                    entity: model.entity_name,
                });
            }
        }

        // Phase 2: validate key declarations.
        for model in models {
            if model.key.is_empty() {
                return Err(ModelError::EmptyKey {
                    entity: model.entity_name,
                });
            }
            if model.key.len() > MAX_KEY_MEMBERS {
                return Err(ModelError::TooManyKeyMembers {
                    entity: model.entity_name,
                    len: model.key.len(),
                    max: MAX_KEY_MEMBERS,
                });
            }
            for member in model.key {
                let field = model.field(member).ok_or(ModelError::UnknownKeyMember {
                    entity: model.entity_name,
                    field: member,
                })?;
                if !field.kind.is_keyable() {
                    return Err(ModelError::UnkeyableKeyMember {
                        entity: model.entity_name,
                        field: member,
                    });
                }
            }
        }

        // Phase 3: validate associations and build the parent-side index.
        let mut seen_associations: HashMap<&'static str, ()> = HashMap::new();
        let mut children: HashMap<&'static str, Vec<(&'static str, &'static AssociationModel)>> =
            HashMap::new();

        for model in models {
            for assoc in model.associations {
                if seen_associations.insert(assoc.name, ()).is_some() {
                    return Err(ModelError::DuplicateAssociationName {
                        association: assoc.name,
                    });
                }

                let parent_index =
                    by_name
                        .get(assoc.parent_entity)
                        .ok_or(ModelError::UnknownAssociationTarget {
                            association: assoc.name,
                            parent: assoc.parent_entity,
                        })?;
                let parent = models[*parent_index];

                if assoc.fk_members.len() != parent.key.len() {
                    return Err(ModelError::ForeignKeyArityMismatch {
                        association: assoc.name,
                        parent: parent.entity_name,
                        len: assoc.fk_members.len(),
                        expected: parent.key.len(),
                    });
                }
                for member in assoc.fk_members {
                    if model.field(member).is_none() {
                        return Err(ModelError::UnknownForeignKeyMember {
                            association: assoc.name,
                            field: member,
                        });
                    }
                }

                children
                    .entry(assoc.parent_entity)
                    .or_default()
                    .push((model.entity_name, assoc));
            }
        }

        Ok(Self {
            models: models.to_vec(),
            by_name,
            children,
        })
    }

    /// Look up a model by entity name.
    pub fn get(&self, entity: &str) -> Result<&'static EntityModel, ModelError> {
        self.by_name
            .get(entity)
            .map(|index| self.models[*index])
            .ok_or_else(|| ModelError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    /// Iterate models in declaration order.
    pub fn models(&self) -> impl Iterator<Item = &'static EntityModel> + '_ {
        self.models.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Child-side associations whose parent is the given entity.
    #[must_use]
    pub fn child_associations(
        &self,
        parent: &str,
    ) -> &[(&'static str, &'static AssociationModel)] {
        self.children.get(parent).map_or(&[], Vec::as_slice)
    }
}
