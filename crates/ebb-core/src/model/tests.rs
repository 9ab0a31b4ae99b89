use super::*;

static PARENT_FIELDS: [EntityFieldModel; 2] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "name",
        kind: FieldKind::Text,
    },
];

static PARENT_MODEL: EntityModel = EntityModel {
    path: "model_tests::Parent",
    entity_name: "Parent",
    key: &["id"],
    fields: &PARENT_FIELDS,
    associations: &[],
    capability: SetCapability::ALL,
};

static CHILD_FIELDS: [EntityFieldModel; 2] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "parent_id",
        kind: FieldKind::Uint,
    },
];

static CHILD_MODEL: EntityModel = EntityModel {
    path: "model_tests::Child",
    entity_name: "Child",
    key: &["id"],
    fields: &CHILD_FIELDS,
    associations: &[AssociationModel {
        name: "Parent_Child",
        fk_members: &["parent_id"],
        parent_entity: "Parent",
        cardinality: Cardinality::Many,
        composition: true,
    }],
    capability: SetCapability::ALL,
};

#[test]
fn registry_accepts_valid_models() {
    let registry = ModelRegistry::new(&[&PARENT_MODEL, &CHILD_MODEL]).unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("Child").unwrap().entity_name, "Child");

    let children = registry.child_associations("Parent");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].0, "Child");
    assert_eq!(children[0].1.name, "Parent_Child");
}

#[test]
fn registry_rejects_duplicate_entity_names() {
    let err = ModelRegistry::new(&[&PARENT_MODEL, &PARENT_MODEL]).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateEntityName { entity: "Parent" }));
}

#[test]
fn registry_rejects_unknown_association_target() {
    static ORPHAN_MODEL: EntityModel = EntityModel {
        path: "model_tests::Orphan",
        entity_name: "Orphan",
        key: &["id"],
        fields: &CHILD_FIELDS,
        associations: &[AssociationModel {
            name: "Missing_Orphan",
            fk_members: &["parent_id"],
            parent_entity: "Missing",
            cardinality: Cardinality::Many,
            composition: true,
        }],
        capability: SetCapability::ALL,
    };

    let err = ModelRegistry::new(&[&ORPHAN_MODEL]).unwrap_err();
    assert!(matches!(err, ModelError::UnknownAssociationTarget { .. }));
}

#[test]
fn registry_rejects_fk_arity_mismatch() {
    static WIDE_CHILD_MODEL: EntityModel = EntityModel {
        path: "model_tests::WideChild",
        entity_name: "WideChild",
        key: &["id"],
        fields: &CHILD_FIELDS,
        associations: &[AssociationModel {
            name: "Parent_WideChild",
            fk_members: &["parent_id", "id"],
            parent_entity: "Parent",
            cardinality: Cardinality::Many,
            composition: true,
        }],
        capability: SetCapability::ALL,
    };

    let err = ModelRegistry::new(&[&PARENT_MODEL, &WIDE_CHILD_MODEL]).unwrap_err();
    assert!(matches!(err, ModelError::ForeignKeyArityMismatch { .. }));
}

#[test]
fn registry_rejects_unkeyable_key_member() {
    static FLOAT_FIELDS: [EntityFieldModel; 1] = [EntityFieldModel {
        name: "weight",
        kind: FieldKind::Float,
    }];
    static FLOAT_KEY_MODEL: EntityModel = EntityModel {
        path: "model_tests::FloatKey",
        entity_name: "FloatKey",
        key: &["weight"],
        fields: &FLOAT_FIELDS,
        associations: &[],
        capability: SetCapability::ALL,
    };

    let err = ModelRegistry::new(&[&FLOAT_KEY_MODEL]).unwrap_err();
    assert!(matches!(err, ModelError::UnkeyableKeyMember { .. }));
}

#[test]
fn capability_bitmask_contains() {
    assert!(SetCapability::ALL.contains(SetCapability::REMOVE));
    assert!(!SetCapability::ADD.contains(SetCapability::EDIT));
    assert!(SetCapability::ADD.with(SetCapability::EDIT).contains(SetCapability::EDIT));
    assert_eq!(SetCapability::NONE.to_string(), "none");
    assert_eq!(SetCapability::ALL.to_string(), "add|remove|edit");
}

#[test]
fn field_kind_admits_null_everywhere() {
    use crate::value::Value;

    for kind in [FieldKind::Bool, FieldKind::Int, FieldKind::Text, FieldKind::Ulid] {
        assert!(kind.admits(&Value::Null));
    }
    assert!(!FieldKind::Int.admits(&Value::Text("5".to_string())));
    assert!(FieldKind::Unsupported.admits(&Value::Float(0.1)));
}
