use super::*;
use crate::{
    error::ErrorClass,
    graph::{EntityData, EntityState},
    key::{EntityKey, Key},
    submit::{SubmitResult, apply_submit_results},
    test_fixtures::{company, container, department, employee, team},
    value::Value,
};
use std::collections::BTreeMap;

fn key_u(n: u64) -> EntityKey {
    EntityKey::new(vec![Key::Uint(n)])
}

#[test]
fn clean_container_builds_empty() {
    let mut c = container();
    c.attach(company(1, "Initech")).unwrap();

    let changes = c.get_changes();
    assert!(changes.is_empty());

    let entries = build_operations(&c, &changes).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn insert_entry_shape() {
    let mut c = container();
    let id = c.add(company(1, "Initech")).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();

    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.id, 1);
    assert_eq!(entry.entity_id, id);
    assert_eq!(entry.operation, EntryOperation::Insert);
    assert_eq!(entry.entity.entity, "Company");
    assert_eq!(entry.entity.values.get("name"), Some(&Value::from("Initech")));
    assert!(entry.original_entity.is_none());
    assert!(entry.original_associations.is_empty());
}

#[test]
fn nested_insert_carries_association_ids() {
    let mut c = container();
    let root = c
        .add(company(1, "Initech").with_child("Company_Department", department(10, 1, "dev")))
        .unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    assert_eq!(entries.len(), 2);

    let parent = entries.iter().find(|e| e.entity_id == root).unwrap();
    let child = entries.iter().find(|e| e.entity_id != root).unwrap();

    assert_eq!(parent.associations.get("Company_Department"), Some(&vec![child.id]));
    assert_eq!(child.associations.get("Company_Department"), Some(&vec![parent.id]));
}

#[test]
fn update_entry_carries_original_values() {
    let mut c = container();
    let id = c.attach(company(1, "Initech")).unwrap();
    c.set_value(id, "name", Value::from("Edited")).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();

    let entry = &entries[0];
    assert_eq!(entry.operation, EntryOperation::Update);
    assert_eq!(entry.entity.values.get("name"), Some(&Value::from("Edited")));
    let original = entry.original_entity.as_ref().unwrap();
    assert_eq!(original.values.get("name"), Some(&Value::from("Initech")));
}

#[test]
fn deleted_child_synthesizes_none_parent_entry() {
    let mut c = container();
    let company_id = c
        .attach(company(1, "Initech").with_child("Company_Department", department(10, 1, "dev")))
        .unwrap();
    let dept_id = c.lookup("Department", &key_u(10)).unwrap().unwrap();

    c.remove(dept_id).unwrap();
    let entries = build_operations(&c, &c.get_changes()).unwrap();

    assert_eq!(entries.len(), 2);
    let delete = entries.iter().find(|e| e.entity_id == dept_id).unwrap();
    let parent = entries.iter().find(|e| e.entity_id == company_id).unwrap();

    assert_eq!(delete.operation, EntryOperation::Delete);
    assert_eq!(parent.operation, EntryOperation::None);
    // The unmodified parent exists solely to give the association an id.
    assert_eq!(
        delete.original_associations.get("Company_Department"),
        Some(&vec![parent.id])
    );
    assert!(parent.associations.is_empty());
}

#[test]
fn full_hierarchy_delete_produces_entry_per_descendant() {
    let mut c = container();
    let root = c
        .attach(
            company(1, "Initech").with_child(
                "Company_Department",
                department(10, 1, "dev")
                    .with_child(
                        "Department_Team",
                        team(100, 10, "core")
                            .with_child("Team_Employee", employee(1000, 100, "emp")),
                    )
                    .with_child("Department_Team", team(101, 10, "infra")),
            ),
        )
        .unwrap();

    c.remove(root).unwrap();
    let entries = build_operations(&c, &c.get_changes()).unwrap();

    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.operation == EntryOperation::Delete));

    // Referenced ⇒ id assigned: every association member resolves to an
    // entry in the list.
    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    for entry in &entries {
        for members in entry.associations.values().chain(entry.original_associations.values()) {
            for referenced in members {
                assert!(ids.contains(referenced));
            }
        }
    }
}

#[test]
fn add_build_accept_round_trip() {
    let mut c = container();
    let id = c.add(company(1, "Initech")).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    assert_eq!(entries.len(), 1);

    c.accept(id).unwrap();
    assert_eq!(c.state(id), EntityState::Unmodified);
    assert!(c.get_changes().is_empty());
}

#[test]
fn submit_refresh_assigns_server_key_and_accepts() {
    let mut c = container();
    let id = c.add(EntityData::new("Company").with_value("name", "Initech")).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    let mut refreshed = BTreeMap::new();
    refreshed.insert("id".to_string(), Value::Uint(77));

    let outcome = apply_submit_results(
        &mut c,
        &entries,
        vec![SubmitResult {
            entry_id: entries[0].id,
            refreshed: Some(refreshed),
            errors: Vec::new(),
        }],
    )
    .unwrap();

    assert_eq!(outcome.accepted, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(c.state(id), EntityState::Unmodified);
    assert_eq!(c.lookup("Company", &key_u(77)).unwrap(), Some(id));
    assert!(c.get_changes().is_empty());
}

#[test]
fn submit_accepts_descendants_before_ancestors() {
    let mut c = container();
    let root = c
        .attach(company(1, "Initech").with_child("Company_Department", department(10, 1, "dev")))
        .unwrap();
    c.remove(root).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    let results: Vec<SubmitResult> = entries
        .iter()
        .map(|entry| SubmitResult {
            entry_id: entry.id,
            refreshed: None,
            errors: Vec::new(),
        })
        .collect();

    let outcome = apply_submit_results(&mut c, &entries, results).unwrap();

    assert_eq!(outcome.accepted, 2);
    assert!(c.get_changes().is_empty());
    assert!(c.set("Company").unwrap().is_empty());
    assert!(c.set("Department").unwrap().is_empty());
}

#[test]
fn submit_failure_leaves_state_with_errors() {
    let mut c = container();
    let id = c.attach(company(1, "Initech")).unwrap();
    c.set_value(id, "name", Value::from("Edited")).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    let outcome = apply_submit_results(
        &mut c,
        &entries,
        vec![SubmitResult {
            entry_id: entries[0].id,
            refreshed: None,
            errors: vec![crate::graph::EntityError {
                message: "name is reserved".to_string(),
                is_conflict: false,
            }],
        }],
    )
    .unwrap();

    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.accepted, 0);
    assert_eq!(c.state(id), EntityState::Modified);
    let errors = c.record(id).unwrap().entity_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "name is reserved");
}

#[test]
fn reparent_fails_validation_naming_the_child() {
    let mut c = container();
    c.attach(company(1, "One")).unwrap();
    let p2 = c.attach(company(2, "Two")).unwrap();
    let child = c.attach(department(10, 1, "dev")).unwrap();

    // Legal as a local graph edit...
    c.set_parent(child, "Company_Department", Some(p2)).unwrap();
    let changes = c.get_changes();
    assert!(!changes.is_empty());

    // ...but unexpressible against a parent-owns-child contract.
    let err = build_operations(&c, &changes).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(err.message.contains("Department[10]"), "{}", err.message);
}

#[test]
fn foreign_key_edit_fails_validation() {
    let mut c = container();
    c.attach(company(1, "One")).unwrap();
    c.attach(company(2, "Two")).unwrap();
    let child = c.attach(department(10, 1, "dev")).unwrap();

    // A bare fk edit keeps the parent link but disagrees with its key.
    c.set_value(child, "company_id", Value::Uint(2)).unwrap();

    let err = build_operations(&c, &c.get_changes()).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvariantViolation);
    assert!(err.message.contains("Department[10]"), "{}", err.message);
}

#[test]
fn plain_delete_passes_validation() {
    let mut c = container();
    let root = c
        .attach(company(1, "Initech").with_child("Company_Department", department(10, 1, "dev")))
        .unwrap();
    c.remove(root).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    validate_entries(&c, &entries).unwrap();
}

#[test]
fn invocations_travel_on_the_entry() {
    let mut c = container();
    let id = c.attach(company(1, "Initech")).unwrap();
    c.invoke(id, "archive", vec![Value::from(true)]).unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();

    assert_eq!(entries[0].invocations.len(), 1);
    assert_eq!(entries[0].invocations[0].method, "archive");
}

#[test]
fn entries_serialize_to_wire_shape() {
    let mut c = container();
    c.add(company(1, "Initech").with_child("Company_Department", department(10, 1, "dev")))
        .unwrap();

    let entries = build_operations(&c, &c.get_changes()).unwrap();
    let json = serde_json::to_value(&entries).unwrap();

    let first = &json[0];
    assert_eq!(first["operation"], "insert");
    assert_eq!(first["entity"]["entity"], "Company");
    assert!(first["associations"]["Company_Department"].is_array());
    // The internal graph correlation never leaves the process.
    assert!(first.get("entity_id").is_none());
}

#[test]
fn changeset_snapshot_orders_and_dedupes() {
    let mut c = container();
    let added = c.add(company(3, "Added")).unwrap();
    let modified = c.attach(company(1, "Kept")).unwrap();
    c.set_value(modified, "name", Value::from("Edited")).unwrap();
    let removed = c.attach(company(2, "Gone")).unwrap();
    c.remove(removed).unwrap();

    let changes = c.get_changes();
    assert_eq!(changes.len(), 3);
    assert_eq!(changes.added[0].id, added);
    assert_eq!(changes.modified[0].id, modified);
    assert_eq!(changes.removed[0].id, removed);

    let ids: Vec<_> = changes.iter_all().map(|e| e.id).collect();
    let mut deduped = ids.clone();
    deduped.dedup();
    assert_eq!(ids, deduped);
}
