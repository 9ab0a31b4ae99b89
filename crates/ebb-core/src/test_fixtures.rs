//! Shared fixture schema for engine tests: a four-level composed hierarchy
//! (Company → Department → Team → Employee), a One-cardinality composition
//! (Employee → Badge), and a non-composed self reference (mentor).

use crate::{
    graph::{EntityContainer, EntityData},
    model::{
        AssociationModel, Cardinality, EntityFieldModel, EntityModel, FieldKind, SetCapability,
    },
};

static COMPANY_FIELDS: [EntityFieldModel; 2] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "name",
        kind: FieldKind::Text,
    },
];

pub(crate) static COMPANY_MODEL: EntityModel = EntityModel {
    path: "fixtures::Company",
    entity_name: "Company",
    key: &["id"],
    fields: &COMPANY_FIELDS,
    associations: &[],
    capability: SetCapability::ALL,
};

static DEPARTMENT_FIELDS: [EntityFieldModel; 3] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "company_id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "name",
        kind: FieldKind::Text,
    },
];

pub(crate) static DEPARTMENT_MODEL: EntityModel = EntityModel {
    path: "fixtures::Department",
    entity_name: "Department",
    key: &["id"],
    fields: &DEPARTMENT_FIELDS,
    associations: &[AssociationModel {
        name: "Company_Department",
        fk_members: &["company_id"],
        parent_entity: "Company",
        cardinality: Cardinality::Many,
        composition: true,
    }],
    capability: SetCapability::ALL,
};

static TEAM_FIELDS: [EntityFieldModel; 3] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "department_id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "name",
        kind: FieldKind::Text,
    },
];

pub(crate) static TEAM_MODEL: EntityModel = EntityModel {
    path: "fixtures::Team",
    entity_name: "Team",
    key: &["id"],
    fields: &TEAM_FIELDS,
    associations: &[AssociationModel {
        name: "Department_Team",
        fk_members: &["department_id"],
        parent_entity: "Department",
        cardinality: Cardinality::Many,
        composition: true,
    }],
    capability: SetCapability::ALL,
};

static EMPLOYEE_FIELDS: [EntityFieldModel; 4] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "team_id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "name",
        kind: FieldKind::Text,
    },
    EntityFieldModel {
        name: "mentor_id",
        kind: FieldKind::Uint,
    },
];

pub(crate) static EMPLOYEE_MODEL: EntityModel = EntityModel {
    path: "fixtures::Employee",
    entity_name: "Employee",
    key: &["id"],
    fields: &EMPLOYEE_FIELDS,
    associations: &[
        AssociationModel {
            name: "Team_Employee",
            fk_members: &["team_id"],
            parent_entity: "Team",
            cardinality: Cardinality::Many,
            composition: true,
        },
        AssociationModel {
            name: "Employee_Mentor",
            fk_members: &["mentor_id"],
            parent_entity: "Employee",
            cardinality: Cardinality::Many,
            composition: false,
        },
    ],
    capability: SetCapability::ALL,
};

static BADGE_FIELDS: [EntityFieldModel; 3] = [
    EntityFieldModel {
        name: "id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "employee_id",
        kind: FieldKind::Uint,
    },
    EntityFieldModel {
        name: "code",
        kind: FieldKind::Text,
    },
];

pub(crate) static BADGE_MODEL: EntityModel = EntityModel {
    path: "fixtures::Badge",
    entity_name: "Badge",
    key: &["id"],
    fields: &BADGE_FIELDS,
    associations: &[AssociationModel {
        name: "Employee_Badge",
        fk_members: &["employee_id"],
        parent_entity: "Employee",
        cardinality: Cardinality::One,
        composition: true,
    }],
    capability: SetCapability::ALL,
};

static FIXTURE_MODELS: [&EntityModel; 5] = [
    &COMPANY_MODEL,
    &DEPARTMENT_MODEL,
    &TEAM_MODEL,
    &EMPLOYEE_MODEL,
    &BADGE_MODEL,
];

pub(crate) fn fixture_models() -> &'static [&'static EntityModel] {
    &FIXTURE_MODELS
}

pub(crate) fn container() -> EntityContainer {
    EntityContainer::new(fixture_models()).expect("fixture models are valid")
}

pub(crate) fn company(id: u64, name: &str) -> EntityData {
    EntityData::new("Company")
        .with_value("id", id)
        .with_value("name", name)
}

pub(crate) fn department(id: u64, company: u64, name: &str) -> EntityData {
    EntityData::new("Department")
        .with_value("id", id)
        .with_value("company_id", company)
        .with_value("name", name)
}

pub(crate) fn team(id: u64, department: u64, name: &str) -> EntityData {
    EntityData::new("Team")
        .with_value("id", id)
        .with_value("department_id", department)
        .with_value("name", name)
}

pub(crate) fn employee(id: u64, team: u64, name: &str) -> EntityData {
    EntityData::new("Employee")
        .with_value("id", id)
        .with_value("team_id", team)
        .with_value("name", name)
}

pub(crate) fn badge(id: u64, employee: u64, code: &str) -> EntityData {
    EntityData::new("Badge")
        .with_value("id", id)
        .with_value("employee_id", employee)
        .with_value("code", code)
}
