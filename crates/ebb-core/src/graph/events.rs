use crate::graph::record::EntityId;

///
/// GraphEvent
///
/// Outbound change notification. The engine buffers these on the container;
/// the binding layer drains them with `take_events` after each operation.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GraphEvent {
    CollectionChanged {
        set: &'static str,
        change: CollectionChange,
    },
    PropertyChanged {
        target: PropertyTarget,
        property: ChangedProperty,
    },
}

///
/// CollectionChange
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollectionChange {
    Added(EntityId),
    Removed(EntityId),
    Reset,
}

///
/// PropertyTarget
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyTarget {
    Entity(EntityId),
    Set(&'static str),
    Container,
}

///
/// ChangedProperty
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangedProperty {
    State,
    HasChanges,
    Count,
}

///
/// EventLog
///
/// Container-owned notification buffer.
///

#[derive(Default)]
pub(crate) struct EventLog {
    events: Vec<GraphEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: GraphEvent) {
        self.events.push(event);
    }

    /// Membership change in one set: collection event plus the derived
    /// aggregate notifications.
    pub fn note_membership(&mut self, set: &'static str, change: CollectionChange) {
        self.push(GraphEvent::CollectionChanged { set, change });
        self.push(GraphEvent::PropertyChanged {
            target: PropertyTarget::Set(set),
            property: ChangedProperty::Count,
        });
        self.note_has_changes(set);
    }

    /// State transition on one entity.
    pub fn note_state(&mut self, set: &'static str, id: EntityId) {
        self.push(GraphEvent::PropertyChanged {
            target: PropertyTarget::Entity(id),
            property: ChangedProperty::State,
        });
        self.note_has_changes(set);
    }

    fn note_has_changes(&mut self, set: &'static str) {
        self.push(GraphEvent::PropertyChanged {
            target: PropertyTarget::Set(set),
            property: ChangedProperty::HasChanges,
        });
        self.push(GraphEvent::PropertyChanged {
            target: PropertyTarget::Container,
            property: ChangedProperty::HasChanges,
        });
    }

    pub fn take(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}
