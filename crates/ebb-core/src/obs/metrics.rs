//! Metrics sink boundary.
//!
//! Engine logic MUST NOT touch the counter state directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.

use std::cell::RefCell;

thread_local! {
    static STATE: RefCell<MetricsReport> = RefCell::new(MetricsReport::default());
}

///
/// MutationKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    Add,
    Attach,
    Load,
    Remove,
    Detach,
    Reparent,
    Edit,
    Invoke,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    Mutation {
        kind: MutationKind,
        entity: &'static str,
    },
    Accepted {
        entity: &'static str,
    },
    Rejected {
        entity: &'static str,
    },
    ChangeSetBuilt {
        entries: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

///
/// GlobalMetricsSink
/// Default process-local sink that writes into thread-local counter state.
///

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        STATE.with_borrow_mut(|report| match event {
            MetricsEvent::Mutation { kind, .. } => match kind {
                MutationKind::Add => report.adds += 1,
                MutationKind::Attach => report.attaches += 1,
                MutationKind::Load => report.loads += 1,
                MutationKind::Remove => report.removes += 1,
                MutationKind::Detach => report.detaches += 1,
                MutationKind::Reparent => report.reparents += 1,
                MutationKind::Edit => report.edits += 1,
                MutationKind::Invoke => report.invokes += 1,
            },
            MetricsEvent::Accepted { .. } => report.accepts += 1,
            MetricsEvent::Rejected { .. } => report.rejects += 1,
            MetricsEvent::ChangeSetBuilt { entries } => {
                report.changesets_built += 1;
                report.changeset_entries += entries;
            }
        });
    }
}

/// Route one event into the global sink.
pub(crate) fn emit(event: MetricsEvent) {
    GlobalMetricsSink.record(event);
}

///
/// MetricsReport
///
/// Point-in-time counter snapshot.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetricsReport {
    pub adds: u64,
    pub attaches: u64,
    pub loads: u64,
    pub removes: u64,
    pub detaches: u64,
    pub reparents: u64,
    pub edits: u64,
    pub invokes: u64,
    pub accepts: u64,
    pub rejects: u64,
    pub changesets_built: u64,
    pub changeset_entries: u64,
}

/// Snapshot the current counters.
#[must_use]
pub fn metrics_report() -> MetricsReport {
    STATE.with_borrow(|report| *report)
}

/// Reset every counter to zero.
pub fn metrics_reset_all() {
    STATE.with_borrow_mut(|report| *report = MetricsReport::default());
}
