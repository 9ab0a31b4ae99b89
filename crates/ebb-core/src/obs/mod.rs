//! Observability: runtime telemetry for graph mutations and change-set
//! builds.
//!
//! This module does not reach into graph internals; engine logic reports
//! through [`MetricsEvent`] and the sink boundary only.

pub(crate) mod metrics;

#[cfg(test)]
mod tests;

pub use metrics::{
    MetricsEvent, MetricsReport, MetricsSink, MutationKind, metrics_report, metrics_reset_all,
};

pub(crate) use metrics::emit;
