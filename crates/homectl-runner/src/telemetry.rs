//! Metric declarations.
//!
//! Metrics are emitted through the `metrics` facade and stay no-ops until a
//! recorder is installed. Each one is declared once as a [`Metric`] so names
//! cannot drift between call sites.
//!
//! ```rust,ignore
//! use homectl_runner::telemetry::metric_defs;
//!
//! metrics::counter!(metric_defs::CYCLES.name, "outcome" => "success").increment(1);
//! ```

use metrics::{describe_counter, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonically increasing count.
    Counter,
    /// Distribution of observed values.
    Histogram,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, e.g. `homectl.cycles`.
    pub name: &'static str,
    /// Counter or histogram.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement, if any.
    pub unit: Option<Unit>,
}

impl Metric {
    const fn new(kind: MetricKind, name: &'static str, description: &'static str) -> Self {
        Metric {
            name,
            kind,
            description,
            unit: None,
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str, description: &'static str) -> Self {
        Metric::new(MetricKind::Counter, name, description)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str, description: &'static str) -> Self {
        Metric::new(MetricKind::Histogram, name, description)
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        let Metric { name, description, .. } = *self;
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, description),
            (MetricKind::Counter, None) => describe_counter!(name, description),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, description),
            (MetricKind::Histogram, None) => describe_histogram!(name, description),
        }
    }
}

/// All metrics emitted by the runner.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Completed daemon cycles.
    ///
    /// Labels: outcome (`success` | `failure`)
    pub const CYCLES: Metric = Metric::counter("homectl.cycles", "Polling cycles completed")
        .with_unit(Unit::Count);

    /// Failed cycles by cause.
    ///
    /// Labels: kind (`connect` | `handshake_timeout` | `partial_record` | ...)
    pub const CYCLE_FAILURES: Metric =
        Metric::counter("homectl.cycle_failures", "Polling cycles that published nothing")
            .with_unit(Unit::Count);

    /// Status dumps that ended before every field arrived.
    pub const PARTIAL_RECORDS: Metric =
        Metric::counter("homectl.partial_records", "Status dumps cut short").with_unit(Unit::Count);

    /// Door alerts attempted.
    ///
    /// Labels: result (`sent` | `failed`)
    pub const NOTIFICATIONS: Metric =
        Metric::counter("homectl.notifications", "Door notifications attempted")
            .with_unit(Unit::Count);

    /// Door transitions detected.
    ///
    /// Labels: event (`opened` | `closed`)
    pub const DOOR_EVENTS: Metric =
        Metric::counter("homectl.door_events", "Garage door transitions detected")
            .with_unit(Unit::Count);

    /// Wall time of one cycle, connect to close.
    pub const CYCLE_DURATION: Metric =
        Metric::histogram("homectl.cycle_duration", "Duration of a polling cycle")
            .with_unit(Unit::Seconds);

    pub const ALL: &[Metric] = &[
        CYCLES,
        CYCLE_FAILURES,
        PARTIAL_RECORDS,
        NOTIFICATIONS,
        DOOR_EVENTS,
        CYCLE_DURATION,
    ];
}

/// Describe every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::CYCLES.name, "homectl.cycles");
        assert_eq!(metric_defs::CYCLE_FAILURES.kind, MetricKind::Counter);
        assert_eq!(metric_defs::PARTIAL_RECORDS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::CYCLE_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::CYCLE_DURATION.unit, Some(Unit::Seconds));
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
    }

    #[test]
    fn test_describe_without_recorder() {
        describe_metrics();
    }
}
