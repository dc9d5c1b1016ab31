//! Polling daemon.
//!
//! Each cycle opens a session, reads the status dump and closes the session
//! again. A complete record is published to the status sink and fed to the
//! door tracker; any failure skips both and leaves the tracker untouched.
//! Cycles never end the process; only the shutdown flag does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use homectl_protocol::{
    run_cycle, Connector, DoorEvent, DoorTracker, ProtocolError, ProtocolTimeouts, StatusPoller,
};
use tracing::{debug, info, warn};

use crate::config::{BackoffConfig, Config};
use crate::notify::Notifier;
use crate::page::StatusSink;
use crate::telemetry::metric_defs;

/// Granularity of the backoff sleep, so shutdown is noticed promptly.
const SLEEP_TICK: Duration = Duration::from_secs(1);

/// Result of one daemon cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A complete record was read and published.
    Updated {
        /// Controller timestamp of the record.
        timestamp: String,
        /// Door transition detected this cycle.
        event: Option<DoorEvent>,
    },
    /// Nothing was published.
    Failed(ProtocolError),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Updated { .. })
    }

    /// Door transition detected this cycle, if any.
    pub fn event(&self) -> Option<DoorEvent> {
        match self {
            CycleOutcome::Updated { event, .. } => *event,
            CycleOutcome::Failed(_) => None,
        }
    }

    /// Cause of a failed cycle, as reported in metrics.
    pub fn failure_kind(&self) -> Option<&'static str> {
        match self {
            CycleOutcome::Updated { .. } => None,
            CycleOutcome::Failed(e) => Some(e.kind()),
        }
    }

    fn label(&self) -> &'static str {
        if self.is_success() {
            "success"
        } else {
            "failure"
        }
    }
}

/// The polling loop and the state it carries between cycles.
pub struct Daemon<C: Connector> {
    connector: C,
    host: String,
    timeouts: ProtocolTimeouts,
    poller: StatusPoller,
    backoff: BackoffConfig,
    tracker: DoorTracker,
    sink: Box<dyn StatusSink>,
    notifier: Box<dyn Notifier>,
}

impl<C: Connector> Daemon<C> {
    pub fn new(
        connector: C,
        config: &Config,
        sink: Box<dyn StatusSink>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Daemon {
            connector,
            host: config.host.clone(),
            timeouts: config.protocol_timeouts(),
            poller: StatusPoller::new(config.schema),
            backoff: config.backoff.clone(),
            tracker: DoorTracker::new(config.initial_door_state.to_door_state()),
            sink,
            notifier,
        }
    }

    /// Door state carried between cycles.
    pub fn tracker(&self) -> &DoorTracker {
        &self.tracker
    }

    /// Run one poll cycle.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let started = Instant::now();
        let poller = self.poller;
        let result = run_cycle(&self.connector, &self.host, &self.timeouts, |session| {
            poller.poll(session)
        });

        let outcome = match result {
            Ok(record) => {
                if let Err(e) = self.sink.publish(&record) {
                    warn!("Status page not updated: {}", e);
                }

                let event = self.tracker.observe_record(&record);
                if let Some(event) = event {
                    metrics::counter!(metric_defs::DOOR_EVENTS.name, "event" => event.as_str())
                        .increment(1);
                    self.dispatch(event);
                }

                info!("Status updated at {}", record.timestamp());
                CycleOutcome::Updated {
                    timestamp: record.timestamp().to_string(),
                    event,
                }
            }
            Err(e) => {
                if matches!(e, ProtocolError::PartialRecord { .. }) {
                    metrics::counter!(metric_defs::PARTIAL_RECORDS.name).increment(1);
                }
                if e.is_connection_failure() {
                    warn!("Controller unreachable: {}", e);
                } else {
                    warn!("Poll failed: {}", e);
                }
                CycleOutcome::Failed(e)
            }
        };

        metrics::counter!(metric_defs::CYCLES.name, "outcome" => outcome.label()).increment(1);
        if let Some(kind) = outcome.failure_kind() {
            metrics::counter!(metric_defs::CYCLE_FAILURES.name, "kind" => kind).increment(1);
        }
        metrics::histogram!(metric_defs::CYCLE_DURATION.name)
            .record(started.elapsed().as_secs_f64());
        outcome
    }

    /// Delay before the cycle after `outcome`.
    pub fn backoff_for(&self, outcome: &CycleOutcome) -> Duration {
        if outcome.is_success() {
            self.backoff.success()
        } else {
            self.backoff.failure()
        }
    }

    /// Poll until `shutdown` is set. Returns the number of cycles run.
    ///
    /// The flag is checked between cycles and during the backoff sleep; a
    /// cycle in progress always runs to completion.
    pub fn run(&mut self, shutdown: &AtomicBool) -> u64 {
        info!("Polling controller at {}", self.host);
        let mut cycles = 0;
        while !shutdown.load(Ordering::SeqCst) {
            let outcome = self.run_cycle();
            cycles += 1;

            let delay = self.backoff_for(&outcome);
            debug!("Next cycle in {:?}", delay);
            sleep_unless_shutdown(delay, shutdown);
        }
        info!("Shutting down after {} cycles", cycles);
        cycles
    }

    /// Notification failures are logged and never reach the cycle outcome.
    fn dispatch(&self, event: DoorEvent) {
        info!("Garage door {}", event.as_str());
        match self.notifier.notify(event.message()) {
            Ok(()) => {
                metrics::counter!(metric_defs::NOTIFICATIONS.name, "result" => "sent").increment(1);
            }
            Err(e) => {
                metrics::counter!(metric_defs::NOTIFICATIONS.name, "result" => "failed")
                    .increment(1);
                warn!("Failed to send {:?}: {}", event.message(), e);
            }
        }
    }
}

fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_TICK.min(deadline - now));
    }
}
