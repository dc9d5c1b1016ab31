//! Garage door state and transition detection.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schema::{names, StatusRecord};

/// Garage door position as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    /// Door code `0`.
    Open,
    /// Door code `1`.
    Closed,
}

impl DoorState {
    /// Decode the controller's door code. The mapping is fixed by the
    /// garage node firmware: `0` means open, `1` means closed.
    pub fn from_code(code: &str) -> Option<DoorState> {
        match code.trim() {
            "0" => Some(DoorState::Open),
            "1" => Some(DoorState::Closed),
            _ => None,
        }
    }

    /// The controller's code for this state.
    pub fn code(&self) -> &'static str {
        match self {
            DoorState::Open => "0",
            DoorState::Closed => "1",
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A door transition worth telling someone about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorEvent {
    /// Closed on the previous cycle, open now.
    DoorOpened,
    /// Open on the previous cycle, closed now.
    DoorClosed,
}

impl DoorEvent {
    /// Alert text for this event.
    pub fn message(&self) -> &'static str {
        match self {
            DoorEvent::DoorOpened => "Garage Door is Open!",
            DoorEvent::DoorClosed => "Garage Door is Closed",
        }
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorEvent::DoorOpened => "opened",
            DoorEvent::DoorClosed => "closed",
        }
    }
}

impl fmt::Display for DoorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Compare two consecutive door states.
pub fn edge(previous: DoorState, current: DoorState) -> Option<DoorEvent> {
    match (previous, current) {
        (DoorState::Closed, DoorState::Open) => Some(DoorEvent::DoorOpened),
        (DoorState::Open, DoorState::Closed) => Some(DoorEvent::DoorClosed),
        _ => None,
    }
}

/// Door state carried from one polling cycle to the next.
///
/// Owned by the scheduler loop. Only complete status records may be fed in;
/// a failed cycle simply does not call [`DoorTracker::observe_record`], which
/// leaves the previous state untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorTracker {
    previous: Option<DoorState>,
}

impl DoorTracker {
    /// Start from `initial`. `None` means the first observation only seeds
    /// the tracker and never produces an event.
    pub fn new(initial: Option<DoorState>) -> Self {
        DoorTracker { previous: initial }
    }

    /// Last known door state.
    pub fn previous(&self) -> Option<DoorState> {
        self.previous
    }

    /// Record the current state and return the transition, if any.
    pub fn observe(&mut self, current: DoorState) -> Option<DoorEvent> {
        let event = self.previous.and_then(|previous| edge(previous, current));
        if self.previous != Some(current) {
            debug!("Door state {:?} -> {}", self.previous, current);
        }
        self.previous = Some(current);
        event
    }

    /// Observe the door field of a complete status record.
    ///
    /// An unrecognized door code leaves the tracker unchanged.
    pub fn observe_record(&mut self, record: &StatusRecord) -> Option<DoorEvent> {
        match record.door_state() {
            Some(current) => self.observe(current),
            None => {
                warn!(
                    "Ignoring unrecognized garage door code {:?}",
                    record.get(names::GARAGE_DOOR_STATUS).unwrap_or_default()
                );
                None
            }
        }
    }
}

impl Default for DoorTracker {
    /// A freshly started daemon assumes the door is closed.
    fn default() -> Self {
        DoorTracker::new(Some(DoorState::Closed))
    }
}
