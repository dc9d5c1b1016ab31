//! Controller session lifecycle.
//!
//! A session lives for exactly one poll or command cycle:
//!
//! ```text
//! Disconnected -> Connecting -> Handshaking -> Ready -> Disconnected
//!                      |              |           |
//!                      +----------> Failed <------+
//! ```
//!
//! The transport is released by [`Session::close`] (idempotent) and again by
//! `Drop`, so every exit path, including a panic inside the cycle, gives the
//! handle back.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::commands::{Command, HANDSHAKE_REPLY};
use crate::decoder::{FieldReader, ReadUntil};
use crate::error::{ProtocolError, Result};
use crate::transport::{Connector, Transport};

/// Bytes the bridge may send ahead of `CONNECT`.
const LINE_NOISE: &[u8] = b"\r\n \t\0";

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Transport connect in progress.
    Connecting,
    /// Connected, waiting for `CONNECT`.
    Handshaking,
    /// Commands may be issued.
    Ready,
    /// The cycle failed; only `close` remains.
    Failed,
}

/// Timing parameters for one cycle.
///
/// Defaults match the controller's serial bridge: a short settle before the
/// handshake, a generous wait for `CONNECT`, and a longer first-field timeout
/// on the status dump while the controller gathers readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolTimeouts {
    /// Transport connect timeout.
    pub connect: Duration,
    /// Pause between connecting and sending the handshake byte.
    pub settle: Duration,
    /// Wait for `CONNECT`.
    pub handshake: Duration,
    /// Wait for the first status field.
    pub first_field: Duration,
    /// Wait for each later status field.
    pub field: Duration,
    /// Wait for a command acknowledgment.
    pub command: Duration,
    /// Cap on the whole cycle measured from connect, if any.
    pub cycle_budget: Option<Duration>,
}

impl Default for ProtocolTimeouts {
    fn default() -> Self {
        ProtocolTimeouts {
            connect: Duration::from_secs(5),
            settle: Duration::from_millis(100),
            handshake: Duration::from_secs(10),
            first_field: Duration::from_millis(500),
            field: Duration::from_millis(100),
            command: Duration::from_secs(1),
            cycle_budget: Some(Duration::from_secs(30)),
        }
    }
}

impl ProtocolTimeouts {
    /// Set the settle delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Set the handshake timeout.
    pub fn with_handshake(mut self, handshake: Duration) -> Self {
        self.handshake = handshake;
        self
    }

    /// Set the overall cycle budget.
    pub fn with_cycle_budget(mut self, budget: Option<Duration>) -> Self {
        self.cycle_budget = budget;
        self
    }
}

/// One connection to the controller.
#[derive(Debug)]
pub struct Session<T: Transport> {
    host: String,
    timeouts: ProtocolTimeouts,
    state: SessionState,
    reader: Option<FieldReader<T>>,
}

impl<T: Transport> Session<T> {
    /// Create a disconnected session for `host`.
    pub fn new(host: impl Into<String>, timeouts: ProtocolTimeouts) -> Self {
        Session {
            host: host.into(),
            timeouts,
            state: SessionState::Disconnected,
            reader: None,
        }
    }

    /// Open the transport.
    ///
    /// A connect failure leaves the session `Failed` and is returned as
    /// [`ProtocolError::Connect`].
    pub fn open<C>(&mut self, connector: &C) -> Result<()>
    where
        C: Connector<Transport = T>,
    {
        if self.state != SessionState::Disconnected {
            return Err(ProtocolError::NotReady(self.state));
        }

        self.set_state(SessionState::Connecting);
        match connector.connect(&self.host, self.timeouts.connect) {
            Ok(transport) => {
                let deadline = self.timeouts.cycle_budget.map(|budget| Instant::now() + budget);
                self.reader = Some(FieldReader::new(transport).with_deadline(deadline));
                self.set_state(SessionState::Handshaking);
                Ok(())
            }
            Err(source) => {
                self.set_state(SessionState::Failed);
                Err(ProtocolError::Connect {
                    host: self.host.clone(),
                    source,
                })
            }
        }
    }

    /// Wake the controller and wait for `CONNECT`.
    ///
    /// Leading line breaks before `CONNECT` are tolerated. Any other text is
    /// a mismatch, reported as soon as it arrives. Silence, or a reply that
    /// stops partway through `CONNECT`, is a timeout.
    pub fn handshake(&mut self) -> Result<()> {
        if self.state != SessionState::Handshaking {
            return Err(ProtocolError::NotReady(self.state));
        }

        if !self.timeouts.settle.is_zero() {
            thread::sleep(self.timeouts.settle);
        }

        let timeout = self.timeouts.handshake;
        let reader = self.reader_mut()?;
        let outcome = reader
            .send(&Command::Handshake.encode())
            .and_then(|()| reader.read_expect(HANDSHAKE_REPLY.as_bytes(), LINE_NOISE, timeout));

        let result = match outcome {
            Ok(ReadUntil::Found(_)) => Ok(()),
            Ok(ReadUntil::Diverged(observed)) => Err(ProtocolError::HandshakeMismatch {
                observed: String::from_utf8_lossy(&observed).into_owned(),
            }),
            Ok(ReadUntil::TimedOut(partial)) | Ok(ReadUntil::Closed(partial)) => {
                Err(ProtocolError::HandshakeTimeout {
                    timeout,
                    observed: String::from_utf8_lossy(&partial).into_owned(),
                })
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                self.set_state(SessionState::Ready);
                info!("Connected to controller at {}", self.host);
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Release the transport. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
            debug!("Disconnected from {}", self.host);
        }
        self.state = SessionState::Disconnected;
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether commands may be issued.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Timing parameters.
    pub fn timeouts(&self) -> &ProtocolTimeouts {
        &self.timeouts
    }

    /// Reader for a Ready session.
    pub(crate) fn ready_reader(&mut self) -> Result<&mut FieldReader<T>> {
        if self.state != SessionState::Ready {
            return Err(ProtocolError::NotReady(self.state));
        }
        self.reader_mut()
    }

    /// Mark the session unusable after a failed exchange.
    pub(crate) fn mark_failed(&mut self) {
        if matches!(self.state, SessionState::Ready | SessionState::Handshaking) {
            self.set_state(SessionState::Failed);
        }
    }

    fn reader_mut(&mut self) -> Result<&mut FieldReader<T>> {
        let state = self.state;
        self.reader.as_mut().ok_or(ProtocolError::NotReady(state))
    }

    fn set_state(&mut self, state: SessionState) {
        trace!("Session {}: {:?} -> {:?}", self.host, self.state, state);
        self.state = state;
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run one operation inside a fresh session.
///
/// Opens, handshakes, runs `op` against the Ready session, and closes the
/// session on every path. Errors from any stage are returned unchanged.
pub fn run_cycle<C, R, F>(
    connector: &C,
    host: &str,
    timeouts: &ProtocolTimeouts,
    op: F,
) -> Result<R>
where
    C: Connector,
    F: FnOnce(&mut Session<C::Transport>) -> Result<R>,
{
    let mut session = Session::new(host, timeouts.clone());
    let result = drive(&mut session, connector, op);
    session.close();
    result
}

fn drive<C, R, F>(session: &mut Session<C::Transport>, connector: &C, op: F) -> Result<R>
where
    C: Connector,
    F: FnOnce(&mut Session<C::Transport>) -> Result<R>,
{
    session.open(connector)?;
    session.handshake()?;
    op(session)
}
