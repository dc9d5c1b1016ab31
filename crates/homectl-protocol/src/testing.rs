//! Scripted transports for exercising the protocol without a controller.
//!
//! A [`ScriptedTransport`] replays a fixed list of [`Step`]s: each read
//! returns the next data chunk, a stall reads as a timeout, and a close ends
//! the stream for good. Nothing sleeps, so timeouts are instantaneous.
//! Writes, the timeout of every read and close calls are recorded and can be
//! inspected through a [`TransportRecorder`] after the transport has been moved
//! into a session.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::transport::{Connector, ReadEvent, Transport};

/// One scripted read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Bytes delivered by the next read (split if the buffer is smaller).
    Data(Vec<u8>),
    /// The next read times out.
    Stall,
    /// The peer closes the stream; every later read sees the close too.
    Close,
}

impl Step {
    /// Data step from text.
    pub fn data(text: &str) -> Step {
        Step::Data(text.as_bytes().to_vec())
    }
}

#[derive(Debug)]
struct TransportLog {
    created: Instant,
    steps: VecDeque<Step>,
    written: Vec<u8>,
    /// Time since `created` of each send.
    sends: Vec<Duration>,
    /// Timeout passed to each recv.
    read_timeouts: Vec<Duration>,
    closes: usize,
}

fn lock(log: &Mutex<TransportLog>) -> MutexGuard<'_, TransportLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory transport replaying a script.
///
/// An exhausted script behaves like a silent peer: every read times out.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl ScriptedTransport {
    /// Create a transport that will replay `steps` in order.
    pub fn new(steps: Vec<Step>) -> Self {
        ScriptedTransport {
            log: Arc::new(Mutex::new(TransportLog {
                created: Instant::now(),
                steps: steps.into(),
                written: Vec::new(),
                sends: Vec::new(),
                read_timeouts: Vec::new(),
                closes: 0,
            })),
        }
    }

    /// Handle for inspecting the transport after it has been moved.
    pub fn recorder(&self) -> TransportRecorder {
        TransportRecorder {
            log: Arc::clone(&self.log),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let mut log = lock(&self.log);
        if log.closes > 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "transport closed"));
        }
        let elapsed = log.created.elapsed();
        log.sends.push(elapsed);
        log.written.extend_from_slice(data);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadEvent> {
        let mut log = lock(&self.log);
        log.read_timeouts.push(timeout);
        if log.closes > 0 {
            return Ok(ReadEvent::Closed);
        }

        match log.steps.pop_front() {
            Some(Step::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    log.steps.push_front(Step::Data(bytes.split_off(n)));
                }
                Ok(ReadEvent::Data(n))
            }
            Some(Step::Stall) | None => Ok(ReadEvent::TimedOut),
            Some(Step::Close) => {
                log.steps.push_front(Step::Close);
                Ok(ReadEvent::Closed)
            }
        }
    }

    fn close(&mut self) {
        lock(&self.log).closes += 1;
    }
}

/// Read-only view of a [`ScriptedTransport`]'s activity.
#[derive(Debug, Clone)]
pub struct TransportRecorder {
    log: Arc<Mutex<TransportLog>>,
}

impl TransportRecorder {
    /// Everything written to the transport so far.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.log).written.clone()
    }

    /// Written bytes as text.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&lock(&self.log).written).into_owned()
    }

    /// Number of reads attempted.
    pub fn reads(&self) -> usize {
        lock(&self.log).read_timeouts.len()
    }

    /// Timeout handed to each read, in order.
    pub fn read_timeouts(&self) -> Vec<Duration> {
        lock(&self.log).read_timeouts.clone()
    }

    /// When each send happened, measured from the transport's creation.
    pub fn send_times(&self) -> Vec<Duration> {
        lock(&self.log).sends.clone()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        lock(&self.log).closes
    }
}

/// Connector handing out scripted transports, or refusing.
#[derive(Debug)]
pub struct ScriptedConnector {
    transports: Mutex<VecDeque<ScriptedTransport>>,
    refusal: Option<io::ErrorKind>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    /// Accept one connection per transport, in order. Once they run out the
    /// connector refuses.
    pub fn accepting(transports: impl IntoIterator<Item = ScriptedTransport>) -> Self {
        ScriptedConnector {
            transports: Mutex::new(transports.into_iter().collect()),
            refusal: None,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fail every connection attempt with `kind`.
    pub fn refusing(kind: io::ErrorKind) -> Self {
        ScriptedConnector {
            transports: Mutex::new(VecDeque::new()),
            refusal: Some(kind),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&self, host: &str, _timeout: Duration) -> io::Result<ScriptedTransport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.refusal {
            return Err(io::Error::new(kind, format!("scripted refusal for {}", host)));
        }
        self.transports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("no script left for {}", host),
                )
            })
    }
}

/// Build a comma-terminated status dump from field values.
pub fn status_dump<S: AsRef<str>>(values: &[S]) -> String {
    let mut dump = String::new();
    for value in values {
        dump.push_str(value.as_ref());
        dump.push(',');
    }
    dump
}
