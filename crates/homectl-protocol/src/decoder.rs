//! Delimited field decoding with per-read timeouts.
//!
//! The controller answers every request with plain ASCII text and no framing
//! beyond single-byte delimiters, so reads are expressed as "everything up to
//! X, within T". Bytes that arrive after a delimiter stay buffered for the
//! next read.

use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::TelnetFilter;
use crate::error::DecodeError;
use crate::transport::{ReadEvent, Transport};

/// Size of a single socket read.
const READ_CHUNK: usize = 256;

/// Outcome of [`FieldReader::read_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadUntil {
    /// The pattern was found; holds the bytes before it. The pattern itself
    /// is consumed.
    Found(Vec<u8>),
    /// The timeout expired; holds the bytes received so far.
    TimedOut(Vec<u8>),
    /// The peer closed the stream; holds the bytes received so far.
    Closed(Vec<u8>),
    /// The received text can no longer become the expected reply; holds
    /// everything buffered. Only [`FieldReader::read_expect`] reports this.
    Diverged(Vec<u8>),
}

/// Result of scanning the buffer for the end of a read.
enum Scan {
    /// Bytes `start..end` end the read; `..start` is returned.
    Match(usize, usize),
    /// Need more bytes.
    Pending,
    /// Give up without waiting any longer.
    Diverged,
}

impl ReadUntil {
    /// Bytes carried by the outcome, whatever it was.
    pub fn bytes(&self) -> &[u8] {
        match self {
            ReadUntil::Found(b)
            | ReadUntil::TimedOut(b)
            | ReadUntil::Closed(b)
            | ReadUntil::Diverged(b) => b,
        }
    }
}

/// Reads delimited text from a [`Transport`].
///
/// Every read is bounded by its own timeout and, optionally, by a shared
/// deadline that caps the whole exchange.
#[derive(Debug)]
pub struct FieldReader<T: Transport> {
    transport: T,
    filter: TelnetFilter,
    buffer: BytesMut,
    deadline: Option<Instant>,
}

impl<T: Transport> FieldReader<T> {
    /// Wrap a connected transport.
    pub fn new(transport: T) -> Self {
        FieldReader {
            transport,
            filter: TelnetFilter::new(),
            buffer: BytesMut::with_capacity(READ_CHUNK * 2),
            deadline: None,
        }
    }

    /// Cap every subsequent read at `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Number of decoded bytes waiting for the next read.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Send raw request bytes to the controller.
    pub fn send(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        trace!("-> {:?}", String::from_utf8_lossy(data));
        self.transport.send(&TelnetFilter::escape(data))?;
        Ok(())
    }

    /// Read the next field terminated by `delimiter`.
    ///
    /// On timeout the partial field is dropped and [`DecodeError::FieldTimeout`]
    /// is returned; if the stream ends first the result is
    /// [`DecodeError::StreamClosed`].
    pub fn read_field(&mut self, delimiter: u8, timeout: Duration) -> Result<String, DecodeError> {
        self.read_field_any(&[delimiter], timeout)
    }

    /// Read the next field terminated by any byte in `terminators`.
    pub fn read_field_any(
        &mut self,
        terminators: &[u8],
        timeout: Duration,
    ) -> Result<String, DecodeError> {
        let outcome = self.fill_until(timeout, |buf| {
            match buf.iter().position(|b| terminators.contains(b)) {
                Some(i) => Scan::Match(i, i + 1),
                None => Scan::Pending,
            }
        })?;

        match outcome {
            ReadUntil::Found(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            ReadUntil::TimedOut(partial) | ReadUntil::Diverged(partial) => {
                trace!("Field timed out after {:?}, dropping {} bytes", timeout, partial.len());
                Err(DecodeError::FieldTimeout { timeout })
            }
            ReadUntil::Closed(partial) => {
                trace!("Stream closed mid-field, dropping {} bytes", partial.len());
                Err(DecodeError::StreamClosed)
            }
        }
    }

    /// Read until the multi-byte `pattern` appears.
    ///
    /// Unlike [`FieldReader::read_field`], timeouts and closes are reported
    /// as outcomes carrying the partial bytes so callers can inspect what the
    /// controller did send.
    pub fn read_until(
        &mut self,
        pattern: &[u8],
        timeout: Duration,
    ) -> Result<ReadUntil, DecodeError> {
        if pattern.is_empty() {
            return Ok(ReadUntil::Found(Vec::new()));
        }
        self.fill_until(timeout, |buf| {
            match buf.windows(pattern.len()).position(|w| w == pattern) {
                Some(i) => Scan::Match(i, i + pattern.len()),
                None => Scan::Pending,
            }
        })
    }

    /// Read an exact reply, allowing only bytes from `skip` before it.
    ///
    /// Returns [`ReadUntil::Diverged`] as soon as the buffered text stops
    /// being a prefix of `pattern`, without waiting out the timeout. `Found`
    /// then holds only skipped bytes.
    pub fn read_expect(
        &mut self,
        pattern: &[u8],
        skip: &[u8],
        timeout: Duration,
    ) -> Result<ReadUntil, DecodeError> {
        self.fill_until(timeout, |buf| {
            let start = buf.iter().position(|b| !skip.contains(b)).unwrap_or(buf.len());
            let rest = &buf[start..];
            if rest.starts_with(pattern) {
                Scan::Match(start, start + pattern.len())
            } else if pattern.starts_with(rest) {
                Scan::Pending
            } else {
                Scan::Diverged
            }
        })
    }

    /// Close the underlying transport.
    pub fn close(&mut self) {
        self.buffer.clear();
        self.transport.close();
    }

    fn effective_deadline(&self, timeout: Duration) -> Instant {
        let field_deadline = Instant::now() + timeout;
        match self.deadline {
            Some(cap) if cap < field_deadline => cap,
            _ => field_deadline,
        }
    }

    /// Pull bytes until `scan` finds the end of the read in the buffer.
    fn fill_until<F>(&mut self, timeout: Duration, scan: F) -> Result<ReadUntil, DecodeError>
    where
        F: Fn(&[u8]) -> Scan,
    {
        let deadline = self.effective_deadline(timeout);
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match scan(&self.buffer[..]) {
                Scan::Match(start, end) => {
                    let mut taken = self.buffer.split_to(end);
                    taken.truncate(start);
                    trace!("<- {:?}", String::from_utf8_lossy(&taken));
                    return Ok(ReadUntil::Found(taken.to_vec()));
                }
                Scan::Diverged => return Ok(ReadUntil::Diverged(self.drain())),
                Scan::Pending => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(ReadUntil::TimedOut(self.drain()));
            }

            match self.transport.recv(&mut chunk, deadline - now)? {
                ReadEvent::Data(n) => {
                    self.filter.push(&chunk[..n], &mut self.buffer);
                    if let Some(replies) = self.filter.take_replies() {
                        trace!("Refusing {} bytes of telnet negotiation", replies.len());
                        self.transport.send(&replies)?;
                    }
                }
                ReadEvent::TimedOut => return Ok(ReadUntil::TimedOut(self.drain())),
                ReadEvent::Closed => return Ok(ReadUntil::Closed(self.drain())),
            }
        }
    }

    fn drain(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }
}
