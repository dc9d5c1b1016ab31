//! Telnet stream filtering.
//!
//! The controller sits behind a serial-to-telnet bridge. Most of the time the
//! bridge passes bytes straight through, but it may open the connection with
//! option negotiation. This codec strips those `IAC` sequences out of the
//! received data and queues a refusal for every option the peer offers, so
//! the field decoder only ever sees controller text.

use bytes::{BufMut, Bytes, BytesMut};

/// Interpret As Command.
pub const IAC: u8 = 255;
/// Peer asks us to stop using an option.
pub const DONT: u8 = 254;
/// Peer asks us to use an option.
pub const DO: u8 = 253;
/// Peer will not use an option.
pub const WONT: u8 = 252;
/// Peer offers to use an option.
pub const WILL: u8 = 251;
/// Start of subnegotiation.
pub const SB: u8 = 250;
/// End of subnegotiation.
pub const SE: u8 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FilterState {
    #[default]
    Data,
    Iac,
    Negotiation(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Byte-level telnet filter.
///
/// Feed raw socket bytes through [`TelnetFilter::push`]; plain data is
/// appended to the caller's buffer and negotiation replies accumulate until
/// [`TelnetFilter::take_replies`] is called.
#[derive(Debug, Default)]
pub struct TelnetFilter {
    state: FilterState,
    replies: BytesMut,
}

impl TelnetFilter {
    /// Create a new filter in the data state.
    pub fn new() -> Self {
        TelnetFilter::default()
    }

    /// Filter received bytes, appending controller text to `out`.
    ///
    /// Sequences split across calls are handled; the filter keeps its state
    /// between pushes.
    pub fn push(&mut self, data: &[u8], out: &mut BytesMut) {
        for &byte in data {
            self.state = match self.state {
                FilterState::Data => {
                    if byte == IAC {
                        FilterState::Iac
                    } else {
                        out.put_u8(byte);
                        FilterState::Data
                    }
                }
                FilterState::Iac => match byte {
                    IAC => {
                        // Escaped 0xFF data byte
                        out.put_u8(IAC);
                        FilterState::Data
                    }
                    DO | DONT | WILL | WONT => FilterState::Negotiation(byte),
                    SB => FilterState::Subnegotiation,
                    // NOP, GA and friends carry no payload
                    _ => FilterState::Data,
                },
                FilterState::Negotiation(verb) => {
                    self.refuse(verb, byte);
                    FilterState::Data
                }
                FilterState::Subnegotiation => {
                    if byte == IAC {
                        FilterState::SubnegotiationIac
                    } else {
                        FilterState::Subnegotiation
                    }
                }
                FilterState::SubnegotiationIac => {
                    if byte == SE {
                        FilterState::Data
                    } else {
                        FilterState::Subnegotiation
                    }
                }
            };
        }
    }

    /// Queue a refusal. Only requests are answered; answering DONT/WONT
    /// would start a negotiation loop with some bridges.
    fn refuse(&mut self, verb: u8, option: u8) {
        let reply = match verb {
            DO => WONT,
            WILL => DONT,
            _ => return,
        };
        self.replies.put_slice(&[IAC, reply, option]);
    }

    /// Take any negotiation replies queued since the last call.
    pub fn take_replies(&mut self) -> Option<Bytes> {
        if self.replies.is_empty() {
            None
        } else {
            Some(self.replies.split().freeze())
        }
    }

    /// Whether the filter is in the middle of a command sequence.
    pub fn in_command(&self) -> bool {
        self.state != FilterState::Data
    }

    /// Escape outgoing data so literal 0xFF bytes are not read as commands.
    pub fn escape(data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(data.len());
        for &byte in data {
            if byte == IAC {
                buf.push(IAC);
            }
            buf.push(byte);
        }
        buf
    }
}
