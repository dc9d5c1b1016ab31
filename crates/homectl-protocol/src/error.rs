//! Error types for the controller protocol.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Errors raised while decoding fields from the byte stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The delimiter did not arrive before the read timeout. Any bytes
    /// received for the field are discarded.
    #[error("field delimiter not received within {timeout:?}")]
    FieldTimeout {
        /// Timeout that applied to the read.
        timeout: Duration,
    },

    /// The connection ended before a delimiter arrived.
    #[error("stream closed before field delimiter")]
    StreamClosed,

    /// The underlying transport failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur while talking to the controller.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The transport connection could not be established.
    #[error("failed to connect to {host}: {source}")]
    Connect {
        /// Host that was dialled.
        host: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// `CONNECT` was not received before the handshake timeout.
    #[error("controller did not answer handshake within {timeout:?} (saw {observed:?})")]
    HandshakeTimeout {
        /// Timeout that applied to the handshake.
        timeout: Duration,
        /// Bytes seen before the timeout, if any.
        observed: String,
    },

    /// Something other than `CONNECT` arrived during the handshake.
    #[error("unexpected handshake response {observed:?}")]
    HandshakeMismatch {
        /// Text received instead of `CONNECT`.
        observed: String,
    },

    /// A field read failed outside of a status dump.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The status dump ended before every schema field was decoded.
    #[error("partial status record: {received} of {expected} fields")]
    PartialRecord {
        /// Fields decoded before the failure.
        received: usize,
        /// Fields the schema requires.
        expected: usize,
        /// Decode failure that cut the record short.
        #[source]
        source: DecodeError,
    },

    /// Nothing came back for a command before its timeout.
    #[error("command {command:?} timed out")]
    CommandTimeout {
        /// Command as sent on the wire.
        command: String,
    },

    /// The controller answered a command with something unexpected.
    #[error("command {command:?} not acknowledged: expected {expected:?}, saw {observed:?}")]
    CommandUnacknowledged {
        /// Command as sent on the wire.
        command: String,
        /// Acknowledgment text that was awaited.
        expected: String,
        /// Text the controller actually sent.
        observed: String,
    },

    /// The operation needs a Ready session.
    #[error("session is not ready (state {0:?})")]
    NotReady(SessionState),

    /// A command argument could not be encoded.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl ProtocolError {
    /// Whether the error means the controller link itself is unusable,
    /// as opposed to a command-level rejection.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ProtocolError::Connect { .. }
                | ProtocolError::HandshakeTimeout { .. }
                | ProtocolError::HandshakeMismatch { .. }
                | ProtocolError::Decode(DecodeError::StreamClosed)
                | ProtocolError::Decode(DecodeError::Io(_))
        )
    }

    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Connect { .. } => "connect",
            ProtocolError::HandshakeTimeout { .. } => "handshake_timeout",
            ProtocolError::HandshakeMismatch { .. } => "handshake_mismatch",
            ProtocolError::Decode(DecodeError::FieldTimeout { .. }) => "field_timeout",
            ProtocolError::Decode(DecodeError::StreamClosed) => "stream_closed",
            ProtocolError::Decode(DecodeError::Io(_)) => "io",
            ProtocolError::PartialRecord { .. } => "partial_record",
            ProtocolError::CommandTimeout { .. } => "command_timeout",
            ProtocolError::CommandUnacknowledged { .. } => "command_unacknowledged",
            ProtocolError::NotReady(_) => "not_ready",
            ProtocolError::InvalidCommand(_) => "invalid_command",
        }
    }
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
