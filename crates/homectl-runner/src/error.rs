//! Error types for the runner.

use std::io;
use std::path::PathBuf;

use homectl_protocol::ProtocolError;
use thiserror::Error;

/// Errors loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid YAML for the config schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value parsed but makes no sense.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors publishing the status page.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The page could not be written or moved into place.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination page.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Errors sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A sender or recipient address did not parse.
    #[error("invalid email address {address:?}: {source}")]
    Address {
        /// Address as configured.
        address: String,
        /// Parse failure.
        #[source]
        source: lettre::address::AddressError,
    },

    /// No recipients were configured.
    #[error("no notification recipients configured")]
    NoRecipients,

    /// The message could not be assembled.
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    /// The relay refused or could not be reached.
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Top-level errors for the `homectl` binary.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Controller communication failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Notifier setup failed.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The door code was neither open nor closed, so nothing was sent.
    #[error("garage door state unknown (code {0:?}), not toggling")]
    UnknownDoorState(String),

    /// Status output could not be serialized.
    #[error("failed to encode status: {0}")]
    Json(#[from] serde_json::Error),

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// The log subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type alias for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
