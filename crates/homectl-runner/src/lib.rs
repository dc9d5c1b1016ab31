//! Home controller runner.
//!
//! Everything around the protocol client that turns it into a service:
//!
//! - [`config`]: YAML configuration with defaults for every key
//! - [`daemon`]: the polling loop, door tracking and backoff
//! - [`page`]: HTML status page rendering and atomic publishing
//! - [`notify`]: door alerts over SMTP, or to the log
//! - [`oneshot`]: status, set-temp and open-garage for the CLI
//! - [`telemetry`]: metric declarations
//!
//! The `homectl` binary wires these together.

pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod notify;
pub mod oneshot;
pub mod page;
pub mod telemetry;

pub use config::Config;
pub use daemon::{CycleOutcome, Daemon};
pub use error::{ConfigError, NotifyError, Result, RunnerError, SinkError};
pub use notify::{LogNotifier, Notifier, SmtpNotifier};
pub use page::{HtmlPageSink, StatusPage, StatusSink};
