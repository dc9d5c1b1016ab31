//! YAML configuration.
//!
//! Every key is optional. A missing file section falls back to the values
//! the controller was originally deployed with.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use homectl_protocol::{DoorState, ProtocolTimeouts, StatusSchema};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Controller address used when none is configured.
pub const DEFAULT_HOST: &str = "192.168.1.230";

/// Where the status page is written by default.
pub const DEFAULT_PAGE_PATH: &str = "/var/www/html/index.html";

/// Plain SMTP relay port.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Controller host, optionally `host:port`.
    pub host: String,
    /// Status dump layout.
    pub schema: StatusSchema,
    /// Protocol timeouts.
    pub timeouts: TimeoutConfig,
    /// Delays between daemon cycles.
    pub backoff: BackoffConfig,
    /// Status page destination.
    pub page_path: PathBuf,
    /// Door state assumed before the first successful poll.
    pub initial_door_state: InitialDoorState,
    /// Mail relay for door alerts. Alerts are only logged without it.
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            schema: StatusSchema::default(),
            timeouts: TimeoutConfig::default(),
            backoff: BackoffConfig::default(),
            page_path: PathBuf::from(DEFAULT_PAGE_PATH),
            initial_door_state: InitialDoorState::default(),
            smtp: None,
        }
    }
}

impl Config {
    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(&text)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> Result<Config, ConfigError> {
        // An empty document means "all defaults".
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Override the controller host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.page_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("page_path must not be empty".into()));
        }
        self.timeouts.validate()?;
        if let Some(smtp) = &self.smtp {
            if smtp.relay.trim().is_empty() {
                return Err(ConfigError::Invalid("smtp.relay must not be empty".into()));
            }
            if smtp.recipients.is_empty() {
                return Err(ConfigError::Invalid(
                    "smtp.recipients must list at least one address".into(),
                ));
            }
        }
        Ok(())
    }

    /// Protocol timeouts as durations.
    pub fn protocol_timeouts(&self) -> ProtocolTimeouts {
        self.timeouts.to_protocol()
    }
}

/// Timeouts in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub settle_ms: u64,
    pub handshake_ms: u64,
    pub first_field_ms: u64,
    pub field_ms: u64,
    pub command_ms: u64,
    /// `null` disables the cap.
    pub cycle_budget_ms: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let defaults = ProtocolTimeouts::default();
        TimeoutConfig {
            connect_ms: millis(defaults.connect),
            settle_ms: millis(defaults.settle),
            handshake_ms: millis(defaults.handshake),
            first_field_ms: millis(defaults.first_field),
            field_ms: millis(defaults.field),
            command_ms: millis(defaults.command),
            cycle_budget_ms: defaults.cycle_budget.map(millis),
        }
    }
}

impl TimeoutConfig {
    /// Every wait except the settle delay must be non-zero; a zero wait
    /// expires before the first read.
    fn validate(&self) -> Result<(), ConfigError> {
        let waits = [
            ("connect_ms", self.connect_ms),
            ("handshake_ms", self.handshake_ms),
            ("first_field_ms", self.first_field_ms),
            ("field_ms", self.field_ms),
            ("command_ms", self.command_ms),
        ];
        if let Some((name, _)) = waits.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::Invalid(format!(
                "timeouts.{} must be greater than zero",
                name
            )));
        }
        if self.cycle_budget_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "timeouts.cycle_budget_ms must be greater than zero, or null to disable".into(),
            ));
        }
        Ok(())
    }

    fn to_protocol(&self) -> ProtocolTimeouts {
        ProtocolTimeouts {
            connect: Duration::from_millis(self.connect_ms),
            settle: Duration::from_millis(self.settle_ms),
            handshake: Duration::from_millis(self.handshake_ms),
            first_field: Duration::from_millis(self.first_field_ms),
            field: Duration::from_millis(self.field_ms),
            command: Duration::from_millis(self.command_ms),
            cycle_budget: self.cycle_budget_ms.map(Duration::from_millis),
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Delay before the next daemon cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    /// After a complete poll.
    pub success_secs: u64,
    /// After a failed cycle.
    pub failure_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            success_secs: 10,
            failure_secs: 2,
        }
    }
}

impl BackoffConfig {
    pub fn success(&self) -> Duration {
        Duration::from_secs(self.success_secs)
    }

    pub fn failure(&self) -> Duration {
        Duration::from_secs(self.failure_secs)
    }
}

/// Seed for the door tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialDoorState {
    #[default]
    Closed,
    Open,
    /// The first successful poll seeds the tracker without an alert.
    Unknown,
}

impl InitialDoorState {
    /// State handed to the door tracker.
    pub fn to_door_state(self) -> Option<DoorState> {
        match self {
            InitialDoorState::Closed => Some(DoorState::Closed),
            InitialDoorState::Open => Some(DoorState::Open),
            InitialDoorState::Unknown => None,
        }
    }
}

/// Mail relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpConfig {
    /// Relay host name.
    pub relay: String,
    /// Relay port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// `From` address.
    pub sender: String,
    /// `To` addresses.
    pub recipients: Vec<String>,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}
