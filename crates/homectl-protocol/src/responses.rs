//! Command acknowledgments.
//!
//! The controller has no status codes. A command counts as accepted when the
//! text it sends back contains what the command is expected to provoke:
//! the `:` prompt, the two-decimal echo of a set point, the word `door`.

use std::fmt;
use std::time::Duration;

use crate::commands::{Command, TemperatureSetpoint, GARAGE_DOOR_REPLY, TEMPERATURE_PROMPT};
use crate::decoder::ReadUntil;
use crate::error::{DecodeError, ProtocolError, Result};

/// Outcome of issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// The expected text arrived; holds what was read.
    Acknowledged(String),
    /// The controller answered with something else.
    Unacknowledged(String),
    /// Nothing arrived before the timeout.
    Timeout,
}

impl CommandResult {
    /// Whether the command was acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, CommandResult::Acknowledged(_))
    }

    /// Text received from the controller, if any.
    pub fn observed(&self) -> Option<&str> {
        match self {
            CommandResult::Acknowledged(text) | CommandResult::Unacknowledged(text) => Some(text),
            CommandResult::Timeout => None,
        }
    }

    /// Convert to a `Result` for callers that treat anything but an
    /// acknowledgment as failure.
    pub fn into_result(self, exchange: &Exchange) -> Result<String> {
        match self {
            CommandResult::Acknowledged(text) => Ok(text),
            CommandResult::Unacknowledged(observed) => Err(ProtocolError::CommandUnacknowledged {
                command: exchange.command.to_command_string(),
                expected: exchange.expect.clone(),
                observed,
            }),
            CommandResult::Timeout => Err(ProtocolError::CommandTimeout {
                command: exchange.command.to_command_string(),
            }),
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Acknowledged(text) => write!(f, "acknowledged ({:?})", text),
            CommandResult::Unacknowledged(text) => write!(f, "unexpected reply {:?}", text),
            CommandResult::Timeout => f.write_str("no reply"),
        }
    }
}

/// A command's result together with the exchange that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    /// The exchange that decided the result.
    pub exchange: Exchange,
    /// How the controller answered.
    pub result: CommandResult,
}

impl CommandReply {
    /// Whether the command was acknowledged.
    pub fn is_acknowledged(&self) -> bool {
        self.result.is_acknowledged()
    }

    /// The acknowledgment text, or the matching [`ProtocolError`].
    pub fn into_result(self) -> Result<String> {
        self.result.into_result(&self.exchange)
    }
}

/// One request/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    /// Command to send.
    pub command: Command,
    /// Read stops once this text arrives.
    pub delimiter: String,
    /// Text that must appear in the reply for an acknowledgment.
    pub expect: String,
    /// How long to wait for the delimiter.
    pub timeout: Duration,
}

impl Exchange {
    /// Exchange whose reply ends with the expected text itself.
    pub fn expecting(command: Command, expect: &str, timeout: Duration) -> Self {
        Exchange {
            command,
            delimiter: expect.to_string(),
            expect: expect.to_string(),
            timeout,
        }
    }

    /// `I` followed by the `:` prompt.
    pub fn temperature_prompt(timeout: Duration) -> Self {
        Exchange::expecting(Command::SelectTemperature, TEMPERATURE_PROMPT, timeout)
    }

    /// Set point value followed by its two-decimal echo.
    pub fn temperature_value(setpoint: &TemperatureSetpoint, timeout: Duration) -> Self {
        let echo = setpoint.echo();
        Exchange::expecting(Command::Temperature(setpoint.clone()), &echo, timeout)
    }

    /// `3\r` followed by a reply mentioning the door.
    pub fn garage_door(timeout: Duration) -> Self {
        Exchange::expecting(Command::ToggleGarageDoor, GARAGE_DOOR_REPLY, timeout)
    }

    /// Classify what the controller sent back.
    ///
    /// A timeout with some text received is an `Unacknowledged` answer, not
    /// a `Timeout`; a close with nothing received is a stream error.
    pub fn evaluate(&self, outcome: ReadUntil) -> Result<CommandResult> {
        match outcome {
            ReadUntil::Found(before) => {
                let mut text = String::from_utf8_lossy(&before).into_owned();
                text.push_str(&self.delimiter);
                let text = text.trim().to_string();
                if text.contains(&self.expect) {
                    Ok(CommandResult::Acknowledged(text))
                } else {
                    Ok(CommandResult::Unacknowledged(text))
                }
            }
            ReadUntil::TimedOut(partial) | ReadUntil::Diverged(partial) => {
                Ok(observed_or(partial, CommandResult::Timeout))
            }
            ReadUntil::Closed(partial) => {
                if partial.is_empty() {
                    Err(DecodeError::StreamClosed.into())
                } else {
                    Ok(observed_or(partial, CommandResult::Timeout))
                }
            }
        }
    }
}

fn observed_or(partial: Vec<u8>, nothing: CommandResult) -> CommandResult {
    let text = String::from_utf8_lossy(&partial).trim().to_string();
    if text.is_empty() {
        nothing
    } else {
        CommandResult::Unacknowledged(text)
    }
}
