//! Requests understood by the controller.
//!
//! Commands are single ASCII characters, some followed by an argument
//! terminated with carriage return (`\r`).

use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Sent right after connecting to wake the controller's session.
pub const HANDSHAKE_BYTE: u8 = b'n';
/// Controller reply to the handshake byte.
pub const HANDSHAKE_REPLY: &str = "CONNECT";
/// Dump every status field.
pub const STATUS_DUMP_BYTE: u8 = b'@';
/// Separator between status fields.
pub const FIELD_DELIMITER: u8 = b',';
/// Enter temperature set point mode.
pub const SELECT_TEMPERATURE_BYTE: u8 = b'I';
/// Prompt the controller shows before accepting a set point.
pub const TEMPERATURE_PROMPT: &str = ":";
/// Pulse the garage door opener.
pub const GARAGE_DOOR_BYTE: u8 = b'3';
/// Text the controller includes when it has pulsed the door.
pub const GARAGE_DOOR_REPLY: &str = "door";
/// Terminator for command arguments.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Decimals in the controller's set point echo.
const MAX_FRACTION_DIGITS: usize = 2;

/// A temperature set point as typed by the user.
///
/// The wire value is the caller's own text; the controller echoes the parsed
/// value with two decimals, which [`TemperatureSetpoint::echo`] predicts.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureSetpoint {
    text: String,
    value: f64,
}

impl TemperatureSetpoint {
    /// Parse a decimal set point such as `17`, `20.5` or `-3.25`.
    ///
    /// Only plain decimal notation with at most two fractional digits is
    /// accepted, matching what the controller reads and echoes.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let digits = text.strip_prefix('-').unwrap_or(text);
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));

        let well_formed = !whole.is_empty()
            && whole.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(ProtocolError::InvalidCommand(format!(
                "temperature {:?} is not a decimal number",
                text
            )));
        }
        if fraction.len() > MAX_FRACTION_DIGITS {
            return Err(ProtocolError::InvalidCommand(format!(
                "temperature {:?} has more than {} decimals",
                text, MAX_FRACTION_DIGITS
            )));
        }

        let value: f64 = text
            .parse()
            .map_err(|e| ProtocolError::InvalidCommand(format!("temperature {:?}: {}", text, e)))?;

        Ok(TemperatureSetpoint {
            text: text.to_string(),
            value,
        })
    }

    /// Numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Text sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Echo the controller sends back once the set point is accepted.
    pub fn echo(&self) -> String {
        format!("{:.2}", self.value)
    }
}

impl FromStr for TemperatureSetpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        TemperatureSetpoint::parse(s)
    }
}

impl fmt::Display for TemperatureSetpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Requests that can be sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Session wake-up byte.
    Handshake,

    /// Request the full status dump.
    StatusDump,

    /// Enter set point mode; the controller answers with a prompt.
    SelectTemperature,

    /// Set point value, sent after the prompt.
    Temperature(TemperatureSetpoint),

    /// Pulse the garage door opener.
    ToggleGarageDoor,

    /// Arbitrary text, sent as-is followed by the terminator.
    Raw(String),
}

impl Command {
    /// Encode the command for transmission.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::Handshake => vec![HANDSHAKE_BYTE],
            Command::StatusDump => vec![STATUS_DUMP_BYTE],
            Command::SelectTemperature => vec![SELECT_TEMPERATURE_BYTE],
            Command::Temperature(setpoint) => terminated(setpoint.as_str()),
            Command::ToggleGarageDoor => vec![GARAGE_DOOR_BYTE, COMMAND_TERMINATOR],
            Command::Raw(text) => terminated(text),
        }
    }

    /// Printable form for logs and errors, with the terminator escaped.
    pub fn to_command_string(&self) -> String {
        String::from_utf8_lossy(&self.encode()).replace('\r', "\\r")
    }
}

fn terminated(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.push(COMMAND_TERMINATOR);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_single_byte_commands() {
        assert_eq!(Command::Handshake.encode(), b"n");
        assert_eq!(Command::StatusDump.encode(), b"@");
        assert_eq!(Command::SelectTemperature.encode(), b"I");
        assert_eq!(Command::ToggleGarageDoor.encode(), b"3\r");
    }

    #[test]
    fn test_encode_temperature() {
        let setpoint = TemperatureSetpoint::parse("20.5").unwrap();
        assert_eq!(Command::Temperature(setpoint).encode(), b"20.5\r");
    }

    #[test]
    fn test_command_string_escapes_terminator() {
        assert_eq!(Command::ToggleGarageDoor.to_command_string(), "3\\r");
        assert_eq!(Command::Raw("x".into()).to_command_string(), "x\\r");
    }

    #[test]
    fn test_setpoint_echo() {
        assert_eq!(TemperatureSetpoint::parse("17").unwrap().echo(), "17.00");
        assert_eq!(TemperatureSetpoint::parse("20.5").unwrap().echo(), "20.50");
        assert_eq!(TemperatureSetpoint::parse(" 19.25 ").unwrap().echo(), "19.25");
        assert_eq!(TemperatureSetpoint::parse("-3").unwrap().echo(), "-3.00");
    }

    #[test]
    fn test_setpoint_keeps_caller_text() {
        let setpoint: TemperatureSetpoint = "17".parse().unwrap();
        assert_eq!(setpoint.as_str(), "17");
        assert_eq!(setpoint.to_string(), "17");
        assert_eq!(setpoint.value(), 17.0);
    }

    #[test]
    fn test_setpoint_rejects_extra_decimals() {
        for bad in ["18.375", "20.001", "-3.125"] {
            assert!(
                matches!(TemperatureSetpoint::parse(bad), Err(ProtocolError::InvalidCommand(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert_eq!(TemperatureSetpoint::parse("18.37").unwrap().echo(), "18.37");
        assert_eq!(TemperatureSetpoint::parse("18.").unwrap().echo(), "18.00");
    }

    #[test]
    fn test_setpoint_rejects_non_decimal() {
        for bad in ["", "abc", "1e3", "inf", "NaN", "12,5", ".5", "-", "1.2.3"] {
            assert!(
                matches!(TemperatureSetpoint::parse(bad), Err(ProtocolError::InvalidCommand(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
