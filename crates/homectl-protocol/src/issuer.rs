//! Command exchanges with acknowledgment checking.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::commands::TemperatureSetpoint;
use crate::door::DoorState;
use crate::error::{ProtocolError, Result};
use crate::poller::StatusPoller;
use crate::responses::{CommandReply, CommandResult, Exchange};
use crate::schema::names;
use crate::session::{ProtocolTimeouts, Session};
use crate::transport::Transport;

/// Outcome of a conditional garage door open.
#[derive(Debug, Clone, PartialEq)]
pub enum GarageOutcome {
    /// The door reported closed and `3` was sent.
    Toggled(CommandReply),
    /// The door already reported open; nothing was sent.
    AlreadyOpen,
    /// The door code was not one the controller defines; nothing was sent.
    UnknownState(String),
}

/// Issues commands on a Ready session, one exchange at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandIssuer {
    timeout: Duration,
}

impl Default for CommandIssuer {
    fn default() -> Self {
        CommandIssuer::from_timeouts(&ProtocolTimeouts::default())
    }
}

impl CommandIssuer {
    /// Issuer using the command timeout from `timeouts`.
    pub fn from_timeouts(timeouts: &ProtocolTimeouts) -> Self {
        CommandIssuer {
            timeout: timeouts.command,
        }
    }

    /// Send one command and classify the reply.
    ///
    /// Only transport failures are errors; a wrong or missing reply comes
    /// back as a [`CommandReply`] whose result says so.
    pub fn issue<T: Transport>(
        &self,
        session: &mut Session<T>,
        exchange: Exchange,
    ) -> Result<CommandReply> {
        let reader = session.ready_reader()?;
        let outcome = reader
            .send(&exchange.command.encode())
            .and_then(|()| reader.read_until(exchange.delimiter.as_bytes(), exchange.timeout));

        let result = match outcome.map_err(ProtocolError::from).and_then(|o| exchange.evaluate(o)) {
            Ok(result) => result,
            Err(e) => {
                session.mark_failed();
                return Err(e);
            }
        };

        let command = exchange.command.to_command_string();
        match &result {
            CommandResult::Acknowledged(_) => debug!("Command {} acknowledged", command),
            other => warn!("Command {} not acknowledged: {}", command, other),
        }
        Ok(CommandReply { exchange, result })
    }

    /// Set the thermostat set point.
    ///
    /// Sends `I` and waits for the prompt. If the prompt is not acknowledged
    /// the value is never sent and the prompt's reply is returned.
    pub fn set_temperature<T: Transport>(
        &self,
        session: &mut Session<T>,
        setpoint: &TemperatureSetpoint,
    ) -> Result<CommandReply> {
        let prompt = self.issue(session, Exchange::temperature_prompt(self.timeout))?;
        if !prompt.is_acknowledged() {
            return Ok(prompt);
        }

        let reply = self.issue(session, Exchange::temperature_value(setpoint, self.timeout))?;
        if reply.is_acknowledged() {
            info!("Temperature set point changed to {}", setpoint.echo());
        }
        Ok(reply)
    }

    /// Pulse the garage door opener unconditionally.
    pub fn toggle_garage_door<T: Transport>(
        &self,
        session: &mut Session<T>,
    ) -> Result<CommandReply> {
        self.issue(session, Exchange::garage_door(self.timeout))
    }

    /// Open the garage door only if it currently reports closed.
    ///
    /// Polls the status dump first in the same session.
    pub fn open_garage_door<T: Transport>(
        &self,
        session: &mut Session<T>,
        poller: &StatusPoller,
    ) -> Result<GarageOutcome> {
        let record = poller.poll(session)?;
        match record.door_state() {
            Some(DoorState::Closed) => {
                Ok(GarageOutcome::Toggled(self.toggle_garage_door(session)?))
            }
            Some(DoorState::Open) => {
                info!("Garage door already open, not toggling");
                Ok(GarageOutcome::AlreadyOpen)
            }
            None => {
                let code = record
                    .get(names::GARAGE_DOOR_STATUS)
                    .unwrap_or_default()
                    .to_string();
                warn!("Garage door state unknown ({:?}), not toggling", code);
                Ok(GarageOutcome::UnknownState(code))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, ProtocolError};
    use crate::schema::StatusSchema;
    use crate::session::SessionState;
    use crate::testing::{
        status_dump, ScriptedConnector, ScriptedTransport, Step, TransportRecorder,
    };

    fn ready_session(steps: Vec<Step>) -> (Session<ScriptedTransport>, TransportRecorder) {
        let mut script = vec![Step::data("CONNECT")];
        script.extend(steps);
        let transport = ScriptedTransport::new(script);
        let recorder = transport.recorder();
        let connector = ScriptedConnector::accepting([transport]);
        let mut session = Session::new(
            "controller",
            ProtocolTimeouts::default().with_settle(Duration::ZERO),
        );
        session.open(&connector).unwrap();
        session.handshake().unwrap();
        (session, recorder)
    }

    fn setpoint(text: &str) -> TemperatureSetpoint {
        TemperatureSetpoint::parse(text).unwrap()
    }

    fn dump_with_door(code: &str) -> String {
        let mut values: Vec<String> = (0..StatusSchema::Standard.len())
            .map(|i| i.to_string())
            .collect();
        values[5] = code.to_string();
        status_dump(&values)
    }

    #[test]
    fn test_set_temperature_whole_number() {
        let (mut session, recorder) =
            ready_session(vec![Step::data("Set point:"), Step::data("17.00\r\n")]);

        let reply = CommandIssuer::default()
            .set_temperature(&mut session, &setpoint("17"))
            .unwrap();
        assert_eq!(reply.result, CommandResult::Acknowledged("17.00".into()));
        assert_eq!(recorder.written_text(), "nI17\r");
    }

    #[test]
    fn test_set_temperature_fraction() {
        let (mut session, _recorder) = ready_session(vec![Step::data(":"), Step::data("20.50")]);

        let reply = CommandIssuer::default()
            .set_temperature(&mut session, &setpoint("20.5"))
            .unwrap();
        assert!(reply.is_acknowledged());
        assert_eq!(reply.into_result().unwrap(), "20.50");
    }

    #[test]
    fn test_set_temperature_wrong_echo() {
        let (mut session, _recorder) =
            ready_session(vec![Step::data(":"), Step::data("19.00"), Step::Stall]);

        let reply = CommandIssuer::default()
            .set_temperature(&mut session, &setpoint("17"))
            .unwrap();
        assert_eq!(reply.result, CommandResult::Unacknowledged("19.00".into()));
        assert_eq!(reply.exchange.expect, "17.00");
        assert!(session.is_ready());
    }

    #[test]
    fn test_set_temperature_aborts_without_prompt() {
        let (mut session, recorder) = ready_session(vec![Step::Stall]);

        let reply = CommandIssuer::default()
            .set_temperature(&mut session, &setpoint("17"))
            .unwrap();
        assert_eq!(reply.result, CommandResult::Timeout);
        assert!(matches!(
            reply.into_result(),
            Err(ProtocolError::CommandTimeout { ref command }) if command == "I"
        ));
        assert_eq!(recorder.written_text(), "nI");
    }

    #[test]
    fn test_toggle_garage_door() {
        let (mut session, recorder) = ready_session(vec![Step::data("Toggling garage door\r\n")]);

        let reply = CommandIssuer::default().toggle_garage_door(&mut session).unwrap();
        assert_eq!(reply.result, CommandResult::Acknowledged("Toggling garage door".into()));
        assert_eq!(recorder.written_text(), "n3\r");
    }

    #[test]
    fn test_issue_stream_closed_fails_session() {
        let (mut session, _recorder) = ready_session(vec![Step::Close]);

        let err = CommandIssuer::default().toggle_garage_door(&mut session).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(DecodeError::StreamClosed)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_open_garage_door_when_closed() {
        let (mut session, recorder) =
            ready_session(vec![Step::data(&dump_with_door("1")), Step::data("door")]);

        let outcome = CommandIssuer::default()
            .open_garage_door(&mut session, &StatusPoller::default())
            .unwrap();
        let GarageOutcome::Toggled(reply) = outcome else {
            panic!("expected a toggle, got {:?}", outcome);
        };
        assert_eq!(reply.result, CommandResult::Acknowledged("door".into()));
        assert_eq!(recorder.written_text(), "n@3\r");
    }

    #[test]
    fn test_open_garage_door_when_already_open() {
        let (mut session, recorder) = ready_session(vec![Step::data(&dump_with_door("0"))]);

        let outcome = CommandIssuer::default()
            .open_garage_door(&mut session, &StatusPoller::default())
            .unwrap();
        assert_eq!(outcome, GarageOutcome::AlreadyOpen);
        assert_eq!(recorder.written_text(), "n@");
    }

    #[test]
    fn test_open_garage_door_unknown_code() {
        let (mut session, _recorder) = ready_session(vec![Step::data(&dump_with_door("7"))]);

        let outcome = CommandIssuer::default()
            .open_garage_door(&mut session, &StatusPoller::default())
            .unwrap();
        assert_eq!(outcome, GarageOutcome::UnknownState("7".into()));
    }

    #[test]
    fn test_issue_requires_ready_session() {
        let mut session: Session<ScriptedTransport> =
            Session::new("controller", ProtocolTimeouts::default());
        let err = CommandIssuer::default().toggle_garage_door(&mut session).unwrap_err();
        assert!(matches!(err, ProtocolError::NotReady(_)));
    }
}
