//! Single-shot CLI operations, each in its own session.

use homectl_protocol::{
    run_cycle, CommandIssuer, Connector, GarageOutcome, StatusPoller, StatusRecord,
    TemperatureSetpoint,
};

use crate::config::Config;
use crate::error::{Result, RunnerError};

/// Read one status record.
pub fn status<C: Connector>(connector: &C, config: &Config) -> Result<StatusRecord> {
    let poller = StatusPoller::new(config.schema);
    let record = run_cycle(connector, &config.host, &config.protocol_timeouts(), |session| {
        poller.poll(session)
    })?;
    Ok(record)
}

/// Change the thermostat set point. Returns the controller's echo.
///
/// A missing or wrong reply to either step fails with
/// `CommandTimeout` or `CommandUnacknowledged`.
pub fn set_temperature<C: Connector>(
    connector: &C,
    config: &Config,
    setpoint: &TemperatureSetpoint,
) -> Result<String> {
    let timeouts = config.protocol_timeouts();
    let issuer = CommandIssuer::from_timeouts(&timeouts);
    let reply = run_cycle(connector, &config.host, &timeouts, |session| {
        issuer.set_temperature(session, setpoint)
    })?;
    Ok(reply.into_result()?)
}

/// Outcome of `open-garage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GarageAction {
    /// The opener was pulsed; holds the controller's reply.
    Toggled(String),
    /// The door already reported open.
    AlreadyOpen,
}

/// Open the garage door.
///
/// Without `force` the door is toggled only if it reports closed; with
/// `force` it is toggled unconditionally.
pub fn open_garage<C: Connector>(
    connector: &C,
    config: &Config,
    force: bool,
) -> Result<GarageAction> {
    let timeouts = config.protocol_timeouts();
    let issuer = CommandIssuer::from_timeouts(&timeouts);
    let poller = StatusPoller::new(config.schema);

    let outcome = run_cycle(connector, &config.host, &timeouts, |session| {
        if force {
            issuer.toggle_garage_door(session).map(GarageOutcome::Toggled)
        } else {
            issuer.open_garage_door(session, &poller)
        }
    })?;

    match outcome {
        GarageOutcome::Toggled(reply) => Ok(GarageAction::Toggled(reply.into_result()?)),
        GarageOutcome::AlreadyOpen => Ok(GarageAction::AlreadyOpen),
        GarageOutcome::UnknownState(code) => Err(RunnerError::UnknownDoorState(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homectl_protocol::testing::{
        status_dump, ScriptedConnector, ScriptedTransport, Step, TransportRecorder,
    };
    use homectl_protocol::ProtocolError;

    fn config() -> Config {
        let mut config = Config::default().with_host("controller");
        config.timeouts.settle_ms = 0;
        config
    }

    fn scripted(steps: Vec<Step>) -> (ScriptedConnector, TransportRecorder) {
        let mut script = vec![Step::data("CONNECT")];
        script.extend(steps);
        let transport = ScriptedTransport::new(script);
        let recorder = transport.recorder();
        (ScriptedConnector::accepting([transport]), recorder)
    }

    fn dump_with_door(code: &str) -> String {
        let mut values: Vec<String> = (0..29).map(|i| i.to_string()).collect();
        values[5] = code.to_string();
        status_dump(&values)
    }

    #[test]
    fn test_status_reads_record_and_closes() {
        let (connector, recorder) = scripted(vec![Step::data(&dump_with_door("1"))]);
        let record = status(&connector, &config()).unwrap();
        assert_eq!(record.len(), 29);
        assert_eq!(recorder.close_count(), 1);
    }

    #[test]
    fn test_set_temperature_acknowledged() {
        let (connector, recorder) = scripted(vec![Step::data(":"), Step::data("20.50")]);
        let setpoint = TemperatureSetpoint::parse("20.5").unwrap();

        assert_eq!(set_temperature(&connector, &config(), &setpoint).unwrap(), "20.50");
        assert_eq!(recorder.written_text(), "nI20.5\r");
    }

    #[test]
    fn test_set_temperature_wrong_echo() {
        let (connector, _recorder) =
            scripted(vec![Step::data(":"), Step::data("19.00"), Step::Stall]);
        let setpoint = TemperatureSetpoint::parse("17").unwrap();

        let err = set_temperature(&connector, &config(), &setpoint).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Protocol(ProtocolError::CommandUnacknowledged {
                ref expected,
                ref observed,
                ..
            }) if expected == "17.00" && observed == "19.00"
        ));
    }

    #[test]
    fn test_set_temperature_without_prompt() {
        let (connector, recorder) = scripted(vec![Step::Stall]);
        let setpoint = TemperatureSetpoint::parse("17").unwrap();

        let err = set_temperature(&connector, &config(), &setpoint).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Protocol(ProtocolError::CommandTimeout { ref command }) if command == "I"
        ));
        assert_eq!(recorder.written_text(), "nI");
    }

    #[test]
    fn test_open_garage_force_without_reply() {
        let (connector, _recorder) = scripted(vec![Step::Stall]);

        let err = open_garage(&connector, &config(), true).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Protocol(ProtocolError::CommandTimeout { ref command })
                if command == "3\\r"
        ));
    }

    #[test]
    fn test_open_garage_skips_open_door() {
        let (connector, recorder) = scripted(vec![Step::data(&dump_with_door("0"))]);
        assert_eq!(open_garage(&connector, &config(), false).unwrap(), GarageAction::AlreadyOpen);
        assert_eq!(recorder.written_text(), "n@");
    }

    #[test]
    fn test_open_garage_force_toggles_without_polling() {
        let (connector, recorder) = scripted(vec![Step::data("garage door")]);
        let action = open_garage(&connector, &config(), true).unwrap();
        assert_eq!(action, GarageAction::Toggled("garage door".into()));
        assert_eq!(recorder.written_text(), "n3\r");
    }

    #[test]
    fn test_open_garage_unknown_state() {
        let (connector, _recorder) = scripted(vec![Step::data(&dump_with_door("9"))]);
        let err = open_garage(&connector, &config(), false).unwrap_err();
        assert!(matches!(err, RunnerError::UnknownDoorState(ref code) if code == "9"));
    }

    #[test]
    fn test_handshake_failure_propagates() {
        let silent = ScriptedConnector::accepting([ScriptedTransport::new(vec![Step::Stall])]);

        let err = status(&silent, &config()).unwrap_err();
        assert!(matches!(err, RunnerError::Protocol(ProtocolError::HandshakeTimeout { .. })));
    }
}
