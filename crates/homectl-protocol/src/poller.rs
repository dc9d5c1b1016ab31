//! Status dump polling.

use std::time::Duration;

use tracing::{debug, warn};

use crate::commands::{Command, FIELD_DELIMITER};
use crate::error::{DecodeError, ProtocolError, Result};
use crate::schema::{StatusRecord, StatusSchema};
use crate::session::Session;
use crate::transport::Transport;

/// Bytes that may end the final field of a dump.
const FINAL_FIELD_TERMINATORS: &[u8] = b",\r\n";

/// Requests the status dump and decodes it against a schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusPoller {
    schema: StatusSchema,
}

impl StatusPoller {
    /// Poller for the given dump layout.
    pub fn new(schema: StatusSchema) -> Self {
        StatusPoller { schema }
    }

    /// Layout this poller decodes.
    pub fn schema(&self) -> StatusSchema {
        self.schema
    }

    /// Send `@` and read one field per schema entry.
    ///
    /// The first field gets the longer `first_field` timeout while the
    /// controller collects its readings. A record is only returned when every
    /// field arrived; otherwise the session is marked failed and
    /// [`ProtocolError::PartialRecord`] reports how far decoding got.
    pub fn poll<T: Transport>(&self, session: &mut Session<T>) -> Result<StatusRecord> {
        let timeouts = session.timeouts().clone();
        let expected = self.schema.len();

        let reader = session.ready_reader()?;
        if let Err(source) = reader.send(&Command::StatusDump.encode()) {
            session.mark_failed();
            return Err(ProtocolError::PartialRecord {
                received: 0,
                expected,
                source,
            });
        }

        let mut values = Vec::with_capacity(expected);
        for index in 0..expected {
            let timeout = field_timeout(index, timeouts.first_field, timeouts.field);
            let field = if index + 1 == expected {
                reader.read_field_any(FINAL_FIELD_TERMINATORS, timeout)
            } else {
                reader.read_field(FIELD_DELIMITER, timeout)
            };

            match field {
                Ok(value) => values.push(value),
                Err(source) => {
                    let received = values.len();
                    warn!(
                        "Status dump cut short after {} of {} fields ({})",
                        received, expected, source
                    );
                    session.mark_failed();
                    return Err(ProtocolError::PartialRecord {
                        received,
                        expected,
                        source,
                    });
                }
            }
        }

        debug!("Decoded {} status fields", values.len());
        StatusRecord::new(self.schema, values).ok_or(ProtocolError::PartialRecord {
            received: expected,
            expected,
            source: DecodeError::StreamClosed,
        })
    }
}

fn field_timeout(index: usize, first: Duration, rest: Duration) -> Duration {
    if index == 0 {
        first
    } else {
        rest
    }
}
