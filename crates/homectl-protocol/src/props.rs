//! Property-based tests for status dump decoding.
//!
//! - Every well-formed dump decodes position by position, however the bytes
//!   are split across reads
//! - A dump cut short reports exactly how many fields arrived

#![cfg(test)]

use std::time::Duration;

use proptest::prelude::*;

use crate::error::{DecodeError, ProtocolError, Result};
use crate::poller::StatusPoller;
use crate::schema::{StatusRecord, StatusSchema};
use crate::session::{ProtocolTimeouts, Session};
use crate::testing::{ScriptedConnector, ScriptedTransport, Step};

/// Printable ASCII without the field delimiter; empty fields allowed.
const FIELD: &str = "[ -+\\--~]{0,12}";

const FIELDS: usize = 29;

fn chunked(text: &str, size: usize) -> Vec<Step> {
    text.as_bytes()
        .chunks(size)
        .map(|chunk| Step::Data(chunk.to_vec()))
        .collect()
}

/// Handshake, then poll a dump delivered by `script`.
fn poll_script(script: Vec<Step>) -> Result<StatusRecord> {
    let mut steps = vec![Step::data("CONNECT")];
    steps.extend(script);
    let connector = ScriptedConnector::accepting([ScriptedTransport::new(steps)]);
    let timeouts = ProtocolTimeouts::default().with_settle(Duration::ZERO);
    let mut session = Session::new("controller", timeouts);
    session.open(&connector)?;
    session.handshake()?;
    StatusPoller::new(StatusSchema::Standard).poll(&mut session)
}

proptest! {
    #[test]
    fn prop_fields_decode_by_position(
        values in prop::collection::vec(FIELD, FIELDS),
        terminator in prop_oneof![Just(","), Just("\r\n"), Just("\r"), Just("\n")],
        chunk in 1usize..64,
    ) {
        let dump = format!("{}{}", values.join(","), terminator);

        let record = poll_script(chunked(&dump, chunk)).unwrap();
        prop_assert_eq!(record.len(), FIELDS);
        for (i, value) in values.iter().enumerate() {
            prop_assert_eq!(record.value_at(i), Some(value.as_str()));
        }
    }

    #[test]
    fn prop_truncated_dump_reports_received_count(
        values in prop::collection::vec(FIELD, FIELDS),
        cut in 0usize..FIELDS,
        tail in FIELD,
        closed in any::<bool>(),
        chunk in 1usize..64,
    ) {
        let mut dump: String = values[..cut].iter().map(|v| format!("{},", v)).collect();
        dump.push_str(&tail);
        let mut script = chunked(&dump, chunk);
        script.push(if closed { Step::Close } else { Step::Stall });

        match poll_script(script) {
            Err(ProtocolError::PartialRecord { received, expected, source }) => {
                prop_assert_eq!(received, cut);
                prop_assert_eq!(expected, FIELDS);
                if closed {
                    prop_assert!(matches!(source, DecodeError::StreamClosed));
                } else {
                    prop_assert!(matches!(source, DecodeError::FieldTimeout { .. }), "expected FieldTimeout, got {:?}", source);
                }
            }
            other => prop_assert!(false, "expected a partial record, got {:?}", other),
        }
    }
}
