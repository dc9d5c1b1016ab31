//! Home Controller Telnet Protocol
//!
//! This crate talks to the home-automation controller over its telnet-style
//! text interface. Every poll or command runs in a short-lived session that
//! is opened, used once and closed again.
//!
//! # Protocol Overview
//!
//! - **Handshake**: after connecting the client sends `n`; the controller
//!   answers with the literal `CONNECT`
//! - **Status dump**: `@` returns a fixed number of comma-terminated ASCII
//!   fields in strict positional order (see [`StatusSchema`])
//! - **Temperature set**: `I`, wait for `:`, send `<value>\r`, wait for the
//!   value echoed with two decimals
//! - **Garage door**: `3\r`, wait for a reply containing `door`
//!
//! There is no framing or checksum. Every read is bounded by its own timeout
//! and optionally by a budget for the whole cycle.
//!
//! # Example
//!
//! ```rust,ignore
//! use homectl_protocol::{run_cycle, ProtocolTimeouts, StatusPoller, TcpConnector};
//!
//! let poller = StatusPoller::default();
//! let record = run_cycle(&TcpConnector, "192.168.1.230", &ProtocolTimeouts::default(), |session| {
//!     poller.poll(session)
//! })?;
//! println!("door: {:?}", record.door_state());
//! ```

mod codec;
mod commands;
mod decoder;
mod door;
mod error;
mod issuer;
mod poller;
#[cfg(test)]
mod props;
mod responses;
mod schema;
mod session;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use codec::*;
pub use commands::*;
pub use decoder::*;
pub use door::*;
pub use error::*;
pub use issuer::*;
pub use poller::*;
pub use responses::*;
pub use schema::*;
pub use session::*;
pub use transport::*;
