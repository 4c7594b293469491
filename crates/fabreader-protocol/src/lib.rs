//! Wire schema of the reader session.
//!
//! Every frame is a JSON text message with a `type` discriminator and a
//! `payload`:
//!
//! ```text
//! inbound   {"type":"command","payload":{"command":"enroll"|"authenticate","uid":"<hex>",...}}
//! outbound  {"type":"status","payload":{"uid":"<hex>"|null}}
//! outbound  {"type":"command_result","payload":{"uid","success","message","logs":[..]}}
//! outbound  {"type":"log","payload":"<string>"}
//! ```
//!
//! Decoding keeps the command `uid` whenever it can be recovered, so a
//! malformed command can still be answered with an error result.

pub mod error;
pub mod inbound;
pub mod outbound;

pub use error::DecodeError;
pub use inbound::{CommandEnvelope, CommandKind, decode};
pub use outbound::{CommandResultPayload, Outbound, StatusPayload};
