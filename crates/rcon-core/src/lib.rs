//! # rcon-core
//!
//! Shared library for RCON-Over-IP containing the wire protocol, the stream
//! reassembler, and the challenge-response authentication primitives.
//!
//! This crate is used by both the server and client applications.  It has no
//! dependency on sockets, timers, or any async runtime — everything here is
//! a pure function of its inputs, which is what makes the session state
//! machines in the sibling crates directly testable.
//!
//! The protocol itself is small: one authenticated client drives a remote
//! process by sending command strings and receiving result strings over a
//! TCP stream.  The password is protected by a challenge digest
//! (`SHA-256(challenge ‖ password)`); command/result payloads travel in the
//! clear.

pub mod auth;
pub mod protocol;

pub use protocol::codec::{encode_client_message, encode_server_message, ProtocolError};
pub use protocol::messages::{
    ClientMessage, ClientMessageType, ServerMessage, ServerMessageType, CHALLENGE_LEN,
    COMMAND_BUFFER_LEN, DIGEST_LEN, HEADER_SIZE, MAX_RESULT_LEN, PROTOCOL_MAGIC,
};
pub use protocol::reassembler::{BodyPlan, Reassembler, WireMessage};
