//! Protocol module containing message types, the binary codec, and the
//! stream reassembler.

pub mod codec;
pub mod messages;
pub mod reassembler;

pub use codec::{encode_client_message, encode_server_message, ProtocolError};
pub use messages::*;
pub use reassembler::{BodyPlan, Reassembler, WireMessage};
