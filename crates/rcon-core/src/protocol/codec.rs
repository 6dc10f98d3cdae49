//! Binary codec for encoding and decoding RCON-Over-IP protocol messages.
//!
//! Wire format:
//! ```text
//! [magic:4][type:1][body:N]
//! ```
//! All multi-byte integers are big-endian.  Body layouts are fixed per type,
//! except `RconResult`, whose text payload length is declared by a `u32`
//! inside the body itself (see [`Reassembler`](super::reassembler) for how
//! that is read in two phases).
//!
//! Encoding cannot fail: every message has a total byte representation.
//! Decoding validates lengths and UTF-8 and reports [`ProtocolError`]; any
//! decode failure is terminal for the session that encountered it.

use thiserror::Error;

use crate::protocol::messages::{
    ClientMessage, ClientMessageType, ServerMessage, ServerMessageType, CHALLENGE_LEN,
    COMMAND_BUFFER_LEN, DIGEST_LEN, MAX_RESULT_LEN, PROTOCOL_MAGIC,
};
use crate::protocol::reassembler::{BodyPlan, WireMessage};

/// Errors that can occur while decoding inbound bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The header's magic field did not match [`PROTOCOL_MAGIC`].
    #[error("bad magic: 0x{0:08X}")]
    BadMagic(u32),

    /// The type byte is not defined for this direction at all.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The type byte is defined but not legal in the current session state.
    #[error("message type 0x{0:02X} not legal in the current session state")]
    UnexpectedMessageType(u8),

    /// The body could not be parsed (wrong size, invalid UTF-8, etc.).
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The declared result length exceeds [`MAX_RESULT_LEN`].
    #[error("declared result length {declared} exceeds the {max}-byte limit")]
    OversizedBody { declared: usize, max: usize },
}

// ── Encoding ──────────────────────────────────────────────────────────────────

fn header(msg_type: u8, body_capacity: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 1 + body_capacity);
    buf.extend_from_slice(&PROTOCOL_MAGIC.to_be_bytes());
    buf.push(msg_type);
    buf
}

/// Encodes a server → client message, header included.
pub fn encode_server_message(msg: &ServerMessage) -> Vec<u8> {
    match msg {
        ServerMessage::InSession
        | ServerMessage::Authorized
        | ServerMessage::AuthFailed
        | ServerMessage::AuthTimeout => header(msg.message_type() as u8, 0),
        ServerMessage::Challenge(bytes) => {
            let mut buf = header(ServerMessageType::Challenge as u8, CHALLENGE_LEN);
            buf.extend_from_slice(bytes);
            buf
        }
        ServerMessage::RconResult { command_id, result } => {
            let text = result.as_bytes();
            let mut buf = header(ServerMessageType::RconResult as u8, 8 + text.len());
            buf.extend_from_slice(&command_id.to_be_bytes());
            buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
            buf.extend_from_slice(text);
            buf
        }
    }
}

/// Encodes a client → server message, header included.
///
/// `RconCommand` text is copied into a fixed 256-byte NUL-terminated buffer;
/// anything beyond 255 bytes is silently truncated.
pub fn encode_client_message(msg: &ClientMessage) -> Vec<u8> {
    match msg {
        ClientMessage::Digest(digest) => {
            let mut buf = header(ClientMessageType::Digest as u8, DIGEST_LEN);
            buf.extend_from_slice(digest);
            buf
        }
        ClientMessage::RconCommand {
            command_id,
            command,
        } => {
            let mut buf = header(ClientMessageType::RconCommand as u8, 4 + COMMAND_BUFFER_LEN);
            buf.extend_from_slice(&command_id.to_be_bytes());
            let text = command.as_bytes();
            let len = text.len().min(COMMAND_BUFFER_LEN - 1);
            let mut field = [0u8; COMMAND_BUFFER_LEN];
            field[..len].copy_from_slice(&text[..len]);
            buf.extend_from_slice(&field);
            buf
        }
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn read_u32(body: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    body.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes(b.try_into().expect("4-byte slice")))
        .ok_or_else(|| {
            ProtocolError::MalformedBody(format!(
                "need 4 bytes at offset {offset}, body is {} bytes",
                body.len()
            ))
        })
}

/// Extracts the declared text length from the fixed prefix of an `RconResult`
/// body and bounds it against [`MAX_RESULT_LEN`].
fn result_text_len(prefix: &[u8]) -> Result<usize, ProtocolError> {
    let declared = read_u32(prefix, 4)? as usize;
    if declared > MAX_RESULT_LEN {
        return Err(ProtocolError::OversizedBody {
            declared,
            max: MAX_RESULT_LEN,
        });
    }
    Ok(declared)
}

fn decode_server_body(msg_type: ServerMessageType, body: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match msg_type {
        ServerMessageType::InSession => Ok(ServerMessage::InSession),
        ServerMessageType::Authorized => Ok(ServerMessage::Authorized),
        ServerMessageType::AuthFailed => Ok(ServerMessage::AuthFailed),
        ServerMessageType::AuthTimeout => Ok(ServerMessage::AuthTimeout),
        ServerMessageType::Challenge => {
            let bytes: [u8; CHALLENGE_LEN] = body.try_into().map_err(|_| {
                ProtocolError::MalformedBody(format!(
                    "challenge body must be {CHALLENGE_LEN} bytes, got {}",
                    body.len()
                ))
            })?;
            Ok(ServerMessage::Challenge(bytes))
        }
        ServerMessageType::RconResult => {
            if body.len() < 8 {
                return Err(ProtocolError::MalformedBody(format!(
                    "result body must hold at least 8 bytes, got {}",
                    body.len()
                )));
            }
            let command_id = read_u32(body, 0)?;
            let declared = result_text_len(&body[..8])?;
            let text = &body[8..];
            if text.len() != declared {
                return Err(ProtocolError::MalformedBody(format!(
                    "result body holds {} bytes but declared {declared}",
                    text.len()
                )));
            }
            let result = std::str::from_utf8(text)
                .map_err(|e| ProtocolError::MalformedBody(format!("result is not UTF-8: {e}")))?
                .to_string();
            Ok(ServerMessage::RconResult { command_id, result })
        }
    }
}

fn decode_client_body(msg_type: ClientMessageType, body: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match msg_type {
        ClientMessageType::Digest => {
            let digest: [u8; DIGEST_LEN] = body.try_into().map_err(|_| {
                ProtocolError::MalformedBody(format!(
                    "digest body must be {DIGEST_LEN} bytes, got {}",
                    body.len()
                ))
            })?;
            Ok(ClientMessage::Digest(digest))
        }
        ClientMessageType::RconCommand => {
            if body.len() != 4 + COMMAND_BUFFER_LEN {
                return Err(ProtocolError::MalformedBody(format!(
                    "command body must be {} bytes, got {}",
                    4 + COMMAND_BUFFER_LEN,
                    body.len()
                )));
            }
            let command_id = read_u32(body, 0)?;
            let field = &body[4..];
            let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
            let command = std::str::from_utf8(&field[..end])
                .map_err(|e| ProtocolError::MalformedBody(format!("command is not UTF-8: {e}")))?
                .to_string();
            Ok(ClientMessage::RconCommand {
                command_id,
                command,
            })
        }
    }
}

// ── Reassembler integration ───────────────────────────────────────────────────

impl WireMessage for ServerMessage {
    fn body_plan(msg_type: u8) -> Option<BodyPlan> {
        let t = ServerMessageType::try_from(msg_type).ok()?;
        Some(match t {
            ServerMessageType::InSession
            | ServerMessageType::Authorized
            | ServerMessageType::AuthFailed
            | ServerMessageType::AuthTimeout => BodyPlan::Fixed(0),
            ServerMessageType::Challenge => BodyPlan::Fixed(CHALLENGE_LEN),
            // command_id + result_len first, then result_len bytes of text.
            ServerMessageType::RconResult => BodyPlan::Prefixed {
                prefix: 8,
                remaining: result_text_len,
            },
        })
    }

    fn decode_body(msg_type: u8, body: &[u8]) -> Result<Self, ProtocolError> {
        let t = ServerMessageType::try_from(msg_type)
            .map_err(|_| ProtocolError::UnknownMessageType(msg_type))?;
        decode_server_body(t, body)
    }
}

impl WireMessage for ClientMessage {
    fn body_plan(msg_type: u8) -> Option<BodyPlan> {
        let t = ClientMessageType::try_from(msg_type).ok()?;
        Some(match t {
            ClientMessageType::Digest => BodyPlan::Fixed(DIGEST_LEN),
            ClientMessageType::RconCommand => BodyPlan::Fixed(4 + COMMAND_BUFFER_LEN),
        })
    }

    fn decode_body(msg_type: u8, body: &[u8]) -> Result<Self, ProtocolError> {
        let t = ClientMessageType::try_from(msg_type)
            .map_err(|_| ProtocolError::UnknownMessageType(msg_type))?;
        decode_client_body(t, body)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
