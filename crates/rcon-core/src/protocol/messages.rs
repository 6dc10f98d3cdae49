//! All RCON-Over-IP protocol message types.
//!
//! Every message starts with the 5-byte header `[magic:4][type:1]`; the type
//! code selects one of the bodies below.  Multi-byte integers are big-endian
//! on the wire.  The two directions have independent type-code spaces, so the
//! server and client each decode against their own enum.

// ── Protocol constants ────────────────────────────────────────────────────────

/// Sentinel placed at the start of every message ("RCON" in ASCII).
pub const PROTOCOL_MAGIC: u32 = 0x5243_4F4E;

/// Total size of the common message header in bytes: magic (4) + type (1).
pub const HEADER_SIZE: usize = 5;

/// Length of the random challenge issued by the server.
pub const CHALLENGE_LEN: usize = 16;

/// Length of the client's authentication digest (SHA-256 output).
///
/// The digest is the SHA-256 of `challenge ‖ password`.  Both peers must use
/// the same algorithm; there is no negotiation and no compatibility with any
/// other digest length.
pub const DIGEST_LEN: usize = 32;

/// Fixed size of the NUL-terminated command buffer in an `RconCommand` body.
/// Commands longer than `COMMAND_BUFFER_LEN - 1` bytes are silently truncated
/// on encode.
pub const COMMAND_BUFFER_LEN: usize = 256;

/// Upper bound on the declared length of an `RconResult` text payload.
/// Larger declarations are treated as a protocol violation.
pub const MAX_RESULT_LEN: usize = 1 << 20;

// ── Message type codes ────────────────────────────────────────────────────────

/// Type codes for messages sent by the server to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerMessageType {
    /// Sent to a second connection attempt while a session is already live,
    /// immediately before that new connection is closed.
    InSession = 0,
    /// 16 random bytes the client must fold into its password digest.
    Challenge = 1,
    /// The digest matched; the session is authorized.
    Authorized = 2,
    /// The digest did not match; the connection is about to close.
    AuthFailed = 3,
    /// Result text for a previously sent command, matched by correlation ID.
    RconResult = 4,
    /// The client took too long to answer the challenge.
    AuthTimeout = 5,
}

impl TryFrom<u8> for ServerMessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(ServerMessageType::InSession),
            1 => Ok(ServerMessageType::Challenge),
            2 => Ok(ServerMessageType::Authorized),
            3 => Ok(ServerMessageType::AuthFailed),
            4 => Ok(ServerMessageType::RconResult),
            5 => Ok(ServerMessageType::AuthTimeout),
            _ => Err(()),
        }
    }
}

/// Type codes for messages sent by the client to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientMessageType {
    /// SHA-256 digest of `challenge ‖ password`.
    Digest = 0,
    /// A command to execute, with its client-chosen correlation ID.
    RconCommand = 1,
}

impl TryFrom<u8> for ClientMessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(ClientMessageType::Digest),
            1 => Ok(ClientMessageType::RconCommand),
            _ => Err(()),
        }
    }
}

// ── Typed messages ────────────────────────────────────────────────────────────

/// All valid server → client messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Empty body.  The receiving connection was rejected because another
    /// session already holds the server.
    InSession,
    /// The authentication challenge: 16 random bytes.
    Challenge([u8; CHALLENGE_LEN]),
    /// Empty body.  Authentication succeeded.
    Authorized,
    /// Empty body.  Authentication failed (wrong digest).
    AuthFailed,
    /// Command result.  On the wire: `command_id: u32`, `result_len: u32`,
    /// then `result_len` bytes of UTF-8 result text.
    RconResult { command_id: u32, result: String },
    /// Empty body.  The authentication window expired.
    AuthTimeout,
}

impl ServerMessage {
    /// Returns the wire type code for this message.
    pub fn message_type(&self) -> ServerMessageType {
        match self {
            ServerMessage::InSession => ServerMessageType::InSession,
            ServerMessage::Challenge(_) => ServerMessageType::Challenge,
            ServerMessage::Authorized => ServerMessageType::Authorized,
            ServerMessage::AuthFailed => ServerMessageType::AuthFailed,
            ServerMessage::RconResult { .. } => ServerMessageType::RconResult,
            ServerMessage::AuthTimeout => ServerMessageType::AuthTimeout,
        }
    }
}

/// All valid client → server messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// The answer to a challenge: SHA-256 of `challenge ‖ password`.
    Digest([u8; DIGEST_LEN]),
    /// A command to run.  On the wire: `command_id: u32` followed by a fixed
    /// 256-byte NUL-terminated buffer holding the command text.
    RconCommand { command_id: u32, command: String },
}

impl ClientMessage {
    /// Returns the wire type code for this message.
    pub fn message_type(&self) -> ClientMessageType {
        match self {
            ClientMessage::Digest(_) => ClientMessageType::Digest,
            ClientMessage::RconCommand { .. } => ClientMessageType::RconCommand,
        }
    }
}
