//! Stream reassembler: turns arbitrarily chunked inbound bytes into complete,
//! validated protocol messages.
//!
//! # Why a state machine? (for beginners)
//!
//! TCP delivers a byte *stream*, not messages.  A single `read` may return
//! half a header, three messages at once, or a message split anywhere in the
//! middle.  The reassembler buffers bytes across reads and tracks how many
//! more are required to finish the current header or body, so the session
//! layer only ever sees whole messages.
//!
//! The same machine runs on both peers; only the [`WireMessage`] type
//! parameter differs (the server assembles `ClientMessage`s and vice versa).
//!
//! # Two-phase bodies
//!
//! Most bodies have a size known from the type byte alone.  `RconResult`
//! does not: its text length is declared by a `u32` *inside* the body.
//! [`BodyPlan::Prefixed`] models this as a resumable continuation — read a
//! fixed prefix, compute the remainder from it, keep reading — so the state
//! machine stays closed under future variable-length message types.
//!
//! # Legality checks
//!
//! Which message types are acceptable depends on the owning session's state
//! (a `Digest` is meaningless once authorized, for example).  The caller
//! passes the currently legal type bytes to [`Reassembler::advance`]; a
//! wrong magic, an unknown type, or a type outside that set is an error, and
//! every error here means the caller must reset the whole session.

use std::marker::PhantomData;

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::{HEADER_SIZE, PROTOCOL_MAGIC};

/// How the body of one message type is laid out after the header.
pub enum BodyPlan {
    /// Exactly this many body bytes.
    Fixed(usize),
    /// `prefix` bytes first; `remaining` then inspects them and returns how
    /// many further bytes complete the body.
    Prefixed {
        prefix: usize,
        remaining: fn(&[u8]) -> Result<usize, ProtocolError>,
    },
}

/// One direction of the wire protocol, as seen by the receiving peer.
pub trait WireMessage: Sized {
    /// Body layout for a type byte, or `None` if the byte is not a message
    /// type in this direction at all.
    fn body_plan(msg_type: u8) -> Option<BodyPlan>;

    /// Decodes a complete body (for `Prefixed` plans: prefix and tail
    /// concatenated) into a typed message.
    fn decode_body(msg_type: u8, body: &[u8]) -> Result<Self, ProtocolError>;
}

enum Phase {
    /// Accumulating the 5-byte header.
    Head,
    /// Accumulating `need` body bytes for `msg_type`.  `chain` is pending
    /// when a `Prefixed` plan's length prefix has not been inspected yet.
    Body {
        msg_type: u8,
        need: usize,
        chain: Option<fn(&[u8]) -> Result<usize, ProtocolError>>,
    },
}

/// Incremental message reassembler, one per session.
pub struct Reassembler<M: WireMessage> {
    phase: Phase,
    buf: Vec<u8>,
    _direction: PhantomData<M>,
}

impl<M: WireMessage> Reassembler<M> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Head,
            buf: Vec::with_capacity(HEADER_SIZE),
            _direction: PhantomData,
        }
    }

    /// Discards any partially assembled message.  Called on session reset.
    pub fn reset(&mut self) {
        self.phase = Phase::Head;
        self.buf.clear();
    }

    /// Consumes bytes from `input` until either one complete message is
    /// assembled (returned together with the unconsumed remainder) or the
    /// input is exhausted mid-message (`(None, &[])`).
    ///
    /// Returning after each message lets the caller re-derive the legal type
    /// set before the next one — the session state may have just changed.
    ///
    /// # Errors
    ///
    /// [`ProtocolError`] on bad magic, unknown type, a type outside
    /// `allowed`, or a malformed body.  The reassembler is left in an
    /// unspecified state afterwards; callers must [`reset`](Self::reset) (or
    /// drop) it as part of tearing the session down.
    pub fn advance<'a>(
        &mut self,
        mut input: &'a [u8],
        allowed: &[u8],
    ) -> Result<(Option<M>, &'a [u8]), ProtocolError> {
        loop {
            match &mut self.phase {
                Phase::Head => {
                    let take = (HEADER_SIZE - self.buf.len()).min(input.len());
                    self.buf.extend_from_slice(&input[..take]);
                    input = &input[take..];
                    if self.buf.len() < HEADER_SIZE {
                        return Ok((None, input));
                    }

                    let magic = u32::from_be_bytes(self.buf[0..4].try_into().expect("4 bytes"));
                    if magic != PROTOCOL_MAGIC {
                        return Err(ProtocolError::BadMagic(magic));
                    }
                    let msg_type = self.buf[4];
                    let plan = M::body_plan(msg_type)
                        .ok_or(ProtocolError::UnknownMessageType(msg_type))?;
                    if !allowed.contains(&msg_type) {
                        return Err(ProtocolError::UnexpectedMessageType(msg_type));
                    }

                    self.buf.clear();
                    match plan {
                        BodyPlan::Fixed(0) => {
                            let msg = M::decode_body(msg_type, &[])?;
                            return Ok((Some(msg), input));
                        }
                        BodyPlan::Fixed(need) => {
                            self.phase = Phase::Body {
                                msg_type,
                                need,
                                chain: None,
                            };
                        }
                        BodyPlan::Prefixed { prefix, remaining } => {
                            self.phase = Phase::Body {
                                msg_type,
                                need: prefix,
                                chain: Some(remaining),
                            };
                        }
                    }
                }
                Phase::Body {
                    msg_type,
                    need,
                    chain,
                } => {
                    let take = (*need - self.buf.len()).min(input.len());
                    self.buf.extend_from_slice(&input[..take]);
                    input = &input[take..];
                    if self.buf.len() < *need {
                        return Ok((None, input));
                    }

                    if let Some(remaining) = chain.take() {
                        let tail = remaining(&self.buf)?;
                        if tail > 0 {
                            *need += tail;
                            continue;
                        }
                    }

                    let msg_type = *msg_type;
                    let msg = M::decode_body(msg_type, &self.buf)?;
                    self.buf.clear();
                    self.phase = Phase::Head;
                    return Ok((Some(msg), input));
                }
            }
        }
    }
}

impl<M: WireMessage> Default for Reassembler<M> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
