//! Server session state machine.
//!
//! `ServerSession` is sans-IO: it owns no socket and no timer.  Inputs are
//! transport events and marshaled application calls; outputs are
//! [`ServerAction`]s that the network service in [`crate::service`]
//! interprets against the real socket, timer, and event channel.  That split
//! keeps every state transition directly testable and guarantees only one
//! task ever mutates session state — the session type is simply moved into
//! the service task and never shared.
//!
//! State machine:
//!
//! ```text
//! Unsessioned ──accept──► ChallengeSent ──good digest──► Authorized
//!      ▲                        │                            │
//!      └── close / bad digest / timeout / bogus message ─────┘
//! ```
//!
//! At most one session socket is held at a time.  A second inbound
//! connection is answered with `InSession` and closed without touching the
//! live session.

use std::net::SocketAddr;
use std::time::Duration;

use rcon_core::auth;
use rcon_core::protocol::codec::encode_server_message;
use rcon_core::protocol::messages::{
    ClientMessage, ClientMessageType, ServerMessage, CHALLENGE_LEN,
};
use rcon_core::protocol::reassembler::Reassembler;

/// Default window a client has to answer the challenge.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Authentication progress of the (single) server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session socket held.
    Unsessioned,
    /// A connection was adopted and a challenge sent; waiting for the digest.
    ChallengeSent,
    /// The digest matched; commands are accepted.
    Authorized,
}

/// Events delivered to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client answered the challenge correctly.
    ClientAuthorized { peer: SocketAddr },
    /// The authorized client's connection closed.
    AuthorizedClientLeft { peer: SocketAddr },
    /// The authorized client asked to run a command.  The application
    /// executes it out-of-band and answers with
    /// [`RconServer::send_result`](crate::service::RconServer::send_result).
    ClientCommand { command_id: u32, command: String },
}

/// Instructions for the network service.  Emitted in order; the service
/// applies them sequentially.
#[derive(Debug, PartialEq, Eq)]
pub enum ServerAction {
    /// Adopt the connection just handed to `on_connection_accepted` as the
    /// session socket.
    AdoptConnection,
    /// Write these bytes to the session socket.
    Send(Vec<u8>),
    /// Write these bytes to the connection just handed to
    /// `on_connection_accepted`, then close it.  The live session socket is
    /// not touched.
    RejectConnection(Vec<u8>),
    /// Close and drop the session socket.
    CloseSession,
    /// Arm the authentication timeout for this timer generation.
    StartAuthTimer { generation: u64 },
    /// Disarm any pending authentication timeout.
    CancelAuthTimer,
    /// Deliver an event to the application.
    Notify(ServerEvent),
}

/// Per-server session state.  Owned and mutated exclusively by the network
/// service task.
pub struct ServerSession {
    state: SessionState,
    password: String,
    challenge: [u8; CHALLENGE_LEN],
    peer: Option<SocketAddr>,
    /// Bumped on every challenge issue and every reset, so a timer armed for
    /// an earlier session can never fire into a newer one.
    timer_generation: u64,
    reassembler: Reassembler<ClientMessage>,
}

impl ServerSession {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            state: SessionState::Unsessioned,
            password: password.into(),
            challenge: [0u8; CHALLENGE_LEN],
            peer: None,
            timer_generation: 0,
            reassembler: Reassembler::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Message types legal for the current state.  Everything else is bogus
    /// and resets the session.
    fn allowed_types(&self) -> &'static [u8] {
        match self.state {
            SessionState::Unsessioned => &[],
            SessionState::ChallengeSent => &[ClientMessageType::Digest as u8],
            SessionState::Authorized => &[ClientMessageType::RconCommand as u8],
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Unsessioned;
        self.peer = None;
        self.challenge = [0u8; CHALLENGE_LEN];
        self.timer_generation += 1;
        self.reassembler.reset();
    }

    /// A bogus message (bad magic, illegal type, malformed body) tears the
    /// session down silently: no authorization events, just a close.
    fn bogus_reset(&mut self) -> Vec<ServerAction> {
        self.reset();
        vec![ServerAction::CancelAuthTimer, ServerAction::CloseSession]
    }

    /// The transport accepted an inbound connection.
    ///
    /// If no session is live, adopt it, issue a fresh challenge, and arm the
    /// auth timer.  Otherwise reject the newcomer with `InSession` — the
    /// existing session must be completely unaffected.
    pub fn on_connection_accepted(&mut self, peer: SocketAddr) -> Vec<ServerAction> {
        if self.state != SessionState::Unsessioned {
            return vec![ServerAction::RejectConnection(encode_server_message(
                &ServerMessage::InSession,
            ))];
        }

        self.challenge = auth::generate_challenge();
        self.timer_generation += 1;
        self.state = SessionState::ChallengeSent;
        self.peer = Some(peer);

        vec![
            ServerAction::AdoptConnection,
            ServerAction::Send(encode_server_message(&ServerMessage::Challenge(
                self.challenge,
            ))),
            ServerAction::StartAuthTimer {
                generation: self.timer_generation,
            },
        ]
    }

    /// The session socket closed (gracefully or not).
    pub fn on_connection_closed(&mut self) -> Vec<ServerAction> {
        let mut actions = vec![ServerAction::CancelAuthTimer];
        if self.state == SessionState::Authorized {
            if let Some(peer) = self.peer {
                actions.push(ServerAction::Notify(ServerEvent::AuthorizedClientLeft {
                    peer,
                }));
            }
        }
        self.reset();
        actions
    }

    /// The authentication timer fired.  The generation check makes a stale
    /// timer from an earlier, already-reset session a no-op.
    pub fn on_auth_timeout(&mut self, generation: u64) -> Vec<ServerAction> {
        if self.state != SessionState::ChallengeSent || generation != self.timer_generation {
            return Vec::new();
        }
        self.reset();
        vec![
            ServerAction::Send(encode_server_message(&ServerMessage::AuthTimeout)),
            ServerAction::CloseSession,
        ]
    }

    /// Inbound bytes from the session socket.  Drains every complete message
    /// in the chunk, re-deriving the legal type set between messages.
    pub fn on_incoming_data(&mut self, mut data: &[u8]) -> Vec<ServerAction> {
        let mut actions = Vec::new();
        loop {
            let allowed = self.allowed_types();
            match self.reassembler.advance(data, allowed) {
                Ok((Some(message), rest)) => {
                    data = rest;
                    actions.extend(self.handle_message(message));
                    // A handler that reset the session closed the socket;
                    // anything left in the chunk is dead bytes.
                    if self.state == SessionState::Unsessioned {
                        break;
                    }
                }
                Ok((None, _)) => break,
                Err(_) => {
                    actions.extend(self.bogus_reset());
                    break;
                }
            }
        }
        actions
    }

    fn handle_message(&mut self, message: ClientMessage) -> Vec<ServerAction> {
        match message {
            ClientMessage::Digest(digest) if self.state == SessionState::ChallengeSent => {
                let expected = auth::challenge_digest(&self.challenge, &self.password);
                if digest == expected {
                    self.state = SessionState::Authorized;
                    self.timer_generation += 1;
                    let mut actions = vec![
                        ServerAction::CancelAuthTimer,
                        ServerAction::Send(encode_server_message(&ServerMessage::Authorized)),
                    ];
                    if let Some(peer) = self.peer {
                        actions.push(ServerAction::Notify(ServerEvent::ClientAuthorized { peer }));
                    }
                    actions
                } else {
                    self.reset();
                    vec![
                        ServerAction::CancelAuthTimer,
                        ServerAction::Send(encode_server_message(&ServerMessage::AuthFailed)),
                        ServerAction::CloseSession,
                    ]
                }
            }
            ClientMessage::RconCommand {
                command_id,
                command,
            } if self.state == SessionState::Authorized => {
                vec![ServerAction::Notify(ServerEvent::ClientCommand {
                    command_id,
                    command,
                })]
            }
            // The reassembler's legality set makes these unreachable, but a
            // state change between assembly and handling must still be bogus.
            _ => self.bogus_reset(),
        }
    }

    /// Marshaled application call: answer a previously reported command.
    /// A no-op unless the session is authorized (the command's session may
    /// have died since it was reported).
    pub fn send_result(&mut self, command_id: u32, result: &str) -> Vec<ServerAction> {
        if self.state != SessionState::Authorized {
            return Vec::new();
        }
        vec![ServerAction::Send(encode_server_message(
            &ServerMessage::RconResult {
                command_id,
                result: result.to_string(),
            },
        ))]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
