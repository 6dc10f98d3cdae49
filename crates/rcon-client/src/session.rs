//! Client session state machine.
//!
//! Sans-IO mirror of the server's session module: `ClientSession` owns no
//! socket and is driven entirely by the service task in [`crate::service`].
//! Inputs are marshaled application calls plus transport events; outputs are
//! [`ClientAction`]s.
//!
//! ```text
//! NotConnected ──connect──► Connecting ──socket up──► ChallengeWait
//!       ▲                                                  │ challenge
//!       │                                              DigestSent
//!       │                                                  │ authorized
//!       └── close / refusal / auth failure / bogus ◄── Authorized
//! ```
//!
//! Commands are accepted only while `Authorized`.  Each in-flight command is
//! tracked in a pending map keyed by its random nonzero correlation id, and
//! a result whose id is unknown is ignored — it belongs to a command from a
//! session that has since been torn down.

use std::collections::HashMap;

use rcon_core::auth;
use rcon_core::protocol::codec::encode_client_message;
use rcon_core::protocol::messages::{ClientMessage, ServerMessage, ServerMessageType};
use rcon_core::protocol::reassembler::Reassembler;

/// Connection and authentication progress, as one flat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    NotConnected,
    /// `connect` was issued; the TCP handshake is in flight.
    Connecting,
    /// Socket is up; waiting for the server's challenge (or refusal).
    ChallengeWait,
    /// Digest submitted; waiting for the verdict.
    DigestSent,
    Authorized,
}

/// Why a connect attempt or a session ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    Connected,
    /// `connect` while a session is already up or in progress.
    AlreadyConnected,
    /// The TCP handshake itself failed.
    ConnectFailed,
    Authorized,
    /// The server closed the connection.
    ServerClosed,
    /// The server already has a session with another client.
    ServerSessioned,
    AuthFailed,
    AuthTimeout,
    /// The server sent something that is not legal protocol.
    ProtocolViolation,
}

/// Events delivered to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Outcome of a `connect` call (transport level only).
    ConnectResult { ok: bool, reason: StatusReason },
    /// Session came up authorized, or went down and why.
    SessionStatus { ok: bool, reason: StatusReason },
    /// A command came back.  `command` is the original text for correlation.
    CommandResult {
        command_id: u32,
        command: String,
        result: String,
    },
}

/// Instructions for the network service, applied in order.
#[derive(Debug, PartialEq, Eq)]
pub enum ClientAction {
    /// Begin a TCP connect to this endpoint.
    Connect { host: String, port: u16 },
    /// Write these bytes to the socket.
    Send(Vec<u8>),
    /// Close the socket (and abandon any in-flight connect).
    Disconnect,
    /// Deliver an event to the application.
    Notify(ClientEvent),
}

pub struct ClientSession {
    state: ClientState,
    password: String,
    /// In-flight commands: correlation id → original command text.
    pending: HashMap<u32, String>,
    reassembler: Reassembler<ServerMessage>,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    pub fn new() -> Self {
        Self {
            state: ClientState::NotConnected,
            password: String::new(),
            pending: HashMap::new(),
            reassembler: Reassembler::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    fn allowed_types(&self) -> &'static [u8] {
        match self.state {
            ClientState::NotConnected | ClientState::Connecting => &[],
            ClientState::ChallengeWait => &[
                ServerMessageType::InSession as u8,
                ServerMessageType::Challenge as u8,
                ServerMessageType::AuthFailed as u8,
                ServerMessageType::AuthTimeout as u8,
            ],
            ClientState::DigestSent => &[
                ServerMessageType::InSession as u8,
                ServerMessageType::Authorized as u8,
                ServerMessageType::AuthFailed as u8,
                ServerMessageType::AuthTimeout as u8,
            ],
            ClientState::Authorized => &[
                ServerMessageType::InSession as u8,
                ServerMessageType::AuthFailed as u8,
                ServerMessageType::AuthTimeout as u8,
                ServerMessageType::RconResult as u8,
            ],
        }
    }

    fn clear(&mut self) {
        self.state = ClientState::NotConnected;
        self.password.clear();
        self.pending.clear();
        self.reassembler.reset();
    }

    /// Session ended for a server-side or protocol reason: close the socket
    /// and tell the application why.
    fn teardown(&mut self, reason: StatusReason) -> Vec<ClientAction> {
        self.clear();
        vec![
            ClientAction::Disconnect,
            ClientAction::Notify(ClientEvent::SessionStatus { ok: false, reason }),
        ]
    }

    /// Marshaled application call: open a session.
    pub fn connect(&mut self, host: &str, port: u16, password: &str) -> Vec<ClientAction> {
        if self.state != ClientState::NotConnected {
            return vec![ClientAction::Notify(ClientEvent::ConnectResult {
                ok: false,
                reason: StatusReason::AlreadyConnected,
            })];
        }
        self.password = password.to_string();
        self.state = ClientState::Connecting;
        vec![ClientAction::Connect {
            host: host.to_string(),
            port,
        }]
    }

    /// Outcome of the TCP handshake started by [`ClientAction::Connect`].
    pub fn on_connect_result(&mut self, ok: bool) -> Vec<ClientAction> {
        if self.state != ClientState::Connecting {
            // A late handshake result after an explicit disconnect.
            return Vec::new();
        }
        if ok {
            self.state = ClientState::ChallengeWait;
            vec![ClientAction::Notify(ClientEvent::ConnectResult {
                ok: true,
                reason: StatusReason::Connected,
            })]
        } else {
            self.clear();
            vec![ClientAction::Notify(ClientEvent::ConnectResult {
                ok: false,
                reason: StatusReason::ConnectFailed,
            })]
        }
    }

    /// Marshaled application call: close the session.  Deliberately silent —
    /// the application asked for this, it does not need to be told.
    pub fn disconnect(&mut self) -> Vec<ClientAction> {
        self.clear();
        vec![ClientAction::Disconnect]
    }

    /// Marshaled application call: submit a command.  Dropped unless the
    /// session is authorized.
    pub fn send_command(&mut self, command: &str) -> Vec<ClientAction> {
        if self.state != ClientState::Authorized {
            return Vec::new();
        }
        let command_id = auth::next_command_id(|id| self.pending.contains_key(&id));
        self.pending.insert(command_id, command.to_string());
        vec![ClientAction::Send(encode_client_message(
            &ClientMessage::RconCommand {
                command_id,
                command: command.to_string(),
            },
        ))]
    }

    /// The socket closed underneath us.
    pub fn on_connection_closed(&mut self) -> Vec<ClientAction> {
        if self.state == ClientState::NotConnected {
            return Vec::new();
        }
        self.teardown(StatusReason::ServerClosed)
    }

    /// Inbound bytes from the socket.
    pub fn on_incoming_data(&mut self, mut data: &[u8]) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        loop {
            let allowed = self.allowed_types();
            match self.reassembler.advance(data, allowed) {
                Ok((Some(message), rest)) => {
                    data = rest;
                    actions.extend(self.handle_message(message));
                    if self.state == ClientState::NotConnected {
                        break;
                    }
                }
                Ok((None, _)) => break,
                Err(_) => {
                    actions.extend(self.teardown(StatusReason::ProtocolViolation));
                    break;
                }
            }
        }
        actions
    }

    fn handle_message(&mut self, message: ServerMessage) -> Vec<ClientAction> {
        match message {
            ServerMessage::InSession => self.teardown(StatusReason::ServerSessioned),
            ServerMessage::AuthFailed => self.teardown(StatusReason::AuthFailed),
            ServerMessage::AuthTimeout => self.teardown(StatusReason::AuthTimeout),
            ServerMessage::Challenge(challenge) if self.state == ClientState::ChallengeWait => {
                let digest = auth::challenge_digest(&challenge, &self.password);
                self.state = ClientState::DigestSent;
                vec![ClientAction::Send(encode_client_message(
                    &ClientMessage::Digest(digest),
                ))]
            }
            ServerMessage::Authorized if self.state == ClientState::DigestSent => {
                self.state = ClientState::Authorized;
                vec![ClientAction::Notify(ClientEvent::SessionStatus {
                    ok: true,
                    reason: StatusReason::Authorized,
                })]
            }
            ServerMessage::RconResult { command_id, result }
                if self.state == ClientState::Authorized =>
            {
                match self.pending.remove(&command_id) {
                    Some(command) => vec![ClientAction::Notify(ClientEvent::CommandResult {
                        command_id,
                        command,
                        result,
                    })],
                    // Unknown id: a result for a command from a session that
                    // no longer exists.
                    None => Vec::new(),
                }
            }
            // Unreachable through the reassembler's legality set.
            _ => self.teardown(StatusReason::ProtocolViolation),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_core::auth::challenge_digest;
    use rcon_core::protocol::codec::encode_server_message;
    use rcon_core::protocol::messages::{ClientMessageType, CHALLENGE_LEN, HEADER_SIZE};
    use rcon_core::protocol::reassembler::Reassembler;

    const PASSWORD: &str = "hunter2";
    const CHALLENGE: [u8; CHALLENGE_LEN] = [0x3C; CHALLENGE_LEN];

    fn connect(session: &mut ClientSession) {
        let actions = session.connect("203.0.113.9", 25300, PASSWORD);
        assert_eq!(
            actions,
            vec![ClientAction::Connect {
                host: "203.0.113.9".to_string(),
                port: 25300,
            }]
        );
        let actions = session.on_connect_result(true);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::ConnectResult {
            ok: true,
            reason: StatusReason::Connected,
        })));
        assert_eq!(session.state(), ClientState::ChallengeWait);
    }

    fn authorize(session: &mut ClientSession) {
        connect(session);
        let frame = encode_server_message(&ServerMessage::Challenge(CHALLENGE));
        let actions = session.on_incoming_data(&frame);
        assert_eq!(session.state(), ClientState::DigestSent);
        assert!(matches!(&actions[0], ClientAction::Send(bytes)
            if bytes[4] == ClientMessageType::Digest as u8));

        let frame = encode_server_message(&ServerMessage::Authorized);
        let actions = session.on_incoming_data(&frame);
        assert_eq!(session.state(), ClientState::Authorized);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: true,
            reason: StatusReason::Authorized,
        })));
    }

    /// Decodes the single client message inside a `Send` action.
    fn sent_message(actions: &[ClientAction]) -> ClientMessage {
        for action in actions {
            if let ClientAction::Send(bytes) = action {
                let mut r = Reassembler::<ClientMessage>::new();
                let allowed = [
                    ClientMessageType::Digest as u8,
                    ClientMessageType::RconCommand as u8,
                ];
                let (msg, rest) = r.advance(bytes, &allowed).expect("well-formed frame");
                assert!(rest.is_empty());
                return msg.expect("one complete message");
            }
        }
        panic!("no Send action in {actions:?}");
    }

    #[test]
    fn test_connect_while_connected_is_refused_without_side_effects() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let actions = session.connect("203.0.113.9", 25300, PASSWORD);

        assert_eq!(
            actions,
            vec![ClientAction::Notify(ClientEvent::ConnectResult {
                ok: false,
                reason: StatusReason::AlreadyConnected,
            })]
        );
        assert_eq!(session.state(), ClientState::Authorized);
    }

    #[test]
    fn test_failed_tcp_connect_reports_and_resets() {
        let mut session = ClientSession::new();
        session.connect("203.0.113.9", 25300, PASSWORD);
        let actions = session.on_connect_result(false);

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::ConnectResult {
            ok: false,
            reason: StatusReason::ConnectFailed,
        })));
    }

    #[test]
    fn test_challenge_is_answered_with_the_password_digest() {
        let mut session = ClientSession::new();
        connect(&mut session);

        let frame = encode_server_message(&ServerMessage::Challenge(CHALLENGE));
        let actions = session.on_incoming_data(&frame);

        match sent_message(&actions) {
            ClientMessage::Digest(digest) => {
                assert_eq!(digest, challenge_digest(&CHALLENGE, PASSWORD));
            }
            other => panic!("expected a digest, got {other:?}"),
        }
    }

    #[test]
    fn test_in_session_refusal_tears_down_with_reason() {
        let mut session = ClientSession::new();
        connect(&mut session);

        let frame = encode_server_message(&ServerMessage::InSession);
        let actions = session.on_incoming_data(&frame);

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: false,
            reason: StatusReason::ServerSessioned,
        })));
    }

    #[test]
    fn test_auth_failed_tears_down_with_reason() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let frame = encode_server_message(&ServerMessage::AuthFailed);
        let actions = session.on_incoming_data(&frame);

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: false,
            reason: StatusReason::AuthFailed,
        })));
    }

    #[test]
    fn test_auth_timeout_tears_down_with_reason() {
        let mut session = ClientSession::new();
        connect(&mut session);

        let frame = encode_server_message(&ServerMessage::AuthTimeout);
        let actions = session.on_incoming_data(&frame);

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: false,
            reason: StatusReason::AuthTimeout,
        })));
    }

    #[test]
    fn test_server_close_tears_down_with_reason() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let actions = session.on_connection_closed();

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: false,
            reason: StatusReason::ServerClosed,
        })));
    }

    #[test]
    fn test_explicit_disconnect_is_silent() {
        let mut session = ClientSession::new();
        authorize(&mut session);
        session.send_command("status");

        let actions = session.disconnect();

        assert_eq!(actions, vec![ClientAction::Disconnect]);
        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn test_command_before_authorization_is_dropped() {
        let mut session = ClientSession::new();
        assert!(session.send_command("status").is_empty());

        connect(&mut session);
        assert!(session.send_command("status").is_empty());
    }

    #[test]
    fn test_commands_get_unique_nonzero_ids() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let actions = session.send_command("status");
            match sent_message(&actions) {
                ClientMessage::RconCommand { command_id, .. } => {
                    assert_ne!(command_id, 0);
                    assert!(seen.insert(command_id), "duplicate id {command_id}");
                }
                other => panic!("expected a command, got {other:?}"),
            }
        }
        assert_eq!(session.pending.len(), 64);
    }

    #[test]
    fn test_result_is_matched_to_its_command() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let actions = session.send_command("status");
        let command_id = match sent_message(&actions) {
            ClientMessage::RconCommand { command_id, .. } => command_id,
            other => panic!("expected a command, got {other:?}"),
        };

        let frame = encode_server_message(&ServerMessage::RconResult {
            command_id,
            result: "all good".to_string(),
        });
        let actions = session.on_incoming_data(&frame);

        assert_eq!(
            actions,
            vec![ClientAction::Notify(ClientEvent::CommandResult {
                command_id,
                command: "status".to_string(),
                result: "all good".to_string(),
            })]
        );
        assert!(session.pending.is_empty());
    }

    #[test]
    fn test_result_with_unknown_id_is_ignored() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let frame = encode_server_message(&ServerMessage::RconResult {
            command_id: 0xDEAD,
            result: "orphan".to_string(),
        });
        let actions = session.on_incoming_data(&frame);

        assert!(actions.is_empty());
        assert_eq!(session.state(), ClientState::Authorized);
    }

    #[test]
    fn test_result_before_authorization_is_a_protocol_violation() {
        let mut session = ClientSession::new();
        connect(&mut session);

        let frame = encode_server_message(&ServerMessage::RconResult {
            command_id: 1,
            result: "too early".to_string(),
        });
        let actions = session.on_incoming_data(&frame);

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: false,
            reason: StatusReason::ProtocolViolation,
        })));
    }

    #[test]
    fn test_bad_magic_is_a_protocol_violation() {
        let mut session = ClientSession::new();
        connect(&mut session);

        let actions = session.on_incoming_data(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]);

        assert_eq!(session.state(), ClientState::NotConnected);
        assert!(actions.contains(&ClientAction::Notify(ClientEvent::SessionStatus {
            ok: false,
            reason: StatusReason::ProtocolViolation,
        })));
    }

    #[test]
    fn test_late_connect_result_after_disconnect_is_ignored() {
        let mut session = ClientSession::new();
        session.connect("203.0.113.9", 25300, PASSWORD);
        session.disconnect();

        assert!(session.on_connect_result(true).is_empty());
        assert_eq!(session.state(), ClientState::NotConnected);
    }

    #[test]
    fn test_result_split_across_chunks() {
        let mut session = ClientSession::new();
        authorize(&mut session);

        let actions = session.send_command("status");
        let command_id = match sent_message(&actions) {
            ClientMessage::RconCommand { command_id, .. } => command_id,
            other => panic!("expected a command, got {other:?}"),
        };

        let frame = encode_server_message(&ServerMessage::RconResult {
            command_id,
            result: "split right down the middle".to_string(),
        });
        let (a, b) = frame.split_at(frame.len() / 2);
        assert!(session.on_incoming_data(a).is_empty());
        let actions = session.on_incoming_data(b);

        assert!(matches!(
            &actions[0],
            ClientAction::Notify(ClientEvent::CommandResult { .. })
        ));
    }

    #[test]
    fn test_challenge_frame_layout() {
        // The challenge occupies the 16 bytes after the header.
        let frame = encode_server_message(&ServerMessage::Challenge(CHALLENGE));
        assert_eq!(&frame[HEADER_SIZE..], &CHALLENGE);
    }
}
