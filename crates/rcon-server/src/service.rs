//! Server network service.
//!
//! One tokio task owns the listener, the session socket, the auth timer, and
//! the [`ServerSession`] state machine.  Everything else talks to it through
//! channels: application calls arrive as [`ServerCommand`]s on an unbounded
//! sender, session events leave on a bounded receiver.  The channel pair is
//! the thread-marshaling boundary — no lock ever guards session state
//! because no second task can reach it.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::session::{ServerAction, ServerEvent, ServerSession, DEFAULT_AUTH_TIMEOUT};

/// Default listen port for the control service.
pub const DEFAULT_PORT: u16 = 25300;

const EVENT_CHANNEL_CAPACITY: usize = 128;
const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind control listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read local listener address")]
    LocalAddr(#[source] std::io::Error),
}

/// Runtime configuration for [`RconServer::start`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub password: String,
    pub auth_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            password: String::new(),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }
}

/// Marshaled application calls, executed on the service task.
#[derive(Debug)]
enum ServerCommand {
    SendResult { command_id: u32, result: String },
    Stop,
}

/// Handle to a running control server.  Cheap to clone; all methods are
/// non-blocking and safe to call from any task or thread.
#[derive(Debug, Clone)]
pub struct RconServer {
    cmd_tx: mpsc::UnboundedSender<ServerCommand>,
    local_addr: SocketAddr,
}

impl RconServer {
    /// Binds the listener and spawns the service task.  Returns the handle
    /// together with the event stream the application must drain.
    pub async fn start(
        config: ServerConfig,
    ) -> Result<(Self, mpsc::Receiver<ServerEvent>), ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        info!(%local_addr, "control server listening");
        tokio::spawn(run_service(listener, config, cmd_rx, event_tx));

        Ok((Self { cmd_tx, local_addr }, event_rx))
    }

    /// Address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Answers a previously reported [`ServerEvent::ClientCommand`].  Silently
    /// dropped if the session has since gone away.
    pub fn send_result(&self, command_id: u32, result: impl Into<String>) {
        let _ = self.cmd_tx.send(ServerCommand::SendResult {
            command_id,
            result: result.into(),
        });
    }

    /// Stops the service task.  The session socket and listener close; no
    /// farewell is sent to a connected client.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(ServerCommand::Stop);
    }
}

async fn run_service(
    listener: TcpListener,
    config: ServerConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<ServerCommand>,
    event_tx: mpsc::Sender<ServerEvent>,
) {
    let mut session = ServerSession::new(config.password.clone());
    let mut conn: Option<TcpStream> = None;
    let mut auth_deadline: Option<(u64, Instant)> = None;
    let mut read_buf = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            command = cmd_rx.recv() => {
                match command {
                    Some(ServerCommand::SendResult { command_id, result }) => {
                        let actions = session.send_result(command_id, &result);
                        apply_actions(actions, &mut conn, &mut None, &mut auth_deadline,
                            config.auth_timeout, &event_tx).await;
                    }
                    Some(ServerCommand::Stop) | None => {
                        info!("control server stopping");
                        break;
                    }
                }
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "inbound control connection");
                        let actions = session.on_connection_accepted(peer);
                        let mut fresh = Some(stream);
                        apply_actions(actions, &mut conn, &mut fresh, &mut auth_deadline,
                            config.auth_timeout, &event_tx).await;
                    }
                    Err(error) => warn!(%error, "accept failed"),
                }
            }

            read = async {
                conn.as_mut()
                    .expect("branch guarded by conn.is_some()")
                    .read(&mut read_buf)
                    .await
            }, if conn.is_some() => {
                match read {
                    Ok(0) | Err(_) => {
                        debug!("session connection closed");
                        conn = None;
                        let actions = session.on_connection_closed();
                        apply_actions(actions, &mut conn, &mut None, &mut auth_deadline,
                            config.auth_timeout, &event_tx).await;
                    }
                    Ok(n) => {
                        let actions = session.on_incoming_data(&read_buf[..n]);
                        apply_actions(actions, &mut conn, &mut None, &mut auth_deadline,
                            config.auth_timeout, &event_tx).await;
                    }
                }
            }

            _ = async {
                let (_, at) = auth_deadline.expect("branch guarded by is_some()");
                tokio::time::sleep_until(at).await;
            }, if auth_deadline.is_some() => {
                let (generation, _) = auth_deadline.take().expect("branch guarded by is_some()");
                debug!(generation, "authentication window elapsed");
                let actions = session.on_auth_timeout(generation);
                apply_actions(actions, &mut conn, &mut None, &mut auth_deadline,
                    config.auth_timeout, &event_tx).await;
            }
        }
    }

    if let Some(mut stream) = conn.take() {
        let _ = stream.shutdown().await;
    }
}

/// Interprets a batch of session actions against the real socket and timer.
async fn apply_actions(
    actions: Vec<ServerAction>,
    conn: &mut Option<TcpStream>,
    fresh: &mut Option<TcpStream>,
    auth_deadline: &mut Option<(u64, Instant)>,
    auth_timeout: Duration,
    event_tx: &mpsc::Sender<ServerEvent>,
) {
    for action in actions {
        match action {
            ServerAction::AdoptConnection => {
                *conn = fresh.take();
            }
            ServerAction::Send(bytes) => {
                if let Some(stream) = conn.as_mut() {
                    if let Err(error) = stream.write_all(&bytes).await {
                        // The next read on this socket observes the failure
                        // and tears the session down.
                        warn!(%error, "session write failed");
                    }
                }
            }
            ServerAction::RejectConnection(bytes) => {
                if let Some(mut stream) = fresh.take() {
                    let _ = stream.write_all(&bytes).await;
                    let _ = stream.shutdown().await;
                }
            }
            ServerAction::CloseSession => {
                if let Some(mut stream) = conn.take() {
                    let _ = stream.shutdown().await;
                }
            }
            ServerAction::StartAuthTimer { generation } => {
                *auth_deadline = Some((generation, Instant::now() + auth_timeout));
            }
            ServerAction::CancelAuthTimer => {
                *auth_deadline = None;
            }
            ServerAction::Notify(event) => {
                let _ = event_tx.send(event).await;
            }
        }
    }
}
