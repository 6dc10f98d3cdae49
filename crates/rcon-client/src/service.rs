//! Client network service.
//!
//! One tokio task owns the socket, the in-flight connect future, and the
//! [`ClientSession`] state machine.  The [`RconClient`] handle marshals
//! application calls onto that task over a channel and never touches
//! session state itself, so `connect`, `disconnect`, and `send_command` are
//! safe to call from anywhere.

use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::session::{ClientAction, ClientEvent, ClientSession};

const EVENT_CHANNEL_CAPACITY: usize = 128;
const READ_BUFFER_SIZE: usize = 4096;

type ConnectFuture = Pin<Box<dyn Future<Output = std::io::Result<TcpStream>> + Send>>;

/// Marshaled application calls, executed on the service task.
#[derive(Debug)]
enum ClientCommand {
    Connect {
        host: String,
        port: u16,
        password: String,
    },
    Disconnect,
    SendCommand(String),
}

/// Handle to a running control client.  Cheap to clone; all methods are
/// non-blocking, with outcomes reported on the event stream.
#[derive(Debug, Clone)]
pub struct RconClient {
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
}

impl RconClient {
    /// Spawns the service task.  Returns the handle together with the event
    /// stream the application must drain.
    pub fn start() -> (Self, mpsc::Receiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(run_service(cmd_rx, event_tx));
        (Self { cmd_tx }, event_rx)
    }

    /// Opens a session.  Answered by [`ClientEvent::ConnectResult`], then
    /// [`ClientEvent::SessionStatus`] once authentication settles.
    pub fn connect(&self, host: impl Into<String>, port: u16, password: impl Into<String>) {
        let _ = self.cmd_tx.send(ClientCommand::Connect {
            host: host.into(),
            port,
            password: password.into(),
        });
    }

    /// Closes the session.  No event is emitted for an explicit disconnect.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect);
    }

    /// Submits a command.  Answered by [`ClientEvent::CommandResult`];
    /// dropped if the session is not authorized.
    pub fn send_command(&self, command: impl Into<String>) {
        let _ = self.cmd_tx.send(ClientCommand::SendCommand(command.into()));
    }
}

async fn run_service(
    mut cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    event_tx: mpsc::Sender<ClientEvent>,
) {
    let mut session = ClientSession::new();
    let mut conn: Option<TcpStream> = None;
    let mut connecting: Option<ConnectFuture> = None;
    let mut read_buf = [0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            command = cmd_rx.recv() => {
                let actions = match command {
                    Some(ClientCommand::Connect { host, port, password }) => {
                        session.connect(&host, port, &password)
                    }
                    Some(ClientCommand::Disconnect) => session.disconnect(),
                    Some(ClientCommand::SendCommand(text)) => session.send_command(&text),
                    // All handles dropped; tear the task down.
                    None => break,
                };
                apply_actions(actions, &mut conn, &mut connecting, &event_tx).await;
            }

            result = async {
                connecting.as_mut().expect("branch guarded by is_some()").await
            }, if connecting.is_some() => {
                connecting = None;
                let actions = match result {
                    Ok(stream) => {
                        conn = Some(stream);
                        session.on_connect_result(true)
                    }
                    Err(error) => {
                        debug!(%error, "connect failed");
                        session.on_connect_result(false)
                    }
                };
                apply_actions(actions, &mut conn, &mut connecting, &event_tx).await;
            }

            read = async {
                conn.as_mut()
                    .expect("branch guarded by conn.is_some()")
                    .read(&mut read_buf)
                    .await
            }, if conn.is_some() => {
                let actions = match read {
                    Ok(0) | Err(_) => {
                        debug!("server connection closed");
                        conn = None;
                        session.on_connection_closed()
                    }
                    Ok(n) => session.on_incoming_data(&read_buf[..n]),
                };
                apply_actions(actions, &mut conn, &mut connecting, &event_tx).await;
            }
        }
    }
}

/// Interprets a batch of session actions against the real socket.
async fn apply_actions(
    actions: Vec<ClientAction>,
    conn: &mut Option<TcpStream>,
    connecting: &mut Option<ConnectFuture>,
    event_tx: &mpsc::Sender<ClientEvent>,
) {
    for action in actions {
        match action {
            ClientAction::Connect { host, port } => {
                *connecting = Some(Box::pin(TcpStream::connect((host, port))));
            }
            ClientAction::Send(bytes) => {
                if let Some(stream) = conn.as_mut() {
                    if let Err(error) = stream.write_all(&bytes).await {
                        // The next read observes the failure and tears the
                        // session down.
                        warn!(%error, "session write failed");
                    }
                }
            }
            ClientAction::Disconnect => {
                *connecting = None;
                if let Some(mut stream) = conn.take() {
                    let _ = stream.shutdown().await;
                }
            }
            ClientAction::Notify(event) => {
                let _ = event_tx.send(event).await;
            }
        }
    }
}
