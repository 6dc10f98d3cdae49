//! # rcon-client
//!
//! Client side of RCON-Over-IP.  [`session`] holds the pure state machine
//! (connection lifecycle, challenge answering, the pending-command map) and
//! [`service`] the tokio task that drives it against a real socket.
//!
//! Typical use:
//!
//! ```no_run
//! use rcon_client::{ClientEvent, RconClient};
//!
//! # async fn demo() {
//! let (client, mut events) = RconClient::start();
//! client.connect("198.51.100.7", 25300, "hunter2");
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::SessionStatus { ok: true, .. } = event {
//!         client.send_command("status");
//!     }
//! }
//! # }
//! ```

pub mod service;
pub mod session;

pub use service::RconClient;
pub use session::{ClientEvent, ClientState, StatusReason};
