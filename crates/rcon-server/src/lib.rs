//! # rcon-server
//!
//! Server side of RCON-Over-IP: a single-session, challenge-authenticated
//! remote control service.
//!
//! The split mirrors the client crate: [`session`] is the pure state
//! machine, [`service`] is the tokio task that drives it against real
//! sockets and timers, and [`config`] maps a TOML file onto the service's
//! runtime settings.

pub mod config;
pub mod service;
pub mod session;

pub use config::{AppConfig, ConfigError};
pub use service::{RconServer, ServerConfig, ServerError, DEFAULT_PORT};
pub use session::{ServerEvent, SessionState, DEFAULT_AUTH_TIMEOUT};
