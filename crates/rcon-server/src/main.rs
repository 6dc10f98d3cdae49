//! Headless RCON-Over-IP server binary.
//!
//! Loads `rcon-server.toml` (or the path given as the first argument),
//! starts the control service, and answers commands with a small built-in
//! table until Ctrl-C.

use std::path::Path;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rcon_server::config::AppConfig;
use rcon_server::service::RconServer;
use rcon_server::session::ServerEvent;

const DEFAULT_CONFIG_PATH: &str = "rcon-server.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path_arg = std::env::args().nth(1);
    let path = path_arg.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let config = if Path::new(path).exists() {
        AppConfig::load(Path::new(path))
            .with_context(|| format!("loading config from {path}"))?
    } else {
        warn!(%path, "config file not found, using defaults");
        AppConfig::default()
    };

    if config.auth.password.is_empty() {
        bail!("no password configured; set [auth] password in {path}");
    }

    let service_config = config.service_config().context("invalid configuration")?;
    let (server, mut events) = RconServer::start(service_config)
        .await
        .context("starting control server")?;
    info!(addr = %server.local_addr(), "rcon-server ready");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(ServerEvent::ClientAuthorized { peer }) => {
                        info!(%peer, "client authorized");
                    }
                    Some(ServerEvent::AuthorizedClientLeft { peer }) => {
                        info!(%peer, "client disconnected");
                    }
                    Some(ServerEvent::ClientCommand { command_id, command }) => {
                        info!(command_id, %command, "executing command");
                        server.send_result(command_id, execute_command(&command));
                    }
                    None => {
                        error!("event channel closed unexpectedly");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                server.stop();
                break;
            }
        }
    }

    Ok(())
}

/// Built-in command table.  Real deployments replace this with calls into
/// the hosting application.
fn execute_command(command: &str) -> String {
    let mut parts = command.splitn(2, ' ');
    match parts.next().unwrap_or("") {
        "ping" => "pong".to_string(),
        "echo" => parts.next().unwrap_or("").to_string(),
        "help" => "commands: ping, echo <text>, help".to_string(),
        other => format!("unknown command: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::execute_command;

    #[test]
    fn test_builtin_commands() {
        assert_eq!(execute_command("ping"), "pong");
        assert_eq!(execute_command("echo hello world"), "hello world");
        assert_eq!(execute_command("echo"), "");
        assert!(execute_command("help").contains("ping"));
        assert_eq!(execute_command("frobnicate"), "unknown command: frobnicate");
    }
}
