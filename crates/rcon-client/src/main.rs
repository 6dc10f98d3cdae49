//! One-shot RCON-Over-IP command-line client.
//!
//! ```text
//! rcon-client <host> <port> <password> <command...>
//! ```
//!
//! Connects, authenticates, runs the command, prints the result on stdout,
//! and exits.  Any failure along the way is reported on stderr with a
//! non-zero exit code.

use std::time::Duration;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use rcon_client::{ClientEvent, RconClient};

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 4 {
        bail!("usage: rcon-client <host> <port> <password> <command...>");
    }
    let host = &args[0];
    let port: u16 = args[1].parse().context("port must be a number")?;
    let password = &args[2];
    let command = args[3..].join(" ");

    let (client, mut events) = RconClient::start();
    client.connect(host.clone(), port, password.clone());

    let result = tokio::time::timeout(EXCHANGE_TIMEOUT, async {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::ConnectResult { ok: true, .. } => {}
                ClientEvent::ConnectResult { ok: false, reason } => {
                    bail!("connection failed: {reason:?}");
                }
                ClientEvent::SessionStatus { ok: true, .. } => {
                    client.send_command(command.clone());
                }
                ClientEvent::SessionStatus { ok: false, reason } => {
                    bail!("session ended: {reason:?}");
                }
                ClientEvent::CommandResult { result, .. } => {
                    return Ok(result);
                }
            }
        }
        bail!("client service stopped unexpectedly");
    })
    .await
    .context("timed out waiting for the server")??;

    println!("{result}");
    client.disconnect();
    Ok(())
}
