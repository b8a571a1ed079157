//! RPS Duel Server
//!
//! Binary entry point: parse the CLI, load `conf.ini`, wire up logging and
//! run the server until interrupted.

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rps_duel::network::{Server, ServerConfig};
use rps_duel::{Settings, VERSION};

const CONFIG_FILE: &str = "conf.ini";

/// Rock/paper/scissors duel server.
#[derive(Debug, Parser)]
#[command(name = "rps-duel-server", version)]
struct Args {
    /// Enable debug-level logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("RPS Duel Server v{}", VERSION);

    let settings =
        Settings::load(CONFIG_FILE).with_context(|| format!("failed to read {}", CONFIG_FILE))?;
    let server = Server::new(ServerConfig::from_settings(&settings)?);

    tokio::select! {
        result = server.run() => result.context("server terminated")?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted.");
        }
    }

    Ok(())
}
