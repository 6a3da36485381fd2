//! Haven Relay Server binary
//!
//! Clients authenticate, exchange public keys and send opaque cipher
//! bodies over newline-delimited JSON; the relay routes by receiver id
//! and never decrypts anything.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use relay_server::router::RelayRouter;
use relay_server::serve;
use relay_server::store::{HistoryStore, UserStore};

#[derive(Parser, Debug)]
#[command(name = "haven-relay", version, about = "Haven E2EE chat relay")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 9000, env = "RELAY_PORT")]
    port: u16,

    /// Directory holding the user and history snapshots
    #[arg(long, default_value = "data", env = "RELAY_DATA_DIR")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!("Starting Haven relay");

    let users = UserStore::open(args.data_dir.join("users.json"));
    let history = HistoryStore::open(args.data_dir.join("history.json"));
    let router = Arc::new(RelayRouter::new(users, history));

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    serve(listener, router).await?;

    Ok(())
}
