//! TCP accept loop and per-connection plumbing

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

use chat_protocol::Envelope;

use crate::registry::OUTBOUND_QUEUE;
use crate::router::RelayRouter;

/// Accept connections forever, one handler task per connection.
pub async fn serve(listener: TcpListener, router: Arc<RelayRouter>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "relay listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        info!(%peer_addr, "connection accepted");

        let router = Arc::clone(&router);
        tokio::spawn(async move {
            handle_connection(stream, router).await;
            info!(%peer_addr, "connection closed");
        });
    }
}

/// Drive one connection: a writer task drains the outbound queue while
/// this task parses inbound lines and hands them to the router.
///
/// A line that fails to parse is fatal to this connection only; the
/// socket closes and every other connection keeps running.
async fn handle_connection(stream: TcpStream, router: Arc<RelayRouter>) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Envelope>(OUTBOUND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let line = match envelope.to_line() {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "dropping unserializable envelope");
                    continue;
                }
            };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let envelope = match Envelope::from_line(&line) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(error = %e, "unparsable envelope, closing connection");
                        break;
                    }
                };
                // Whatever id this envelope claims now owns the channel.
                router.registry().bind(&envelope.sender, tx.clone());
                router.dispatch(envelope, &tx).await;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "socket read failed");
                break;
            }
        }
    }

    // The registry may still hold clones of `tx`, so the queue never
    // closes by itself; stop the writer with the connection.
    writer.abort();
}
