//! Haven chat client
//!
//! Line-oriented terminal client: signs up or logs in over one persistent
//! TCP connection, exchanges public keys through the relay and chats with
//! AES-256-GCM end-to-end encryption. The relay only ever sees opaque
//! bodies.

mod history;
mod sessions;
mod vault;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::sleep;
use tracing::{info, warn};

use chat_protocol::{AuthPayload, Envelope, EnvelopeKind, SERVER_ID, auth_result, wire_timestamp};

use history::{HistoryEntry, HistoryVault};
use sessions::{InboundChat, SessionManager};
use vault::KeyVault;

const CONNECT_RETRY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "haven", version, about = "Haven E2EE chat client")]
struct Args {
    /// Relay host
    #[arg(long, default_value = "127.0.0.1", env = "HAVEN_RELAY_HOST")]
    host: String,

    /// Relay port
    #[arg(short, long, default_value_t = 9000, env = "HAVEN_RELAY_PORT")]
    port: u16,

    /// Override the data directory (defaults to ~/.haven)
    #[arg(long, env = "HAVEN_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

/// Client protocol phase. `Connecting` retries forever at a fixed
/// interval; everything after `Ready` is terminal on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_client=warn".into()),
        )
        .init();

    let args = Args::parse();
    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => dirs::home_dir()
            .context("cannot locate a home directory")?
            .join(".haven"),
    };

    let mut state = ClientState::Disconnected;
    info!(?state, "client starting");

    state = ClientState::Connecting;
    println!("[net] connecting to {}:{} ...", args.host, args.port);
    let stream = loop {
        match TcpStream::connect((args.host.as_str(), args.port)).await {
            Ok(stream) => break stream,
            Err(e) => {
                info!(?state, error = %e, "connect failed, retrying");
                sleep(CONNECT_RETRY).await;
            }
        }
    };
    println!("[net] connected");

    let (read_half, mut write_half) = stream.into_split();
    let mut server_lines = BufReader::new(read_half).lines();
    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

    println!("1) sign up  2) log in");
    let choice = prompt(&mut stdin_lines, "> ").await?;
    let signing_up = choice == "1";
    let user_id = prompt(&mut stdin_lines, "id: ").await?;
    let passphrase = prompt(&mut stdin_lines, "password: ").await?;

    let vault = KeyVault::new(&data_dir);
    let identity = vault.load_or_create(&user_id, &passphrase)?;
    println!("[keys] identity ready");

    state = ClientState::Authenticating;
    info!(?state, user = %user_id, "authenticating");

    let (kind, payload) = if signing_up {
        (
            EnvelopeKind::AuthSignup,
            AuthPayload::signup(&user_id, &passphrase, &identity.public_base64()),
        )
    } else {
        (
            EnvelopeKind::AuthLogin,
            AuthPayload::login(&user_id, &passphrase),
        )
    };
    let auth = Envelope::new(kind, &user_id, SERVER_ID, payload.to_body()?, wire_timestamp());
    send_envelope(&mut write_half, &auth).await?;

    // Exactly one reply line decides the attempt; fail closed otherwise.
    let verdict = match server_lines.next_line().await? {
        Some(line) => Envelope::from_line(&line)?,
        None => bail!("server closed the connection during authentication"),
    };
    if !verdict.body.contains(auth_result::OK_MARKER) {
        bail!("authentication failed: {}", verdict.body);
    }
    println!("[auth] {}", verdict.body);

    state = ClientState::Ready;
    info!(?state, "session ready");
    println!("commands: /key <id> to start a secure session, /quit to leave");

    let manager = Arc::new(SessionManager::new(identity));
    let history = Arc::new(HistoryVault::new(&data_dir));

    // Inbound flow: everything the relay sends, classified by kind.
    {
        let manager = Arc::clone(&manager);
        let history = Arc::clone(&history);
        let me = user_id.clone();
        tokio::spawn(async move {
            inbound_loop(server_lines, manager, history, me).await;
            // A Ready-state drop is terminal; there is no reconnect.
            eprintln!("[net] server connection closed");
            process::exit(1);
        });
    }

    // Outbound flow: user commands and messages.
    outbound_loop(stdin_lines, write_half, manager, history, user_id).await
}

async fn prompt(stdin: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String> {
    use std::io::Write;
    print!("{label}");
    std::io::stdout().flush()?;
    match stdin.next_line().await? {
        Some(line) => Ok(line.trim().to_string()),
        None => bail!("stdin closed"),
    }
}

async fn send_envelope(write_half: &mut OwnedWriteHalf, envelope: &Envelope) -> Result<()> {
    let mut line = envelope.to_line()?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}

async fn inbound_loop(
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    manager: Arc<SessionManager>,
    history: Arc<HistoryVault>,
    me: String,
) {
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "socket read failed");
                return;
            }
        };
        match Envelope::from_line(&line) {
            Ok(envelope) => handle_inbound(envelope, &manager, &history, &me),
            Err(e) => warn!(error = %e, "skipping unparsable envelope"),
        }
    }
}

fn handle_inbound(envelope: Envelope, manager: &SessionManager, history: &HistoryVault, me: &str) {
    match envelope.kind {
        EnvelopeKind::System => println!("[system] {}", envelope.body),
        EnvelopeKind::AuthResult => println!("[auth] {}", envelope.body),

        // Key exchange: a KEY_RES answers our own request, a forwarded
        // KEY_REQ carries the requester's key. Handling both means one
        // round trip leaves both ends keyed.
        EnvelopeKind::KeyRes | EnvelopeKind::KeyReq => {
            let peer = envelope.sender;
            match manager.establish(&peer, &envelope.body) {
                Ok(()) => {
                    println!("[keys] secure session with {peer}");
                    if envelope.kind == EnvelopeKind::KeyRes {
                        replay_history(history, me, &peer);
                    }
                }
                Err(e) => println!("[keys] key from {peer} rejected: {e}"),
            }
        }

        EnvelopeKind::Chat => {
            let sender = envelope.sender;
            match manager.resolve_inbound(&sender, &envelope.body) {
                InboundChat::Plaintext(text) => {
                    println!("[chat:raw] {sender}: {text}");
                    history.append(
                        me,
                        &sender,
                        HistoryEntry {
                            sender: sender.clone(),
                            receiver: me.to_string(),
                            message: text,
                            timestamp: envelope.timestamp,
                        },
                    );
                }
                InboundChat::Decrypted(text) => {
                    println!("[chat] {sender}: {text}");
                    history.append(
                        me,
                        &sender,
                        HistoryEntry {
                            sender: sender.clone(),
                            receiver: me.to_string(),
                            message: text,
                            timestamp: envelope.timestamp,
                        },
                    );
                }
                InboundChat::Rejected => {
                    println!("[chat] message from {sender} failed authentication, dropped");
                }
            }
        }

        EnvelopeKind::AuthSignup | EnvelopeKind::AuthLogin => {
            warn!(kind = ?envelope.kind, "ignoring client-originated kind from the relay");
        }
    }
}

fn replay_history(history: &HistoryVault, me: &str, peer: &str) {
    let entries = history.load(me, peer);
    if entries.is_empty() {
        return;
    }
    println!("------ earlier conversation ------");
    for entry in &entries {
        println!(
            "[{}] {} -> {}: {}",
            entry.timestamp, entry.sender, entry.receiver, entry.message
        );
    }
    println!("----------------------------------");
}

async fn outbound_loop(
    mut stdin: Lines<BufReader<Stdin>>,
    mut write_half: OwnedWriteHalf,
    manager: Arc<SessionManager>,
    history: Arc<HistoryVault>,
    me: String,
) -> Result<()> {
    loop {
        let Some(line) = stdin.next_line().await? else {
            return Ok(());
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        // Exit without draining either flow.
        if input == "/quit" {
            return Ok(());
        }

        if let Some(target) = input.strip_prefix("/key ") {
            let target = target.trim();
            if target.is_empty() {
                println!("[warn] usage: /key <id>");
                continue;
            }
            manager.set_target(target);
            let req = Envelope::new(
                EnvelopeKind::KeyReq,
                &me,
                target,
                manager.identity().public_base64(),
                wire_timestamp(),
            );
            send_envelope(&mut write_half, &req).await?;
            println!("[keys] public key requested from {target}");
            continue;
        }

        let Some(peer) = manager.target() else {
            println!("[warn] pick a peer first: /key <id>");
            continue;
        };

        if !manager.has_session(&peer) {
            println!("[warn] no secure session with {peer}, sending plaintext");
        }
        let timestamp = wire_timestamp();
        let body = match manager.encrypt_for(&peer, input) {
            Some(Ok(body)) => body,
            Some(Err(e)) => {
                println!("[warn] encryption failed, message not sent: {e}");
                continue;
            }
            None => input.to_string(),
        };

        let msg = Envelope::new(EnvelopeKind::Chat, &me, &peer, body, timestamp.clone());
        send_envelope(&mut write_half, &msg).await?;
        history.append(
            &me,
            &peer,
            HistoryEntry {
                sender: me.clone(),
                receiver: peer.clone(),
                message: input.to_string(),
                timestamp,
            },
        );
    }
}
