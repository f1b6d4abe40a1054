use std::sync::Arc;

use socket2::SockRef;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::commands::dispatch_line;
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::registry::SessionRegistry;
use crate::session::{OutboundLine, Session};

/// Runs the relay's accept loop until the listener fails. Every accepted
/// connection becomes one read task plus one writer task sharing a
/// `Session`; the loop itself never blocks on a connection's I/O.
pub async fn run(config: RelayConfig, registry: Arc<SessionRegistry>) -> Result<(), RelayError> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(RelayError::Bind)?;
    info!("relay listening on port {}", config.port);

    loop {
        let (stream, addr) = listener.accept().await.map_err(RelayError::Accept)?;
        if let Err(e) = SockRef::from(&stream).set_keepalive(true) {
            warn!(%addr, "failed to set TCP keepalive: {}", e);
        }

        let registry = registry.clone();
        tokio::spawn(async move {
            handle_connection(registry, stream, addr).await;
        });
    }
}

async fn handle_connection(
    registry: Arc<SessionRegistry>,
    stream: TcpStream,
    addr: std::net::SocketAddr,
) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundLine>();

    let session = registry.insert_auto_named(|name| Arc::new(Session::new(name, addr, tx)));
    info!(name = %session.name(), %addr, "session connected");

    let writer_registry = registry.clone();
    let writer_session = session.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let text = outbound.text().to_string();
            let wrote = write_half.write_all(text.as_bytes()).await.is_ok()
                && write_half.write_all(b"\n").await.is_ok();
            if !wrote {
                if let OutboundLine::Chat { sender, .. } = &outbound {
                    let _ = sender.send_line("% failed chat: remote error".to_string());
                }
                error!(name = %writer_session.name(), "write error");
                logout(&writer_registry, &writer_session);
                break;
            }
        }
    });

    broadcast(&registry, &format!("# login: {}", session.name()));

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch_line(&registry, &session, &line),
            Ok(None) => {
                debug!(name = %session.name(), "read EOF");
                break;
            }
            Err(e) => {
                error!(name = %session.name(), "read error: {}", e);
                break;
            }
        }
    }

    logout(&registry, &session);
    writer_task.abort();
}

/// Removes `session` from the registry, requiring identity match so a
/// session already logged out by the other half of the connection (read vs.
/// write) is not logged out twice.
fn logout(registry: &SessionRegistry, session: &Arc<Session>) {
    if registry.remove(session) {
        broadcast(registry, &format!("# logout: {}", session.name()));
    }
}

fn broadcast(registry: &SessionRegistry, line: &str) {
    for session in registry.list() {
        let _ = session.send_line(line.to_string());
    }
}
