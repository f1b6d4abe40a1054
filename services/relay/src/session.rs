use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// One line queued for a session's writer task.
///
/// `Chat` lines are tagged with the session that originated them: per the
/// relay's failure semantics, a write failure on a *routed chat delivery*
/// (as opposed to a reply or notification) is reported back to the original
/// sender before the failing session is logged out.
#[derive(Debug, Clone)]
pub enum OutboundLine {
    Plain(String),
    Chat { sender: Arc<Session>, line: String },
}

impl OutboundLine {
    pub fn text(&self) -> &str {
        match self {
            OutboundLine::Plain(line) => line,
            OutboundLine::Chat { line, .. } => line,
        }
    }
}

/// One connected TCP client: a mutable current name, its peer address, and
/// the sending half of its per-connection write queue.
///
/// Writes are enqueued here and drained by a dedicated writer task, giving a
/// single in-flight write per session with FIFO ordering and safe concurrent
/// producers, per the relay's per-session write queue invariant.
pub struct Session {
    name: Mutex<String>,
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<OutboundLine>,
}

impl Session {
    pub fn new(name: String, addr: SocketAddr, outbound: mpsc::UnboundedSender<OutboundLine>) -> Self {
        Self {
            name: Mutex::new(name),
            addr,
            outbound,
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn set_name(&self, new_name: String) {
        *self.name.lock() = new_name;
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Enqueues a reply or notification line. `line` must not already carry
    /// a trailing `\n`.
    pub fn send_line(&self, line: String) -> Result<(), mpsc::error::SendError<OutboundLine>> {
        self.outbound.send(OutboundLine::Plain(line))
    }

    /// Enqueues a routed chat delivery, tagging it with the originating
    /// session so a write failure can be reported back to `sender`.
    pub fn send_chat(
        &self,
        sender: Arc<Session>,
        line: String,
    ) -> Result<(), mpsc::error::SendError<OutboundLine>> {
        self.outbound.send(OutboundLine::Chat { sender, line })
    }
}
