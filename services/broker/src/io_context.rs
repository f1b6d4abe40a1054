use std::sync::Arc;
use std::thread::{self, JoinHandle};

use once_cell::sync::Lazy;

/// A thin handle over named-thread spawning, shared by every [`crate::BrokerAdapter`]
/// that does not bring its own.
///
/// The spec's "global process-wide I/O context" is realized here as a
/// lazily-initialized singleton; [`IoContext::new`] gives callers who want an
/// owned instance (e.g. tests running many adapters concurrently) a way to
/// avoid it, per the Design Notes' "must not be required" clause.
pub struct IoContext {
    label: String,
}

static GLOBAL: Lazy<Arc<IoContext>> = Lazy::new(|| IoContext::new("broker-io"));

impl IoContext {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { label: label.into() })
    }

    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    pub fn spawn<F>(&self, role: &str, f: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name(format!("{}-{}", self.label, role))
            .spawn(f)
    }
}
