use std::fmt;

use chrono::Local;
use tracing_subscriber::fmt::time::FormatTime;

/// Millisecond-precision local timestamp, `YYYY-MM-DD HH:MM:SS.mmm`, matching
/// the relay/adapter's shared diagnostic log format.
#[derive(Clone, Copy, Default)]
pub struct ChatTimer;

impl FormatTime for ChatTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Installs the process-wide stderr subscriber shared by both binaries.
/// Honors `RUST_LOG`, defaulting to `info`.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChatTimer)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
