//! Line framing, overlay grammar, escaping, naming rules, and the shared
//! diagnostic log timer used by both the relay server and the broker
//! adapter.

pub mod error;
pub mod escape;
pub mod grammar;
pub mod logging;
pub mod naming;

pub use error::WireError;

/// Default relay listen port.
pub const DEFAULT_RELAY_PORT: u16 = 10000;

/// Default set of overlay channels the broker adapter subscribes to after a
/// successful handshake.
pub const DEFAULT_SUBSCRIBED_ITEMS: &[&str] = &["idle", "assign", "capacity"];
