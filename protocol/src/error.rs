use thiserror::Error;

/// Shared wire-level failures surfaced by both the relay and the broker adapter.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("name {0:?} uses characters outside [A-Za-z0-9/_.+-]")]
    InvalidName(String),

    #[error("wildcard pattern {0:?} did not compile")]
    InvalidWildcard(String),

    #[error("line did not match any known overlay form: {0:?}")]
    UnrecognizedOverlay(String),
}
