use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to relay at {0}: {1}")]
    Connect(String, #[source] std::io::Error),

    #[error("failed to spawn adapter I/O thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("relay rejected the handshake: {0}")]
    HandshakeRejected(String),

    #[error("adapter is not connected")]
    NotConnected,
}
