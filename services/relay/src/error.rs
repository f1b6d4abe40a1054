use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind listening endpoint: {0}")]
    Bind(#[source] std::io::Error),

    #[error("accept loop failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to read config file: {0}")]
    ConfigRead(#[source] std::io::Error),

    #[error("invalid config file: {0}")]
    Config(String),
}
