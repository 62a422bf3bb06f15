use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
