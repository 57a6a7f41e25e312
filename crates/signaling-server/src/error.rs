use thiserror::Error;

/// Result type for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<peercall_infra_common::Error> for RelayError {
    fn from(e: peercall_infra_common::Error) -> Self {
        match e {
            peercall_infra_common::Error::Io(e) => RelayError::Io(e),
            other => RelayError::Config(other.to_string()),
        }
    }
}
