use shared::JoinError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    #[error("join rejected: {0}")]
    Rejected(JoinError),

    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),

    #[error("server closed the connection")]
    ConnectionClosed,
}
