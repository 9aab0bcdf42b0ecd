use shared::FormatError;
use thiserror::Error;

/// Errors surfaced to whoever starts the server.
///
/// Per-connection failures never show up here: the handler deals with them
/// and only that connection is dropped.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server is already running")]
    AlreadyRunning,

    #[error("failed to load questions: {0}")]
    Questions(#[from] FormatError),
}
