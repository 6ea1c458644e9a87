/// Shared error type used across all leqture crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("upload: {0}")]
    Upload(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error came from the transport itself (connection, DNS,
    /// TLS, timeout) rather than from a response the service returned.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
