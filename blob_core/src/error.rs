use thiserror::Error;

/// Errors surfaced by the core domain and storage layers.
///
/// Every variant except [`ServiceError::AccessDenied`] is reported to the
/// client verbatim in an ack envelope's `error` field; `AccessDenied` never
/// reaches an ack because it only occurs during the handshake, before a
/// session exists to acknowledge anything.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Reference is not provided")]
    MissingReference,
    #[error("storage error")]
    Io(#[from] std::io::Error),
    #[error("access denied")]
    AccessDenied,
}

impl ServiceError {
    /// Validation errors are the only kind constructed ad hoc around the
    /// codebase; this keeps the `"{0}"` message consistent.
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// The string surfaced to a connected client in an ack envelope's
    /// `error` field. I/O errors are flattened to a fixed message so that
    /// filesystem paths and OS error codes never cross the trust boundary;
    /// callers should still log the original error via `tracing::warn!`.
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::Io(_) => "storage error".to_string(),
            other => other.to_string(),
        }
    }
}
