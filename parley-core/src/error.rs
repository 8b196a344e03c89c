// ABOUTME: Typed error taxonomy for the chat pipeline and the state stores.
// ABOUTME: The HTTP layer maps each variant onto a status code.

/// Errors surfaced to callers of the conversation, profile and dispatch APIs.
///
/// Backend outages never appear here: they are recovered where they happen
/// (apology text, no generated file, no profile update). The image path is
/// the exception and reports them as `Internal`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller supplied something unusable (empty message, bad index, ...)
    #[error("{0}")]
    InvalidArgument(String),

    /// Referenced chat, file or profile does not exist
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
