/// Error types for the blog service
///
/// Every failure that crosses the store boundary is one of these variants.
/// Transient storage conflicts never appear here: the retry coordinator
/// absorbs them, and only an exhausted or non-retryable failure surfaces as
/// `StoreError::Storage`.
use resilience::RetryError;
use std::fmt;

/// Result type for blog-service operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("post not found: {0}")]
    PostNotFound(String),

    #[error("comment not found: {0}")]
    CommentNotFound(String),

    #[error("comment {comment_id} is not under post {post_id}")]
    OwnershipMismatch { comment_id: String, post_id: String },

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("comments are disabled for post {0}")]
    CommentsDisabled(String),

    #[error("{operation}: cancelled")]
    Cancelled { operation: String },

    #[error("{operation}: storage failure after {attempts} attempt(s): {message}")]
    Storage {
        operation: String,
        attempts: u32,
        message: String,
    },
}

impl StoreError {
    /// Stable machine-readable code, exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::PostNotFound(_) | StoreError::CommentNotFound(_) => "NOT_FOUND",
            StoreError::OwnershipMismatch { .. } => "OWNERSHIP_MISMATCH",
            StoreError::InvalidCursor(_) => "INVALID_CURSOR",
            StoreError::MissingParameter(_) => "MISSING_PARAMETER",
            StoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            StoreError::CommentsDisabled(_) => "COMMENTS_DISABLED",
            StoreError::Cancelled { .. } => "CANCELLED",
            StoreError::Storage { .. } => "STORAGE_FAILURE",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::PostNotFound(_) | StoreError::CommentNotFound(_)
        )
    }
}

impl<E> From<RetryError<E>> for StoreError
where
    E: fmt::Display + fmt::Debug,
{
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::Permanent {
                operation,
                attempts,
                cause,
            } => StoreError::Storage {
                operation,
                attempts,
                message: cause.to_string(),
            },
            RetryError::Exhausted {
                operation,
                attempts,
                last,
            } => StoreError::Storage {
                operation,
                attempts,
                message: last.to_string(),
            },
            RetryError::Cancelled { operation } => StoreError::Cancelled { operation },
        }
    }
}
