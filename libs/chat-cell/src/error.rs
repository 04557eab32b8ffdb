use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Chat thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Message text cannot be empty")]
    EmptyMessage,

    /// The message was appended but the thread summary still shows the
    /// previous one.
    #[error(
        "Message {message_id} was sent but the thread summary was not updated (still shows {stale_last_message:?}): {reason}"
    )]
    SummaryNotUpdated {
        message_id: String,
        stale_last_message: Option<String>,
        reason: String,
    },

    #[error("Malformed chat record {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::ThreadNotFound(_) => AppError::NotFound(err.to_string()),
            ChatError::EmptyMessage => AppError::ValidationError(err.to_string()),
            ChatError::Store(StoreError::PermissionDenied(msg)) => AppError::Auth(msg.clone()),
            ChatError::Store(StoreError::NotFound { .. }) => AppError::NotFound(err.to_string()),
            ChatError::SummaryNotUpdated { .. } | ChatError::Malformed { .. } | ChatError::Store(_) => {
                AppError::Database(err.to_string())
            }
        }
    }
}
