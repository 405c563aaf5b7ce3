use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store operation timed out after {timeout_seconds} seconds")]
    StoreTimeout { timeout_seconds: u64 },

    #[error("Conversation not found: {0}")]
    NotFound(Uuid),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::ValidationError(msg) => AppError::ValidationError(msg),
            ChatError::StoreUnavailable(msg) => AppError::Database(msg),
            ChatError::StoreTimeout { timeout_seconds } => AppError::ServiceUnavailable(format!(
                "Store operation timed out after {} seconds",
                timeout_seconds
            )),
            ChatError::NotFound(id) => {
                AppError::NotFound(format!("Conversation {} not found", id))
            }
            ChatError::Auth(msg) => AppError::Auth(msg),
            ChatError::Serialization(err) => AppError::Internal(err.to_string()),
        }
    }
}
