use thiserror::Error;

use crate::domain::MessageId;

/// Shown when either catalog request fails during startup or reload.
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load initial data";
/// Shown when the response simulator fails for a send.
pub const RESPONSE_FAILURE_MESSAGE: &str = "Failed to get AI response";

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("malformed transcript export: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("transcript export declares {declared} messages but contains {actual}")]
    CountMismatch { declared: usize, actual: usize },
    #[error("message id {id} at index {index} does not follow the previous message")]
    OutOfOrder { index: usize, id: MessageId },
    #[error("message id {id} at index {index} is not a creation time in milliseconds")]
    IdOutOfRange { index: usize, id: MessageId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown parameter '{0}'")]
pub struct UnknownParameter(pub String);
