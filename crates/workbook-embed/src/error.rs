//! Errors surfaced synchronously to callers of the host API.
//!
//! Conditions that arrive asynchronously from the frame (remote errors,
//! malformed postings) never appear here: remote errors are recorded in the
//! state mirror and malformed postings are logged and dropped.

use workbook_protocol::CommandType;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("invalid frame source {source_url:?}: {reason}")]
    InvalidSource { source_url: String, reason: String },

    #[error("message channel is not ready: {0}")]
    ChannelNotReady(&'static str),

    #[error("invalid {command} arguments: {reason}")]
    Validation {
        command: CommandType,
        reason: String,
    },

    #[error("failed to mount frame: {0}")]
    Mount(#[source] anyhow::Error),

    #[error("failed to post message to frame: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("failed to serialize command: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EmbedError {
    pub(crate) fn validation(command: CommandType, reason: impl Into<String>) -> Self {
        EmbedError::Validation {
            command,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
