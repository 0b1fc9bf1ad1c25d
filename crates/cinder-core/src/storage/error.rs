//! Storage error types.
//!
//! - `ConversationNotFound`: write against a conversation that does not exist
//! - `ConversationExists` / `MessageExists`: identifier collision on insert
//! - `Serialization`: failed to encode/decode a record
//! - `Io`: underlying storage system errors

use thiserror::Error;

use crate::model::{ConversationId, MessageId};

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Conversation does not exist
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// A conversation with this identifier is already stored
    #[error("conversation already exists: {0}")]
    ConversationExists(ConversationId),

    /// A message with this identifier is already stored
    #[error("message already exists: {0}")]
    MessageExists(MessageId),

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error (file system, database, poisoned lock, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
