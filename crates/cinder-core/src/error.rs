//! Error types for gateway operations.
//!
//! Only failures of a whole request live here. A stored message that fails to
//! decrypt is not an error of the listing; it is returned as
//! [`MessageBody::Unreadable`](crate::MessageBody::Unreadable).

use cinder_crypto::CryptoError;
use thiserror::Error;

use crate::{
    autodestruct::InvalidDelay,
    model::{ConversationId, UserId},
    storage::StorageError,
};

/// Errors returned by [`ConversationGateway`](crate::ConversationGateway).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Conversation does not exist
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// Caller is not a member of the conversation
    #[error("user {user} is not a member of conversation {conversation_id}")]
    Forbidden {
        /// Conversation that was accessed
        conversation_id: ConversationId,
        /// Authenticated caller
        user: UserId,
    },

    /// Request input rejected before any state change
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },

    /// Autodestruct delay outside the allowed set. No state was changed.
    #[error(transparent)]
    InvalidDelay(#[from] InvalidDelay),

    /// Encryption could not produce an envelope. Nothing was persisted.
    #[error("encryption failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage backend failed. Never downgraded to a placeholder.
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl GatewayError {
    /// True for failures caused by the request itself (4xx-style): retrying
    /// the same request cannot succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_)
                | Self::Forbidden { .. }
                | Self::InvalidInput { .. }
                | Self::InvalidDelay(_)
        )
    }
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConversationNotFound(id) => Self::ConversationNotFound(id),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_conversation_from_storage_is_a_client_error() {
        let id = ConversationId::new(5);
        let err = GatewayError::from(StorageError::ConversationNotFound(id));

        assert_eq!(err, GatewayError::ConversationNotFound(id));
        assert!(err.is_client_error());
    }

    #[test]
    fn storage_and_crypto_failures_are_server_errors() {
        assert!(!GatewayError::from(StorageError::Io("disk".to_string())).is_client_error());
        assert!(
            !GatewayError::from(CryptoError::Encryption { reason: "x".to_string() })
                .is_client_error()
        );
        assert!(GatewayError::from(InvalidDelay { minutes: 2 }).is_client_error());
    }
}
