//! Associated data binding a message envelope to its context.
//!
//! Layout (37 bytes):
//!
//! ```text
//! +-----------------+----------------------+---------------+
//! | "cinder/msg/v1" | conversation_id (BE) | sender (BE)   |
//! | 13 bytes        | 16 bytes             | 8 bytes       |
//! +-----------------+----------------------+---------------+
//! ```
//!
//! Both identifiers are fixed width, so no two distinct contexts share an
//! encoding and no delimiter is needed.

use crate::model::{ConversationId, UserId};

/// Domain separation prefix.
pub const AAD_PREFIX: &[u8] = b"cinder/msg/v1";

/// Encoded AAD length.
pub const AAD_LEN: usize = AAD_PREFIX.len() + 16 + 8;

/// AAD for a message posted by `sender` into `conversation_id`.
pub fn message_aad(conversation_id: ConversationId, sender: UserId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(AAD_LEN);
    aad.extend_from_slice(AAD_PREFIX);
    aad.extend_from_slice(&conversation_id.to_be_bytes());
    aad.extend_from_slice(&sender.to_be_bytes());

    debug_assert_eq!(aad.len(), AAD_LEN);
    aad
}
