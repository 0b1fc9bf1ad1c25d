//! Storage abstraction for conversations and encrypted messages
//!
//! The trait is synchronous: each request runs on its own worker and the core
//! has no suspension points. Envelopes are stored verbatim; storage never sees
//! plaintext or unwrapped keys.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
use chrono::{DateTime, Utc};
pub use error::StorageError;
pub use memory::MemoryStorage;

pub use self::redb::RedbStorage;
use crate::model::{Conversation, ConversationId, Message, MessageId, UserId};

/// Result of a conditional purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// Messages were deleted and the deadline cleared.
    Purged {
        /// Number of messages deleted
        deleted: usize,
    },
    /// Stored deadline no longer matched: already purged or re-armed.
    Skipped,
}

/// Storage abstraction for conversations and their messages
///
/// Must be Clone (shared by every worker), Send + Sync (thread-safe), and
/// synchronous. Implementations share internal state via Arc, so clones
/// access the same underlying storage.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Insert a new conversation.
    ///
    /// # Errors
    ///
    /// - `ConversationExists`: identifier already taken. Nothing is
    ///   overwritten.
    fn create_conversation(&self, conversation: &Conversation) -> Result<(), StorageError>;

    /// Load a conversation. `None` if it does not exist.
    fn load_conversation(&self, id: ConversationId)
    -> Result<Option<Conversation>, StorageError>;

    /// Conversations `member` belongs to, newest first.
    fn list_conversations(&self, member: UserId) -> Result<Vec<Conversation>, StorageError>;

    /// Overwrite the autodestruct deadline. Last write wins.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`
    fn set_autodestruct(
        &self,
        id: ConversationId,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    /// Delete every message of `id` and clear its deadline, as one atomic
    /// step, but only if the stored deadline equals `expected`.
    ///
    /// # Invariants
    ///
    /// - Readers never observe the deadline cleared with messages present, or
    ///   messages gone with the deadline still set
    /// - Calling again with the same `expected` returns `Skipped`
    /// - A deadline re-armed since `expected` was read is left alone
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`
    fn purge_expired(
        &self,
        id: ConversationId,
        expected: DateTime<Utc>,
    ) -> Result<PurgeOutcome, StorageError>;

    /// Persist a new message.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`: owning conversation does not exist
    /// - `MessageExists`: identifier already taken
    fn store_message(&self, message: &Message) -> Result<MessageId, StorageError>;

    /// Messages of a conversation in ascending creation time. Messages with
    /// equal timestamps keep the order they were stored in. Durable backends
    /// may compare timestamps at microsecond resolution.
    fn load_messages(&self, id: ConversationId) -> Result<Vec<Message>, StorageError>;

    /// Delete every message of a conversation. Returns how many were removed;
    /// 0 when there was nothing to delete.
    fn delete_messages(&self, id: ConversationId) -> Result<usize, StorageError>;

    /// Add `reader` to `seen_by` on every message of `id` that `reader` did
    /// not send. Touches message metadata only. Returns how many messages
    /// gained the annotation.
    fn mark_seen(&self, id: ConversationId, reader: UserId) -> Result<usize, StorageError>;
}
