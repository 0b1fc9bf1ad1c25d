use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};

use super::{PurgeOutcome, Storage, StorageError};
use crate::model::{Conversation, ConversationId, Message, MessageId, UserId};

/// In-memory storage implementation for testing and simulation
///
/// All state lives behind one `Arc<Mutex<>>`, so every trait method is
/// atomic with respect to every other and clones share the same data. A
/// poisoned lock surfaces as `StorageError::Io` instead of a panic.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    conversations: HashMap<ConversationId, Conversation>,

    /// Messages per conversation, kept in ascending `created_at` order
    messages: HashMap<ConversationId, Vec<Message>>,

    /// Every stored message id, for collision checks
    message_ids: HashSet<MessageId>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryStorageInner::default())) }
    }

    /// Total number of messages across all conversations.
    ///
    /// Useful for debugging and testing.
    pub fn total_message_count(&self) -> Result<usize, StorageError> {
        let inner = self.lock()?;
        Ok(inner.messages.values().map(Vec::len).sum())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStorageInner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Io("storage mutex poisoned".to_string()))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageInner {
    fn conversation_mut(
        &mut self,
        id: ConversationId,
    ) -> Result<&mut Conversation, StorageError> {
        self.conversations.get_mut(&id).ok_or(StorageError::ConversationNotFound(id))
    }

    fn remove_messages(&mut self, id: ConversationId) -> usize {
        let removed = self.messages.remove(&id).unwrap_or_default();
        for message in &removed {
            self.message_ids.remove(&message.id());
        }
        removed.len()
    }
}

impl Storage for MemoryStorage {
    fn create_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let mut inner = self.lock()?;

        if inner.conversations.contains_key(&conversation.id()) {
            return Err(StorageError::ConversationExists(conversation.id()));
        }
        inner.conversations.insert(conversation.id(), conversation.clone());

        Ok(())
    }

    fn load_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        Ok(self.lock()?.conversations.get(&id).cloned())
    }

    fn list_conversations(&self, member: UserId) -> Result<Vec<Conversation>, StorageError> {
        let inner = self.lock()?;

        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|conversation| conversation.is_member(member))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| {
            b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id()))
        });

        Ok(conversations)
    }

    fn set_autodestruct(
        &self,
        id: ConversationId,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        inner.conversation_mut(id)?.set_autodestruct_at(deadline);
        Ok(())
    }

    fn purge_expired(
        &self,
        id: ConversationId,
        expected: DateTime<Utc>,
    ) -> Result<PurgeOutcome, StorageError> {
        let mut inner = self.lock()?;

        let conversation = inner.conversation_mut(id)?;
        if conversation.autodestruct_at() != Some(expected) {
            return Ok(PurgeOutcome::Skipped);
        }
        conversation.set_autodestruct_at(None);

        let deleted = inner.remove_messages(id);
        Ok(PurgeOutcome::Purged { deleted })
    }

    fn store_message(&self, message: &Message) -> Result<MessageId, StorageError> {
        let mut inner = self.lock()?;

        if !inner.conversations.contains_key(&message.conversation_id()) {
            return Err(StorageError::ConversationNotFound(message.conversation_id()));
        }
        if !inner.message_ids.insert(message.id()) {
            return Err(StorageError::MessageExists(message.id()));
        }

        let messages = inner.messages.entry(message.conversation_id()).or_default();
        // Insert after every message with created_at <= ours; ties keep
        // arrival order.
        let position = messages.partition_point(|m| m.created_at() <= message.created_at());
        messages.insert(position, message.clone());

        debug_assert!(messages.windows(2).all(|w| w[0].created_at() <= w[1].created_at()));

        Ok(message.id())
    }

    fn load_messages(&self, id: ConversationId) -> Result<Vec<Message>, StorageError> {
        Ok(self.lock()?.messages.get(&id).cloned().unwrap_or_default())
    }

    fn delete_messages(&self, id: ConversationId) -> Result<usize, StorageError> {
        Ok(self.lock()?.remove_messages(id))
    }

    fn mark_seen(&self, id: ConversationId, reader: UserId) -> Result<usize, StorageError> {
        let mut inner = self.lock()?;

        let Some(messages) = inner.messages.get_mut(&id) else {
            return Ok(0);
        };

        Ok(messages
            .iter_mut()
            .filter(|message| message.sender() != reader)
            .map(|message| message.mark_seen_by(reader))
            .filter(|added| *added)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use cinder_crypto::{ALGORITHM, Envelope};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn conversation(id: u128, created_secs: i64, members: &[u64]) -> Conversation {
        let members: BTreeSet<UserId> = members.iter().copied().map(UserId::new).collect();
        Conversation::new(ConversationId::new(id), format!("c{id}"), members, at(created_secs))
    }

    fn message(id: u128, conversation: u128, sender: u64, created_secs: i64) -> Message {
        let envelope = Envelope {
            alg: ALGORITHM.to_string(),
            ciphertext: vec![id as u8; 20],
            nonce: [0u8; 12],
            aad: Vec::new(),
            wrapped_dek: vec![0u8; 40],
            kek_id: "k".to_string(),
        };
        Message::new(
            MessageId::new(id),
            ConversationId::new(conversation),
            UserId::new(sender),
            at(created_secs),
            envelope,
        )
    }

    #[test]
    fn create_conversation_rejects_duplicates() {
        let storage = MemoryStorage::new();
        storage.create_conversation(&conversation(1, 0, &[1])).unwrap();

        let result = storage.create_conversation(&conversation(1, 5, &[2]));
        assert_eq!(result, Err(StorageError::ConversationExists(ConversationId::new(1))));

        let loaded = storage.load_conversation(ConversationId::new(1)).unwrap().unwrap();
        assert!(loaded.is_member(UserId::new(1)));
    }

    #[test]
    fn list_conversations_filters_by_member_newest_first() {
        let storage = MemoryStorage::new();
        storage.create_conversation(&conversation(1, 10, &[1, 2])).unwrap();
        storage.create_conversation(&conversation(2, 30, &[1])).unwrap();
        storage.create_conversation(&conversation(3, 20, &[2])).unwrap();

        let ids: Vec<u128> = storage
            .list_conversations(UserId::new(1))
            .unwrap()
            .iter()
            .map(|c| c.id().get())
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn messages_come_back_in_creation_order() {
        let storage = MemoryStorage::new();
        storage.create_conversation(&conversation(1, 0, &[1])).unwrap();

        storage.store_message(&message(10, 1, 1, 30)).unwrap();
        storage.store_message(&message(11, 1, 1, 10)).unwrap();
        storage.store_message(&message(12, 1, 1, 20)).unwrap();

        let ids: Vec<u128> = storage
            .load_messages(ConversationId::new(1))
            .unwrap()
            .iter()
            .map(|m| m.id().get())
            .collect();
        assert_eq!(ids, vec![11, 12, 10]);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let storage = MemoryStorage::new();
        storage.create_conversation(&conversation(1, 0, &[1])).unwrap();

        for id in [30, 20, 10] {
            storage.store_message(&message(id, 1, 1, 5)).unwrap();
        }

        let ids: Vec<u128> = storage
            .load_messages(ConversationId::new(1))
            .unwrap()
            .iter()
            .map(|m| m.id().get())
            .collect();
        assert_eq!(ids, vec![30, 20, 10]);
    }

    #[test]
    fn store_message_requires_conversation_and_unique_id() {
        let storage = MemoryStorage::new();
        assert_eq!(
            storage.store_message(&message(10, 1, 1, 0)),
            Err(StorageError::ConversationNotFound(ConversationId::new(1)))
        );

        storage.create_conversation(&conversation(1, 0, &[1])).unwrap();
        storage.store_message(&message(10, 1, 1, 0)).unwrap();
        assert_eq!(
            storage.store_message(&message(10, 1, 1, 5)),
            Err(StorageError::MessageExists(MessageId::new(10)))
        );
    }

    #[test]
    fn purge_expired_is_conditional_on_deadline() {
        let storage = MemoryStorage::new();
        let id = ConversationId::new(1);
        storage.create_conversation(&conversation(1, 0, &[1])).unwrap();
        storage.store_message(&message(10, 1, 1, 0)).unwrap();
        storage.store_message(&message(11, 1, 1, 1)).unwrap();
        storage.set_autodestruct(id, Some(at(60))).unwrap();

        // Stale expectation: deadline was re-armed
        assert_eq!(storage.purge_expired(id, at(30)).unwrap(), PurgeOutcome::Skipped);
        assert_eq!(storage.total_message_count().unwrap(), 2);

        assert_eq!(storage.purge_expired(id, at(60)).unwrap(), PurgeOutcome::Purged { deleted: 2 });
        assert_eq!(storage.purge_expired(id, at(60)).unwrap(), PurgeOutcome::Skipped);

        let loaded = storage.load_conversation(id).unwrap().unwrap();
        assert_eq!(loaded.autodestruct_at(), None);
        assert!(storage.load_messages(id).unwrap().is_empty());
    }

    #[test]
    fn purge_frees_message_ids() {
        let storage = MemoryStorage::new();
        let id = ConversationId::new(1);
        storage.create_conversation(&conversation(1, 0, &[1])).unwrap();
        storage.store_message(&message(10, 1, 1, 0)).unwrap();

        assert_eq!(storage.delete_messages(id).unwrap(), 1);
        assert_eq!(storage.delete_messages(id).unwrap(), 0);
        storage.store_message(&message(10, 1, 1, 0)).unwrap();
    }

    #[test]
    fn mark_seen_skips_own_messages_and_repeats() {
        let storage = MemoryStorage::new();
        let id = ConversationId::new(1);
        storage.create_conversation(&conversation(1, 0, &[1, 2])).unwrap();
        storage.store_message(&message(10, 1, 1, 0)).unwrap();
        storage.store_message(&message(11, 1, 2, 1)).unwrap();

        assert_eq!(storage.mark_seen(id, UserId::new(2)).unwrap(), 1);
        assert_eq!(storage.mark_seen(id, UserId::new(2)).unwrap(), 0);

        let messages = storage.load_messages(id).unwrap();
        assert!(messages[0].meta().seen_by.contains(&UserId::new(2)));
        assert!(messages[1].meta().seen_by.is_empty());
    }

    #[test]
    fn set_autodestruct_on_missing_conversation() {
        let storage = MemoryStorage::new();
        let id = ConversationId::new(7);

        assert_eq!(
            storage.set_autodestruct(id, Some(at(1))),
            Err(StorageError::ConversationNotFound(id))
        );
        assert_eq!(
            storage.purge_expired(id, at(1)),
            Err(StorageError::ConversationNotFound(id))
        );
    }
}
