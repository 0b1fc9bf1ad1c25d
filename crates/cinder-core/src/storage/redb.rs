//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Every
//! trait method runs in a single transaction, so a conditional purge is
//! atomic against concurrent readers and writers.

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use super::{PurgeOutcome, Storage, StorageError};
use crate::model::{Conversation, ConversationId, Message, MessageId, UserId};

/// Table: conversations
/// Key: conversation_id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded Conversation
const CONVERSATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("conversations");

/// Table: messages
/// Key: (conversation_id, created_at, sequence, message_id) [48 bytes], see
/// [`encode_message_key`]
/// Value: CBOR-encoded Message (envelope stored verbatim)
const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

/// Table: message_index
/// Key: message_id as big-endian bytes [16 bytes]
/// Value: key of the message in MESSAGES [48 bytes]
const MESSAGE_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("message_index");

/// Table: meta
/// Key: counter name
/// Value: last value handed out
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Store-wide arrival counter, so equal timestamps keep insertion order
const MESSAGE_SEQ: &str = "message_seq";

const MESSAGE_KEY_LEN: usize = 48;
const MESSAGE_ID_OFFSET: usize = 32;

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (CONVERSATIONS, MESSAGES,
    /// MESSAGE_INDEX, META).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(CONVERSATIONS).map_err(io)?;
            let _ = txn.open_table(MESSAGES).map_err(io)?;
            let _ = txn.open_table(MESSAGE_INDEX).map_err(io)?;
            let _ = txn.open_table(META).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn create_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        {
            let mut table = txn.open_table(CONVERSATIONS).map_err(io)?;

            let key = conversation.id().to_be_bytes();
            if table.get(key.as_slice()).map_err(io)?.is_some() {
                return Err(StorageError::ConversationExists(conversation.id()));
            }

            let bytes = encode(conversation)?;
            table.insert(key.as_slice(), bytes.as_slice()).map_err(io)?;
        }

        txn.commit().map_err(io)?;

        Ok(())
    }

    fn load_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(CONVERSATIONS).map_err(io)?;

        read_conversation(&table, id)
    }

    fn list_conversations(&self, member: UserId) -> Result<Vec<Conversation>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(CONVERSATIONS).map_err(io)?;

        let mut conversations = Vec::new();
        for result in table.iter().map_err(io)? {
            let (_, value) = result.map_err(io)?;
            let conversation: Conversation = decode(value.value())?;
            if conversation.is_member(member) {
                conversations.push(conversation);
            }
        }

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
        let txn = self.db.begin_write().map_err(io)?;

        {
            let mut table = txn.open_table(CONVERSATIONS).map_err(io)?;

            let mut conversation =
                read_conversation(&table, id)?.ok_or(StorageError::ConversationNotFound(id))?;
            conversation.set_autodestruct_at(deadline);

            let bytes = encode(&conversation)?;
            table.insert(id.to_be_bytes().as_slice(), bytes.as_slice()).map_err(io)?;
        }

        txn.commit().map_err(io)?;

        Ok(())
    }

    fn purge_expired(
        &self,
        id: ConversationId,
        expected: DateTime<Utc>,
    ) -> Result<PurgeOutcome, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let deleted = {
            let mut conversations = txn.open_table(CONVERSATIONS).map_err(io)?;

            let mut conversation = read_conversation(&conversations, id)?
                .ok_or(StorageError::ConversationNotFound(id))?;
            if conversation.autodestruct_at() != Some(expected) {
                // Dropping the transaction aborts it
                return Ok(PurgeOutcome::Skipped);
            }
            conversation.set_autodestruct_at(None);

            let bytes = encode(&conversation)?;
            conversations.insert(id.to_be_bytes().as_slice(), bytes.as_slice()).map_err(io)?;

            let mut messages = txn.open_table(MESSAGES).map_err(io)?;
            let mut index = txn.open_table(MESSAGE_INDEX).map_err(io)?;
            remove_conversation_messages(&mut messages, &mut index, id)?
        };

        txn.commit().map_err(io)?;

        Ok(PurgeOutcome::Purged { deleted })
    }

    fn store_message(&self, message: &Message) -> Result<MessageId, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        {
            let conversations = txn.open_table(CONVERSATIONS).map_err(io)?;
            let conversation_key = message.conversation_id().to_be_bytes();
            if conversations.get(conversation_key.as_slice()).map_err(io)?.is_none() {
                return Err(StorageError::ConversationNotFound(message.conversation_id()));
            }

            let mut index = txn.open_table(MESSAGE_INDEX).map_err(io)?;
            let id_key = message.id().to_be_bytes();
            if index.get(id_key.as_slice()).map_err(io)?.is_some() {
                return Err(StorageError::MessageExists(message.id()));
            }

            let mut meta = txn.open_table(META).map_err(io)?;
            let sequence = meta.get(MESSAGE_SEQ).map_err(io)?.map_or(0, |v| v.value()) + 1;
            meta.insert(MESSAGE_SEQ, sequence).map_err(io)?;

            let key = encode_message_key(message, sequence);
            let bytes = encode(message)?;

            let mut messages = txn.open_table(MESSAGES).map_err(io)?;
            messages.insert(key.as_slice(), bytes.as_slice()).map_err(io)?;
            index.insert(id_key.as_slice(), key.as_slice()).map_err(io)?;
        }

        txn.commit().map_err(io)?;

        Ok(message.id())
    }

    fn load_messages(&self, id: ConversationId) -> Result<Vec<Message>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(MESSAGES).map_err(io)?;

        let (start, end) = conversation_range(id);
        let mut messages = Vec::new();
        for result in table.range(start.as_slice()..=end.as_slice()).map_err(io)? {
            let (_, value) = result.map_err(io)?;
            messages.push(decode(value.value())?);
        }

        Ok(messages)
    }

    fn delete_messages(&self, id: ConversationId) -> Result<usize, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let deleted = {
            let mut messages = txn.open_table(MESSAGES).map_err(io)?;
            let mut index = txn.open_table(MESSAGE_INDEX).map_err(io)?;
            remove_conversation_messages(&mut messages, &mut index, id)?
        };

        txn.commit().map_err(io)?;

        Ok(deleted)
    }

    fn mark_seen(&self, id: ConversationId, reader: UserId) -> Result<usize, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let updated = {
            let mut table = txn.open_table(MESSAGES).map_err(io)?;

            let (start, end) = conversation_range(id);
            let mut pending = Vec::new();
            for result in table.range(start.as_slice()..=end.as_slice()).map_err(io)? {
                let (key, value) = result.map_err(io)?;
                let mut message: Message = decode(value.value())?;
                if message.sender() != reader && message.mark_seen_by(reader) {
                    pending.push((key.value().to_vec(), message));
                }
            }

            for (key, message) in &pending {
                let bytes = encode(message)?;
                table.insert(key.as_slice(), bytes.as_slice()).map_err(io)?;
            }

            pending.len()
        };

        txn.commit().map_err(io)?;

        Ok(updated)
    }
}

fn read_conversation<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
    id: ConversationId,
) -> Result<Option<Conversation>, StorageError> {
    match table.get(id.to_be_bytes().as_slice()).map_err(io)? {
        Some(value) => Ok(Some(decode(value.value())?)),
        None => Ok(None),
    }
}

fn remove_conversation_messages(
    messages: &mut redb::Table<'_, &'static [u8], &'static [u8]>,
    index: &mut redb::Table<'_, &'static [u8], &'static [u8]>,
    id: ConversationId,
) -> Result<usize, StorageError> {
    let (start, end) = conversation_range(id);

    let mut keys = Vec::new();
    for result in messages.range(start.as_slice()..=end.as_slice()).map_err(io)? {
        let (key, _) = result.map_err(io)?;
        keys.push(key.value().to_vec());
    }

    for key in &keys {
        messages.remove(key.as_slice()).map_err(io)?;
        index.remove(&key[MESSAGE_ID_OFFSET..]).map_err(io)?;
    }

    Ok(keys.len())
}

/// Encode a message's position as a 48-byte key.
///
/// Layout: [conversation_id: 16 BE][created_at micros, sign bit flipped: 8 BE]
/// [sequence: 8 BE][message_id: 16 BE]. Flipping the sign bit makes
/// lexicographic order match numeric order for negative timestamps too.
fn encode_message_key(message: &Message, sequence: u64) -> [u8; MESSAGE_KEY_LEN] {
    let micros = message.created_at().timestamp_micros();
    let ordered = (micros as u64) ^ (1 << 63);

    let mut key = [0u8; MESSAGE_KEY_LEN];
    key[..16].copy_from_slice(&message.conversation_id().to_be_bytes());
    key[16..24].copy_from_slice(&ordered.to_be_bytes());
    key[24..MESSAGE_ID_OFFSET].copy_from_slice(&sequence.to_be_bytes());
    key[MESSAGE_ID_OFFSET..].copy_from_slice(&message.id().to_be_bytes());
    key
}

/// Inclusive key range covering every message of a conversation.
fn conversation_range(id: ConversationId) -> ([u8; MESSAGE_KEY_LEN], [u8; MESSAGE_KEY_LEN]) {
    let mut start = [0u8; MESSAGE_KEY_LEN];
    let mut end = [0xFFu8; MESSAGE_KEY_LEN];
    start[..16].copy_from_slice(&id.to_be_bytes());
    end[..16].copy_from_slice(&id.to_be_bytes());
    (start, end)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn io(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}
