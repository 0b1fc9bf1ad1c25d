//! Conversation gateway
//!
//! Orchestrates every request against a conversation:
//!
//! ```text
//! load -> membership -> autodestruct evaluation -> operation
//! ```
//!
//! Autodestruct is evaluated lazily, on each access, before the operation
//! reads or writes messages. An elapsed deadline is executed as a conditional
//! purge guarded by the deadline that was read, so concurrent requests racing
//! past the same deadline delete each message once in total.
//!
//! Callers are authenticated upstream. The gateway trusts `caller` and binds
//! it into the AAD of every message it writes; it never takes a sender
//! identity from anywhere else.

use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use cinder_crypto::{CryptoError, KeyProvider};

use crate::{
    aad::message_aad,
    autodestruct::{self, AutodestructAction, AutodestructDelay},
    cipher::EnvelopeCipher,
    env::Environment,
    error::GatewayError,
    model::{Conversation, ConversationId, Message, MessageId, UserId},
    storage::{PurgeOutcome, Storage},
};

/// Text rendered in place of a message that cannot be decrypted.
pub const DECRYPTION_PLACEHOLDER: &str = "Decryption Error";

/// Longest accepted conversation title, in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Why a stored message could not be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadableReason {
    /// Wrapped key or ciphertext failed authentication, including an envelope
    /// moved to another conversation or sender
    Authentication,
    /// Envelope names a KEK the key provider does not hold
    UnknownKey,
    /// Envelope names an algorithm other than AES-256-GCM
    UnsupportedAlgorithm,
    /// Authenticated plaintext is not UTF-8
    InvalidUtf8,
}

/// Body of a listed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Decrypted text
    Text(String),
    /// Record present but unreadable
    Unreadable {
        /// Failure class
        reason: UnreadableReason,
    },
}

/// One listed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Message identifier
    pub id: MessageId,
    /// Sender bound into the envelope
    pub sender: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Decrypted body or failure marker
    pub body: MessageBody,
    /// Members who marked the message seen
    pub seen_by: BTreeSet<UserId>,
}

impl MessageView {
    /// Text to display: the plaintext, or [`DECRYPTION_PLACEHOLDER`].
    pub fn text(&self) -> &str {
        match &self.body {
            MessageBody::Text(text) => text,
            MessageBody::Unreadable { .. } => DECRYPTION_PLACEHOLDER,
        }
    }

    /// True if the body decrypted.
    pub fn is_readable(&self) -> bool {
        matches!(self.body, MessageBody::Text(_))
    }
}

/// Receipt for a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostedMessage {
    /// New message identifier
    pub id: MessageId,
    /// Authenticated sender
    pub sender: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Receipt for an armed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmedAutodestruct {
    /// Conversation armed
    pub conversation_id: ConversationId,
    /// When its messages become due for purge
    pub autodestruct_at: DateTime<Utc>,
}

/// Entry point for every conversation operation.
///
/// Generic over environment, storage and key provider so the same logic runs
/// against the OS clock and redb in production and against a simulated clock
/// and in-memory storage in tests. Holds no per-request state; share it
/// between workers behind an `Arc`.
pub struct ConversationGateway<E: Environment, S: Storage, K: KeyProvider> {
    env: E,
    storage: S,
    cipher: EnvelopeCipher<K>,
}

impl<E: Environment, S: Storage, K: KeyProvider> ConversationGateway<E, S, K> {
    /// Create a gateway. `keys` is validated configuration, built once at
    /// startup.
    pub fn new(env: E, storage: S, keys: K) -> Self {
        Self { env, storage, cipher: EnvelopeCipher::new(keys) }
    }

    /// Environment in use.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Storage backend in use.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Create a conversation. `caller` is always a member.
    ///
    /// Without a title (or with a blank one) the title is the sorted member
    /// list joined with ", ", cut to [`MAX_TITLE_LEN`] characters.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: explicit title longer than [`MAX_TITLE_LEN`]
    /// - `Storage`
    pub fn create_conversation(
        &self,
        caller: UserId,
        members: impl IntoIterator<Item = UserId>,
        title: Option<&str>,
    ) -> Result<Conversation, GatewayError> {
        let mut members: BTreeSet<UserId> = members.into_iter().collect();
        members.insert(caller);

        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) if title.chars().count() > MAX_TITLE_LEN => {
                return Err(GatewayError::InvalidInput {
                    reason: format!("title exceeds {MAX_TITLE_LEN} characters"),
                });
            },
            Some(title) => title.to_string(),
            None => default_title(&members),
        };

        let conversation = Conversation::new(
            ConversationId::new(self.env.random_u128()),
            title,
            members,
            self.env.now(),
        );
        self.storage.create_conversation(&conversation)?;

        tracing::info!(
            conversation_id = %conversation.id(),
            creator = %caller,
            members = conversation.members().len(),
            "Created conversation"
        );

        Ok(conversation)
    }

    /// Conversations `caller` belongs to, newest first.
    ///
    /// Read-only: deadlines are reported for countdown display but not
    /// evaluated here.
    pub fn list_conversations(&self, caller: UserId) -> Result<Vec<Conversation>, GatewayError> {
        Ok(self.storage.list_conversations(caller)?)
    }

    /// Decrypt and list a conversation's messages, oldest first.
    ///
    /// A message that fails to decrypt is listed with
    /// [`MessageBody::Unreadable`], never dropped and never as partial
    /// plaintext.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`, `Forbidden`
    /// - `Storage`: any storage failure, including during the purge
    /// - `Crypto`: key provider failure that is not about one record
    pub fn list_messages(
        &self,
        conversation_id: ConversationId,
        caller: UserId,
    ) -> Result<Vec<MessageView>, GatewayError> {
        let conversation = self.authorize(conversation_id, caller)?;
        self.enforce_autodestruct(&conversation, self.env.now())?;

        let messages = self.storage.load_messages(conversation_id)?;

        messages.into_iter().map(|message| self.view(conversation_id, message)).collect()
    }

    /// Encrypt and store a message from `caller`.
    ///
    /// Whitespace is content: only the empty string is rejected. The stored
    /// `created_at` is truncated to microseconds.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`, `Forbidden`
    /// - `InvalidInput`: text is empty
    /// - `Crypto`: random source, key provider or cipher failed; nothing was
    ///   stored
    /// - `Storage`
    pub fn post_message(
        &self,
        conversation_id: ConversationId,
        caller: UserId,
        text: &str,
    ) -> Result<PostedMessage, GatewayError> {
        let conversation = self.authorize(conversation_id, caller)?;
        let now = self.env.now();
        self.enforce_autodestruct(&conversation, now)?;

        if text.is_empty() {
            return Err(GatewayError::InvalidInput { reason: "message text is empty".to_string() });
        }

        let aad = message_aad(conversation_id, caller);
        let envelope = self.cipher.encrypt(text.as_bytes(), &aad, &self.env)?;

        let message_id = self
            .env
            .try_random_u128()
            .map_err(|err| CryptoError::Encryption { reason: err.to_string() })?;
        // Storage orders by microsecond
        let created_at = now.trunc_subsecs(6);
        let message =
            Message::new(MessageId::new(message_id), conversation_id, caller, created_at, envelope);
        let id = self.storage.store_message(&message)?;

        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %id,
            sender = %caller,
            kek_id = %message.envelope().kek_id,
            "Stored message"
        );

        Ok(PostedMessage { id, sender: caller, created_at })
    }

    /// Arm (or re-arm) the conversation's autodestruct deadline at
    /// `now + delay_minutes`.
    ///
    /// An already elapsed deadline is purged first, so re-arming never
    /// rescues messages that were due.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`, `Forbidden`
    /// - `InvalidDelay`: not 1, 3 or 5; nothing was changed
    /// - `Storage`
    pub fn arm_autodestruct(
        &self,
        conversation_id: ConversationId,
        caller: UserId,
        delay_minutes: i64,
    ) -> Result<ArmedAutodestruct, GatewayError> {
        let conversation = self.authorize(conversation_id, caller)?;
        let delay = AutodestructDelay::from_minutes(delay_minutes)?;

        let now = self.env.now();
        self.enforce_autodestruct(&conversation, now)?;

        let deadline = autodestruct::deadline_after(now, delay);
        self.storage.set_autodestruct(conversation_id, Some(deadline))?;

        tracing::info!(
            conversation_id = %conversation_id,
            armed_by = %caller,
            delay = %delay,
            deadline = %deadline,
            "Armed autodestruct"
        );

        Ok(ArmedAutodestruct { conversation_id, autodestruct_at: deadline })
    }

    /// Mark every message `caller` did not send as seen by `caller`.
    /// Returns how many messages gained the mark.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound`, `Forbidden`
    /// - `Storage`
    pub fn mark_seen(
        &self,
        conversation_id: ConversationId,
        caller: UserId,
    ) -> Result<usize, GatewayError> {
        let conversation = self.authorize(conversation_id, caller)?;
        self.enforce_autodestruct(&conversation, self.env.now())?;

        Ok(self.storage.mark_seen(conversation_id, caller)?)
    }

    fn authorize(
        &self,
        conversation_id: ConversationId,
        caller: UserId,
    ) -> Result<Conversation, GatewayError> {
        let conversation = self
            .storage
            .load_conversation(conversation_id)?
            .ok_or(GatewayError::ConversationNotFound(conversation_id))?;

        if !conversation.is_member(caller) {
            tracing::warn!(
                conversation_id = %conversation_id,
                user = %caller,
                "Rejected non-member"
            );
            return Err(GatewayError::Forbidden { conversation_id, user: caller });
        }

        Ok(conversation)
    }

    fn enforce_autodestruct(
        &self,
        conversation: &Conversation,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let Some(AutodestructAction::Purge { conversation_id, deadline }) =
            autodestruct::evaluate(conversation, now)
        else {
            return Ok(());
        };

        match self.storage.purge_expired(conversation_id, deadline)? {
            PurgeOutcome::Purged { deleted } => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    deadline = %deadline,
                    deleted,
                    "Autodestruct purged conversation"
                );
            },
            PurgeOutcome::Skipped => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    deadline = %deadline,
                    "Autodestruct purge skipped, deadline already handled"
                );
            },
        }

        Ok(())
    }

    fn view(
        &self,
        conversation_id: ConversationId,
        message: Message,
    ) -> Result<MessageView, GatewayError> {
        let aad = message_aad(conversation_id, message.sender());

        let body = match self.cipher.decrypt(message.envelope(), &aad) {
            Ok(plaintext) => match String::from_utf8(plaintext) {
                Ok(text) => MessageBody::Text(text),
                Err(_) => MessageBody::Unreadable { reason: UnreadableReason::InvalidUtf8 },
            },
            Err(err) if err.is_record_error() => {
                let reason = match err {
                    CryptoError::KeyNotFound { .. } => UnreadableReason::UnknownKey,
                    _ if !self.cipher.supports(message.envelope()) => {
                        UnreadableReason::UnsupportedAlgorithm
                    },
                    _ => UnreadableReason::Authentication,
                };
                MessageBody::Unreadable { reason }
            },
            Err(err) => return Err(err.into()),
        };

        if let MessageBody::Unreadable { reason } = &body {
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %message.id(),
                kek_id = %message.envelope().kek_id,
                ?reason,
                "Message unreadable, rendering placeholder"
            );
        }

        Ok(MessageView {
            id: message.id(),
            sender: message.sender(),
            created_at: message.created_at(),
            body,
            seen_by: message.meta().seen_by.clone(),
        })
    }
}

fn default_title(members: &BTreeSet<UserId>) -> String {
    let joined = members.iter().map(UserId::to_string).collect::<Vec<_>>().join(", ");
    joined.chars().take(MAX_TITLE_LEN).collect()
}
