//! Conversation and message records.
//!
//! A [`Message`] is immutable once built: its identity, context and envelope
//! have getters only. The sole mutable part is [`MessageMeta`], which never
//! touches cryptographic fields.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use cinder_crypto::Envelope;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failed to parse an identifier from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} identifier: {input:?}")]
pub struct ParseIdError {
    /// Which identifier was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub input: String,
}

macro_rules! hex_id {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u128);

        impl $name {
            /// Wrap a raw 128-bit identifier.
            pub const fn new(raw: u128) -> Self {
                Self(raw)
            }

            /// Raw 128-bit value.
            pub const fn get(self) -> u128 {
                self.0
            }

            /// Big-endian encoding, used for storage keys and AAD.
            pub const fn to_be_bytes(self) -> [u8; 16] {
                self.0.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:032x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            /// Parses exactly 32 hex characters.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let invalid = || ParseIdError { kind: $kind, input: s.to_string() };
                if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                u128::from_str_radix(s, 16).map(Self).map_err(|_| invalid())
            }
        }
    };
}

hex_id!(
    /// Opaque conversation identifier, rendered as 32 hex characters.
    ConversationId,
    "conversation"
);

hex_id!(
    /// Opaque message identifier, rendered as 32 hex characters.
    MessageId,
    "message"
);

/// Authenticated user identity, as supplied by the (external) auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Wrap a raw user identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Big-endian encoding, used in AAD.
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ParseIdError { kind: "user", input: s.to_string() })
    }
}

/// A group of members exchanging messages.
///
/// Members are fixed at creation. `autodestruct_at` is the only field that
/// changes afterwards, and only through arm and purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    id: ConversationId,
    title: String,
    members: BTreeSet<UserId>,
    created_at: DateTime<Utc>,
    autodestruct_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// New conversation with no autodestruct deadline.
    pub fn new(
        id: ConversationId,
        title: impl Into<String>,
        members: BTreeSet<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { id, title: title.into(), members, created_at, autodestruct_at: None }
    }

    /// Conversation identifier.
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Members, sorted.
    pub fn members(&self) -> &BTreeSet<UserId> {
        &self.members
    }

    /// True if `user` may read and write this conversation.
    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Pending destruction deadline, if armed.
    pub fn autodestruct_at(&self) -> Option<DateTime<Utc>> {
        self.autodestruct_at
    }

    pub(crate) fn set_autodestruct_at(&mut self, deadline: Option<DateTime<Utc>>) {
        self.autodestruct_at = deadline;
    }
}

/// Delivery annotations. Never part of the envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMeta {
    /// Members who have listed the conversation after this message arrived
    pub seen_by: BTreeSet<UserId>,
}

/// A stored, encrypted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    conversation_id: ConversationId,
    sender: UserId,
    created_at: DateTime<Utc>,
    envelope: Envelope,
    meta: MessageMeta,
}

impl Message {
    /// Build a record around a freshly sealed envelope.
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        sender: UserId,
        created_at: DateTime<Utc>,
        envelope: Envelope,
    ) -> Self {
        Self { id, conversation_id, sender, created_at, envelope, meta: MessageMeta::default() }
    }

    /// Message identifier.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Owning conversation.
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Authenticated sender.
    pub fn sender(&self) -> UserId {
        self.sender
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Encrypted body.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Delivery annotations.
    pub fn meta(&self) -> &MessageMeta {
        &self.meta
    }

    /// Record `reader` as having seen this message. Returns false if already
    /// recorded.
    pub(crate) fn mark_seen_by(&mut self, reader: UserId) -> bool {
        self.meta.seen_by.insert(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_display_is_fixed_width_hex() {
        let id = ConversationId::new(0xabc);
        assert_eq!(id.to_string(), "00000000000000000000000000000abc");
    }

    #[test]
    fn conversation_id_parses_its_display_form() {
        let id = ConversationId::new(0x1234_5678_90ab_cdef_1234_5678_90ab_cdef);
        assert_eq!(id.to_string().parse::<ConversationId>().unwrap(), id);
    }

    #[test]
    fn conversation_id_rejects_short_or_signed_input() {
        assert!("abc".parse::<ConversationId>().is_err());
        assert!(format!("+{}", "0".repeat(31)).parse::<ConversationId>().is_err());
        assert!("g".repeat(32).parse::<MessageId>().is_err());
    }

    #[test]
    fn user_id_parses_decimal() {
        assert_eq!("42".parse::<UserId>().unwrap(), UserId::new(42));
        assert!("-1".parse::<UserId>().is_err());
    }

    #[test]
    fn membership_check() {
        let members = [UserId::new(1), UserId::new(2)].into_iter().collect();
        let conversation = Conversation::new(
            ConversationId::new(1),
            "1, 2",
            members,
            DateTime::<Utc>::UNIX_EPOCH,
        );

        assert!(conversation.is_member(UserId::new(1)));
        assert!(!conversation.is_member(UserId::new(3)));
        assert_eq!(conversation.autodestruct_at(), None);
    }
}
