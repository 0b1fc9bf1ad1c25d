//! Operations for model-based testing.
//!
//! Operations are generated randomly (by proptest or a fuzzer) and applied to
//! both the model and the real gateway. Identifiers are small indices so
//! generated sequences hit the same conversations often.

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};

/// User index (0-indexed, reduced modulo [`MODEL_USERS`]).
pub type ModelUserId = u8;

/// Conversation index (reduced modulo [`MODEL_CONVERSATIONS`]).
pub type ModelConversationId = u8;

/// Users in the model world. User `n` maps to `UserId::new(n + 1)`.
pub const MODEL_USERS: u8 = 3;

/// Conversations in the model world.
///
/// Conversation 0 has members {0, 1}; conversation 1 has members {1, 2}.
/// User 2 is an outsider to conversation 0 and user 0 to conversation 1.
pub const MODEL_CONVERSATIONS: u8 = 2;

/// Texts a generated message may carry. The empty one is rejected; the
/// whitespace-only one is stored like any other text.
pub const SMALL_TEXTS: [&str; 6] = ["hello", "", "second", "   ", "ünïcødé", "x"];

/// Index into [`SMALL_TEXTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct SmallText(pub u8);

impl SmallText {
    /// The text this index selects.
    pub fn as_str(self) -> &'static str {
        SMALL_TEXTS[usize::from(self.0) % SMALL_TEXTS.len()]
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Post a message.
    Post {
        /// Caller
        user: ModelUserId,
        /// Target conversation
        conversation: ModelConversationId,
        /// Body
        text: SmallText,
    },

    /// Arm autodestruct with a delay that may be invalid.
    Arm {
        /// Caller
        user: ModelUserId,
        /// Target conversation
        conversation: ModelConversationId,
        /// Delay in minutes; only 1, 3 and 5 are accepted
        minutes: u8,
    },

    /// List messages.
    List {
        /// Caller
        user: ModelUserId,
        /// Target conversation
        conversation: ModelConversationId,
    },

    /// Mark messages seen.
    MarkSeen {
        /// Caller
        user: ModelUserId,
        /// Target conversation
        conversation: ModelConversationId,
    },

    /// Advance simulated time.
    AdvanceTime {
        /// Seconds to advance
        secs: u16,
    },
}

impl Operation {
    /// Caller and conversation reduced into range. `None` for time steps.
    pub fn target(&self) -> Option<(ModelUserId, ModelConversationId)> {
        match self {
            Self::Post { user, conversation, .. }
            | Self::Arm { user, conversation, .. }
            | Self::List { user, conversation }
            | Self::MarkSeen { user, conversation } => {
                Some((user % MODEL_USERS, conversation % MODEL_CONVERSATIONS))
            },
            Self::AdvanceTime { .. } => None,
        }
    }
}

/// Observable result of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Message stored
    Posted,
    /// Texts listed, oldest first
    Listed(Vec<String>),
    /// Deadline armed
    Armed(DateTime<Utc>),
    /// Number of messages newly marked seen
    Seen(usize),
    /// Clock advanced
    Advanced,
    /// Request rejected
    Error(OperationError),
}

/// Rejection classes shared by the model and the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Caller is not a member
    Forbidden,
    /// Blank message text
    InvalidInput,
    /// Delay not in {1, 3, 5}
    InvalidDelay,
    /// Any other failure (should not occur)
    Other,
}
