//! Reference model of the conversation gateway.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use super::operation::{
    MODEL_CONVERSATIONS, ModelUserId, Operation, OperationError, OperationResult,
};

#[derive(Debug, Clone)]
struct ModelMessage {
    sender: ModelUserId,
    text: String,
    seen_by: BTreeSet<ModelUserId>,
}

#[derive(Debug, Clone)]
struct ModelConversation {
    members: BTreeSet<ModelUserId>,
    deadline: Option<DateTime<Utc>>,
    messages: Vec<ModelMessage>,
}

/// Reference model: the whole system as plain data.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    now: DateTime<Utc>,
    conversations: Vec<ModelConversation>,
}

impl ModelWorld {
    /// Model starting at `now`, with the fixed conversations described on
    /// [`MODEL_CONVERSATIONS`].
    pub fn new(now: DateTime<Utc>) -> Self {
        let conversations = (0..MODEL_CONVERSATIONS)
            .map(|n| ModelConversation {
                members: [n, n + 1].into_iter().collect(),
                deadline: None,
                messages: Vec::new(),
            })
            .collect();

        Self { now, conversations }
    }

    /// Model clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Stored message count of a conversation, regardless of deadlines.
    pub fn stored_messages(&self, conversation: u8) -> usize {
        self.conversation(conversation).messages.len()
    }

    /// Stored deadline of a conversation.
    pub fn deadline(&self, conversation: u8) -> Option<DateTime<Utc>> {
        self.conversation(conversation).deadline
    }

    /// Apply an operation and return its observable result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        if let Operation::AdvanceTime { secs } = op {
            self.now += Duration::seconds(i64::from(*secs));
            return OperationResult::Advanced;
        }

        let Some((user, index)) = op.target() else {
            return OperationResult::Error(OperationError::Other);
        };
        let now = self.now;
        let conversation = &mut self.conversations[usize::from(index)];

        if !conversation.members.contains(&user) {
            return OperationResult::Error(OperationError::Forbidden);
        }

        if matches!(op, Operation::Arm { minutes, .. } if !matches!(*minutes, 1 | 3 | 5)) {
            return OperationResult::Error(OperationError::InvalidDelay);
        }

        if conversation.deadline.is_some_and(|deadline| now >= deadline) {
            conversation.deadline = None;
            conversation.messages.clear();
        }

        match op {
            Operation::Post { text, .. } => {
                if text.as_str().is_empty() {
                    return OperationResult::Error(OperationError::InvalidInput);
                }
                conversation.messages.push(ModelMessage {
                    sender: user,
                    text: text.as_str().to_string(),
                    seen_by: BTreeSet::new(),
                });
                OperationResult::Posted
            },
            Operation::Arm { minutes, .. } => {
                let deadline = now + Duration::minutes(i64::from(*minutes));
                conversation.deadline = Some(deadline);
                OperationResult::Armed(deadline)
            },
            Operation::List { .. } => OperationResult::Listed(
                conversation.messages.iter().map(|m| m.text.clone()).collect(),
            ),
            Operation::MarkSeen { .. } => OperationResult::Seen(
                conversation
                    .messages
                    .iter_mut()
                    .filter(|m| m.sender != user)
                    .map(|m| m.seen_by.insert(user))
                    .filter(|added| *added)
                    .count(),
            ),
            Operation::AdvanceTime { .. } => OperationResult::Advanced,
        }
    }

    fn conversation(&self, index: u8) -> &ModelConversation {
        &self.conversations[usize::from(index % MODEL_CONVERSATIONS)]
    }
}
