//! Autodestruct state machine.
//!
//! Pure functions over `(autodestruct_at, now)`. Nothing here touches
//! storage; the gateway executes the returned [`AutodestructAction`] through
//! [`Storage::purge_expired`](crate::storage::Storage::purge_expired).
//!
//! ```text
//!            arm(d)               now >= d             purge
//! Inactive --------> Armed(d) -----------> Elapsed(d) ------> Inactive
//!                     |    ^
//!                     +----+ arm(d') overwrites
//! ```
//!
//! Deadlines are evaluated only when a conversation is accessed. A
//! conversation nobody touches keeps its messages past the deadline until the
//! next access.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{Conversation, ConversationId};

/// Delay accepted by [`arm`](crate::ConversationGateway::arm_autodestruct).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutodestructDelay {
    /// One minute
    OneMinute,
    /// Three minutes
    ThreeMinutes,
    /// Five minutes
    FiveMinutes,
}

/// Delay outside the allowed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("autodestruct delay must be 1, 3 or 5 minutes, got {minutes}")]
pub struct InvalidDelay {
    /// Rejected value
    pub minutes: i64,
}

impl AutodestructDelay {
    /// Every allowed delay, shortest first.
    pub const ALL: [Self; 3] = [Self::OneMinute, Self::ThreeMinutes, Self::FiveMinutes];

    /// Parse a delay given in whole minutes.
    pub fn from_minutes(minutes: i64) -> Result<Self, InvalidDelay> {
        match minutes {
            1 => Ok(Self::OneMinute),
            3 => Ok(Self::ThreeMinutes),
            5 => Ok(Self::FiveMinutes),
            _ => Err(InvalidDelay { minutes }),
        }
    }

    /// Delay in minutes.
    pub fn minutes(self) -> i64 {
        match self {
            Self::OneMinute => 1,
            Self::ThreeMinutes => 3,
            Self::FiveMinutes => 5,
        }
    }

    /// Delay as a duration.
    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }
}

impl TryFrom<i64> for AutodestructDelay {
    type Error = InvalidDelay;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        Self::from_minutes(minutes)
    }
}

impl fmt::Display for AutodestructDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Autodestruct state of one conversation at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutodestructState {
    /// No deadline
    Inactive,
    /// Deadline set and still in the future
    Armed {
        /// When the conversation's messages become due for purge
        deadline: DateTime<Utc>,
    },
    /// Deadline reached; purge pending
    Elapsed {
        /// Deadline that elapsed. Guards the conditional purge.
        deadline: DateTime<Utc>,
    },
}

impl AutodestructState {
    /// Classify `autodestruct_at` relative to `now`. A deadline equal to
    /// `now` has elapsed.
    pub fn at(autodestruct_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match autodestruct_at {
            None => Self::Inactive,
            Some(deadline) if now >= deadline => Self::Elapsed { deadline },
            Some(deadline) => Self::Armed { deadline },
        }
    }
}

/// Work the caller must perform after evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutodestructAction {
    /// Delete every message and clear the deadline, if the stored deadline
    /// still equals `deadline`.
    Purge {
        /// Conversation to purge
        conversation_id: ConversationId,
        /// Deadline read before purging
        deadline: DateTime<Utc>,
    },
}

/// Evaluate a conversation's deadline.
///
/// Returns `None` for `Inactive` and `Armed`. Evaluating the same conversation
/// twice yields the same action; the conditional purge makes the second one a
/// no-op.
pub fn evaluate(conversation: &Conversation, now: DateTime<Utc>) -> Option<AutodestructAction> {
    match AutodestructState::at(conversation.autodestruct_at(), now) {
        AutodestructState::Elapsed { deadline } => Some(AutodestructAction::Purge {
            conversation_id: conversation.id(),
            deadline,
        }),
        AutodestructState::Inactive | AutodestructState::Armed { .. } => None,
    }
}

/// Deadline produced by arming at `now`. Always strictly after `now`.
pub fn deadline_after(now: DateTime<Utc>, delay: AutodestructDelay) -> DateTime<Utc> {
    now + delay.duration()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn conversation(autodestruct_at: Option<DateTime<Utc>>) -> Conversation {
        let mut conversation =
            Conversation::new(ConversationId::new(9), "t", BTreeSet::new(), at(0));
        conversation.set_autodestruct_at(autodestruct_at);
        conversation
    }

    #[test]
    fn only_one_three_and_five_minutes_are_accepted() {
        for minutes in -2..=10 {
            let parsed = AutodestructDelay::from_minutes(minutes);
            assert_eq!(parsed.is_ok(), matches!(minutes, 1 | 3 | 5), "minutes = {minutes}");
        }
        assert_eq!(AutodestructDelay::try_from(3).unwrap().minutes(), 3);
        assert_eq!(
            AutodestructDelay::from_minutes(2).unwrap_err(),
            InvalidDelay { minutes: 2 }
        );
    }

    #[test]
    fn deadline_equal_to_now_has_elapsed() {
        let deadline = at(100);

        assert_eq!(AutodestructState::at(None, at(100)), AutodestructState::Inactive);
        assert_eq!(
            AutodestructState::at(Some(deadline), at(99)),
            AutodestructState::Armed { deadline }
        );
        assert_eq!(
            AutodestructState::at(Some(deadline), at(100)),
            AutodestructState::Elapsed { deadline }
        );
    }

    #[test]
    fn evaluate_only_acts_on_elapsed() {
        assert_eq!(evaluate(&conversation(None), at(1_000)), None);
        assert_eq!(evaluate(&conversation(Some(at(500))), at(499)), None);
        assert_eq!(
            evaluate(&conversation(Some(at(500))), at(501)),
            Some(AutodestructAction::Purge {
                conversation_id: ConversationId::new(9),
                deadline: at(500),
            })
        );
    }

    #[test]
    fn arming_adds_delay() {
        assert_eq!(deadline_after(at(0), AutodestructDelay::OneMinute), at(60));
        assert_eq!(deadline_after(at(0), AutodestructDelay::FiveMinutes), at(300));
    }

    proptest! {
        #[test]
        fn fresh_deadline_is_never_elapsed(
            now_secs in 0i64..4_000_000_000,
            index in 0usize..3,
        ) {
            let now = at(now_secs);
            let deadline = deadline_after(now, AutodestructDelay::ALL[index]);

            prop_assert!(deadline > now);
            prop_assert_eq!(evaluate(&conversation(Some(deadline)), now), None);
        }
    }
}
