//! Real gateway driven through the model's operations.

use chrono::Duration;
use cinder_core::{ConversationId, GatewayError, MemoryStorage, Storage, UserId};

use super::operation::{MODEL_CONVERSATIONS, Operation, OperationError, OperationResult};
use crate::{
    fixtures::{SimGateway, sim_gateway_with, test_keys},
    sim_env::SimEnv,
};

/// Gateway over a [`SimEnv`] that answers [`Operation`]s the way
/// [`ModelWorld`](super::ModelWorld) does.
///
/// Model user `n` is [`UserId`] `n + 1`; model conversation `n` has members
/// `n` and `n + 1`.
pub struct RealWorld<S: Storage = MemoryStorage> {
    env: SimEnv,
    gateway: SimGateway<S>,
    conversations: Vec<ConversationId>,
}

impl RealWorld {
    /// In-memory world seeded with `seed`.
    ///
    /// # Panics
    ///
    /// Never in practice; in-memory conversation creation does not fail.
    #[allow(clippy::expect_used)]
    pub fn new(seed: u64) -> Self {
        Self::with_storage(SimEnv::with_seed(seed), MemoryStorage::new())
            .expect("in-memory setup succeeds")
    }
}

impl<S: Storage> RealWorld<S> {
    /// World over `storage`, creating the model's conversations.
    ///
    /// # Errors
    ///
    /// Whatever the gateway reports while creating the conversations.
    pub fn with_storage(env: SimEnv, storage: S) -> Result<Self, GatewayError> {
        let gateway = sim_gateway_with(&env, storage, test_keys());

        let conversations = (0..MODEL_CONVERSATIONS)
            .map(|n| Ok(gateway.create_conversation(user(n), [user(n + 1)], None)?.id()))
            .collect::<Result<Vec<_>, GatewayError>>()?;

        Ok(Self { env, gateway, conversations })
    }

    /// Shared simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Underlying gateway.
    pub fn gateway(&self) -> &SimGateway<S> {
        &self.gateway
    }

    /// Real identifiers of the model's conversations, by model index.
    pub fn conversations(&self) -> &[ConversationId] {
        &self.conversations
    }

    /// Apply one operation. Errors are classified rather than returned.
    pub fn apply(&self, op: &Operation) -> OperationResult {
        if let Operation::AdvanceTime { secs } = op {
            self.env.advance(Duration::seconds(i64::from(*secs)));
            return OperationResult::Advanced;
        }
        let Some((model_user, index)) = op.target() else {
            return OperationResult::Error(OperationError::Other);
        };
        let caller = user(model_user);
        let id = self.conversations[usize::from(index)];

        let result = match op {
            Operation::Post { text, .. } => {
                self.gateway.post_message(id, caller, text.as_str()).map(|_| OperationResult::Posted)
            },
            Operation::Arm { minutes, .. } => self
                .gateway
                .arm_autodestruct(id, caller, i64::from(*minutes))
                .map(|armed| OperationResult::Armed(armed.autodestruct_at)),
            Operation::List { .. } => self.gateway.list_messages(id, caller).map(|views| {
                OperationResult::Listed(views.iter().map(|v| v.text().to_string()).collect())
            }),
            Operation::MarkSeen { .. } => {
                self.gateway.mark_seen(id, caller).map(OperationResult::Seen)
            },
            Operation::AdvanceTime { .. } => Ok(OperationResult::Advanced),
        };

        result.unwrap_or_else(|err| OperationResult::Error(classify(&err)))
    }
}

/// Real user behind model user `model_user`.
pub fn user(model_user: u8) -> UserId {
    UserId::new(u64::from(model_user) + 1)
}

fn classify(err: &GatewayError) -> OperationError {
    match err {
        GatewayError::Forbidden { .. } => OperationError::Forbidden,
        GatewayError::InvalidInput { .. } => OperationError::InvalidInput,
        GatewayError::InvalidDelay(_) => OperationError::InvalidDelay,
        _ => OperationError::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SmallText;

    #[test]
    fn conversations_follow_membership_layout() {
        let world = RealWorld::new(1);
        for (n, id) in world.conversations().iter().enumerate() {
            let stored = world.gateway().storage().load_conversation(*id).unwrap().unwrap();
            let n = n as u8;
            assert!(stored.is_member(user(n)));
            assert!(stored.is_member(user(n + 1)));
            assert_eq!(stored.members().len(), 2);
        }
    }

    #[test]
    fn outsider_post_is_forbidden() {
        let world = RealWorld::new(2);
        // Model user 2 is not in conversation 0
        let op = Operation::Post { user: 2, conversation: 0, text: SmallText(0) };
        assert_eq!(world.apply(&op), OperationResult::Error(OperationError::Forbidden));
    }
}
