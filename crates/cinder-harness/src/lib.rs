//! Deterministic test harness for Cinder.
//!
//! - [`SimEnv`]: seeded ChaCha20 randomness and a manual clock
//! - fixtures: test key rings and gateways wired to a `SimEnv`
//! - [`model`]: reference model for model-based testing
//!
//! Autodestruct deadlines are minutes long; with `SimEnv` a test crosses one
//! by calling [`SimEnv::advance`] instead of sleeping.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod model;
pub mod sim_env;

pub use fixtures::{
    NEXT_KEK_ID, SimGateway, TEST_KEK_HEX, TEST_KEK_ID, impostor_keys, rotated_keys, sim_gateway,
    sim_gateway_with, test_keys,
};
pub use model::{
    MODEL_CONVERSATIONS, MODEL_USERS, ModelConversationId, ModelUserId, ModelWorld, Operation,
    OperationError, OperationResult, RealWorld, SMALL_TEXTS, SmallText,
};
pub use sim_env::{DEFAULT_SEED, SimEnv};
