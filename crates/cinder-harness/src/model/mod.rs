//! Reference model for model-based testing.
//!
//! [`ModelWorld`] is a plain-data rendition of the gateway's observable
//! behavior: membership checks, on-access purge, delay gating and message
//! order. Tests apply the same [`Operation`] sequence to the model and to a
//! [`RealWorld`] gateway and compare the results.

mod operation;
mod real;
mod world;

pub use operation::{
    MODEL_CONVERSATIONS, MODEL_USERS, ModelConversationId, ModelUserId, Operation,
    OperationError, OperationResult, SMALL_TEXTS, SmallText,
};
pub use real::{RealWorld, user};
pub use world::ModelWorld;
