//! Cinder core: encrypted conversations that self-destruct.
//!
//! Members of a conversation exchange text messages. Every message is stored
//! as an envelope (see `cinder-crypto`) whose AAD binds it to its
//! conversation and sender. A conversation may be armed to purge all of its
//! messages a few minutes from now; the deadline is checked whenever the
//! conversation is accessed.
//!
//! # Architecture
//!
//! ```text
//! ConversationGateway<E, S, K>
//!   |-- Environment (E)      clock + CSPRNG
//!   |-- Storage (S)          conversations, envelopes, conditional purge
//!   |-- EnvelopeCipher<K>    seal/open under the KeyProvider's KEKs
//!   `-- autodestruct          pure state machine over (deadline, now)
//! ```
//!
//! The core is synchronous and owns no threads or timers. Each request runs
//! on the caller's worker.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aad;
pub mod autodestruct;
pub mod cipher;
pub mod env;
pub mod error;
pub mod gateway;
pub mod model;
pub mod storage;

pub use aad::message_aad;
pub use autodestruct::{
    AutodestructAction, AutodestructDelay, AutodestructState, InvalidDelay, deadline_after,
    evaluate,
};
pub use cipher::EnvelopeCipher;
pub use env::{EntropyError, Environment};
pub use error::GatewayError;
pub use gateway::{
    ArmedAutodestruct, ConversationGateway, DECRYPTION_PLACEHOLDER, MAX_TITLE_LEN, MessageBody,
    MessageView, PostedMessage, UnreadableReason,
};
pub use model::{Conversation, ConversationId, Message, MessageId, MessageMeta, ParseIdError, UserId};
pub use storage::{
    ChaoticStorage, MemoryStorage, PurgeOutcome, RedbStorage, Storage, StorageError,
};
