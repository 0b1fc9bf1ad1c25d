//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations. Used to check that the
//! gateway surfaces storage faults as errors and never as placeholders or
//! silently empty listings.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use chrono::{DateTime, Utc};

use super::{PurgeOutcome, Storage, StorageError};
use crate::model::{Conversation, ConversationId, Message, MessageId, UserId};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but fails operations
/// with probability `failure_rate`, before the inner call, so a failed
/// operation never has a partial effect. Clones share the RNG.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
}

/// Linear congruential generator. Reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| StorageError::Io("chaotic rng mutex poisoned".to_string()))?;
        if rng.next() < self.failure_rate {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn create_conversation(&self, conversation: &Conversation) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.create_conversation(conversation)
    }

    fn load_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        self.inject()?;
        self.inner.load_conversation(id)
    }

    fn list_conversations(&self, member: UserId) -> Result<Vec<Conversation>, StorageError> {
        self.inject()?;
        self.inner.list_conversations(member)
    }

    fn set_autodestruct(
        &self,
        id: ConversationId,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.set_autodestruct(id, deadline)
    }

    fn purge_expired(
        &self,
        id: ConversationId,
        expected: DateTime<Utc>,
    ) -> Result<PurgeOutcome, StorageError> {
        self.inject()?;
        self.inner.purge_expired(id, expected)
    }

    fn store_message(&self, message: &Message) -> Result<MessageId, StorageError> {
        self.inject()?;
        self.inner.store_message(message)
    }

    fn load_messages(&self, id: ConversationId) -> Result<Vec<Message>, StorageError> {
        self.inject()?;
        self.inner.load_messages(id)
    }

    fn delete_messages(&self, id: ConversationId) -> Result<usize, StorageError> {
        self.inject()?;
        self.inner.delete_messages(id)
    }

    fn mark_seen(&self, id: ConversationId, reader: UserId) -> Result<usize, StorageError> {
        self.inject()?;
        self.inner.mark_seen(id, reader)
    }
}
