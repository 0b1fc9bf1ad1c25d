//! Environment abstraction for deterministic testing.
//!
//! Decouples gateway logic from system resources (wall clock, randomness).
//! Production uses the OS clock and RNG; tests use a seeded RNG and a clock
//! that only moves when told to, which is how autodestruct deadlines are
//! exercised without sleeping.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Entropy source could not fill a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("random source failed: {0}")]
pub struct EntropyError(pub String);

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production;
///   DEKs and nonces are drawn from it
/// - `random_bytes()` is safe to call from many threads without external
///   coordination
/// - Write paths draw through [`try_random_bytes`](Self::try_random_bytes),
///   so an entropy failure fails that request instead of the worker
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    ///
    /// Stored in records (`created_at`, `autodestruct_at`), so it must be
    /// wall time rather than a monotonic instant.
    fn now(&self) -> DateTime<Utc>;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Fills the provided buffer, reporting a failing entropy source.
    ///
    /// Defaults to [`random_bytes`](Self::random_bytes) for sources that
    /// cannot fail.
    fn try_random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        self.random_bytes(buffer);
        Ok(())
    }

    /// Generates a random `u128`.
    ///
    /// Used for conversation and message identifiers.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Fallible form of [`random_u128`](Self::random_u128).
    fn try_random_u128(&self) -> Result<u128, EntropyError> {
        let mut bytes = [0u8; 16];
        self.try_random_bytes(&mut bytes)?;
        Ok(u128::from_be_bytes(bytes))
    }
}
