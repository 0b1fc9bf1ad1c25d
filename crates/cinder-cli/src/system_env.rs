//! Production Environment implementation using the system clock and OS RNG.
//!
//! `SystemEnv` is stateless: `getrandom` is safe to call from any number of
//! threads without coordination, so one value can be shared by every worker.

use chrono::{DateTime, Utc};
use cinder_core::{EntropyError, Environment};

/// Production environment using wall-clock time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Every DEK,
/// nonce and identifier is drawn from it.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. Message writes draw through
/// `try_random_bytes`, which reports the failure so the request fails with
/// an encryption error instead.
#[derive(Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("OS RNG failed");
    }

    fn try_random_bytes(&self, buffer: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(buffer).map_err(|err| EntropyError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_are_not_constant() {
        let env = SystemEnv::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);

        assert_ne!(a, b);
    }

    #[test]
    fn fallible_draw_fills_the_buffer() {
        let env = SystemEnv::new();
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.try_random_bytes(&mut a).unwrap();
        env.try_random_bytes(&mut b).unwrap();

        assert_ne!(a, b);
        assert_ne!(env.try_random_u128().unwrap(), env.try_random_u128().unwrap());
    }

    #[test]
    fn clock_does_not_run_backwards() {
        let env = SystemEnv::new();
        let first = env.now();
        assert!(env.now() >= first);
    }
}
