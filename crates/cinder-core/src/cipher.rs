//! Envelope cipher bound to an environment and a key provider.
//!
//! The crypto crate is pure: it takes its DEK and nonce from the caller. This
//! wrapper supplies them from [`Environment::try_random_bytes`], so production
//! draws from the OS CSPRNG and simulation draws from a seeded one.

use cinder_crypto::{
    ALGORITHM, CryptoError, Envelope, EnvelopeSeed, KeyProvider, open_envelope, seal_envelope,
};

use crate::env::Environment;

/// Seals and opens message envelopes under a fixed key provider.
pub struct EnvelopeCipher<K: KeyProvider> {
    keys: K,
}

impl<K: KeyProvider> EnvelopeCipher<K> {
    /// Cipher using `keys` for every wrap and unwrap.
    pub fn new(keys: K) -> Self {
        Self { keys }
    }

    /// Key provider backing this cipher.
    pub fn keys(&self) -> &K {
        &self.keys
    }

    /// Encrypt `plaintext` bound to `aad` with a fresh DEK and nonce.
    ///
    /// # Errors
    ///
    /// - `Encryption`: the random source failed, no usable KEK, or the AEAD
    ///   or key wrap failed
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        aad: &[u8],
        env: &impl Environment,
    ) -> Result<Envelope, CryptoError> {
        let seed = EnvelopeSeed::try_generate(|buf| env.try_random_bytes(buf))?;
        seal_envelope(plaintext, aad, seed, &self.keys)
    }

    /// Decrypt `envelope` against the AAD rebuilt from its context.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound`: envelope names a KEK this provider does not hold
    /// - `Decryption`: unsupported algorithm or failed authentication
    pub fn decrypt(&self, envelope: &Envelope, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        open_envelope(envelope, aad, &self.keys)
    }

    /// True if `envelope` names an algorithm this cipher can open.
    pub fn supports(&self, envelope: &Envelope) -> bool {
        envelope.alg == ALGORITHM
    }
}
