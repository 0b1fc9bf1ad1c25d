//! Envelope sealing and opening using AES-256-GCM and AES key wrap
//!
//! Both functions are pure. Randomness arrives through [`EnvelopeSeed`],
//! which the caller fills from its own entropy source. This keeps the crate
//! deterministic under test and free of any RNG dependency.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use std::fmt;

use aes_kw::KekAes256;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    kek::{Kek, KeyProvider},
};

/// Algorithm identifier written into every envelope
pub const ALGORITHM: &str = "AES-256-GCM";

/// Size of a per-message data-encryption-key (32 bytes)
pub const DEK_SIZE: usize = 32;

/// Size of the GCM nonce (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// RFC 3394 output size for a 32-byte DEK (one extra semiblock)
pub const WRAPPED_DEK_SIZE: usize = DEK_SIZE + 8;

/// Encrypted message body plus everything needed to open it again.
///
/// `aad` is kept for audit only. Opening always uses the AAD the caller
/// rebuilds from the record's context, so a copied envelope cannot carry its
/// original context along with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Algorithm identifier, currently always [`ALGORITHM`]
    pub alg: String,
    /// Ciphertext including the 16-byte GCM tag
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    /// Random 96-bit nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Associated data used at sealing time
    #[serde(with = "serde_bytes")]
    pub aad: Vec<u8>,
    /// DEK wrapped under the KEK named by `kek_id`
    #[serde(with = "serde_bytes")]
    pub wrapped_dek: Vec<u8>,
    /// Identifier of the wrapping KEK
    pub kek_id: String,
}

impl Envelope {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// One-time data-encryption-key. Zeroized on drop.
pub struct DataKey {
    key: [u8; DEK_SIZE],
}

impl DataKey {
    fn zeroed() -> Self {
        Self { key: [0u8; DEK_SIZE] }
    }

    fn as_bytes(&self) -> &[u8; DEK_SIZE] {
        &self.key
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Fresh random inputs for sealing exactly one envelope.
///
/// Never reuse a seed: the nonce is only safe because the DEK is new.
pub struct EnvelopeSeed {
    dek: DataKey,
    nonce: [u8; NONCE_SIZE],
}

impl EnvelopeSeed {
    /// Fill a DEK and a nonce in place using `fill`.
    ///
    /// `fill` MUST be backed by a cryptographically secure RNG in production.
    /// It is called once for the DEK and once for the nonce, so the key is
    /// never copied out of its zeroizing buffer.
    pub fn generate(mut fill: impl FnMut(&mut [u8])) -> Self {
        let mut dek = DataKey::zeroed();
        fill(&mut dek.key);

        let mut nonce = [0u8; NONCE_SIZE];
        fill(&mut nonce);

        Self { dek, nonce }
    }

    /// Like [`generate`](Self::generate), for an entropy source that can
    /// fail.
    ///
    /// # Errors
    ///
    /// - `Encryption`: `fill` failed. A partly filled DEK is zeroized.
    pub fn try_generate<E: fmt::Display>(
        mut fill: impl FnMut(&mut [u8]) -> Result<(), E>,
    ) -> Result<Self, CryptoError> {
        let entropy = |err: E| CryptoError::Encryption { reason: err.to_string() };

        let mut dek = DataKey::zeroed();
        fill(&mut dek.key).map_err(entropy)?;

        let mut nonce = [0u8; NONCE_SIZE];
        fill(&mut nonce).map_err(entropy)?;

        Ok(Self { dek, nonce })
    }

    /// Nonce this seed will use.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }
}

/// Seal `plaintext` bound to `aad` under a fresh DEK, and wrap the DEK under
/// the provider's current KEK.
///
/// # Errors
///
/// - `Encryption`: key provider could not supply a KEK, or the AEAD or key
///   wrap rejected its input. The caller must not retry with the same seed.
pub fn seal_envelope(
    plaintext: &[u8],
    aad: &[u8],
    seed: EnvelopeSeed,
    keys: &impl KeyProvider,
) -> Result<Envelope, CryptoError> {
    let (kek, kek_id) = keys
        .current_kek()
        .map_err(|err| CryptoError::Encryption { reason: format!("key provider: {err}") })?;

    let cipher = Aes256Gcm::new(seed.dek.as_bytes().into());
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&seed.nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Encryption { reason: "AEAD encryption failed".to_string() })?;

    let wrapped_dek = wrap_dek(kek, &seed.dek)?;

    Ok(Envelope {
        alg: ALGORITHM.to_string(),
        ciphertext,
        nonce: seed.nonce,
        aad: aad.to_vec(),
        wrapped_dek: wrapped_dek.to_vec(),
        kek_id: kek_id.as_str().to_string(),
    })
}

/// Open an envelope with the AAD rebuilt by the caller.
///
/// Returns the plaintext only if the wrapped DEK and the GCM tag both
/// authenticate. There is no partial output.
///
/// # Errors
///
/// - `KeyNotFound`: `kek_id` is not held by `keys`
/// - `Decryption`: unsupported algorithm, malformed or tampered wrapped DEK,
///   wrong KEK, or ciphertext/nonce/AAD that fail authentication
pub fn open_envelope(
    envelope: &Envelope,
    aad: &[u8],
    keys: &impl KeyProvider,
) -> Result<Vec<u8>, CryptoError> {
    if envelope.alg != ALGORITHM {
        return Err(CryptoError::Decryption {
            reason: format!("unsupported algorithm {:?}", envelope.alg),
        });
    }

    let kek = keys.kek(&envelope.kek_id)?;
    let dek = unwrap_dek(kek, &envelope.wrapped_dek)?;

    let cipher = Aes256Gcm::new(dek.as_bytes().into());
    cipher
        .decrypt(
            Nonce::from_slice(&envelope.nonce),
            Payload { msg: envelope.ciphertext.as_slice(), aad },
        )
        .map_err(|_| CryptoError::Decryption { reason: "authentication failed".to_string() })
}

fn wrap_dek(kek: &Kek, dek: &DataKey) -> Result<[u8; WRAPPED_DEK_SIZE], CryptoError> {
    let wrapper = KekAes256::new(kek.as_bytes().into());
    let mut wrapped = [0u8; WRAPPED_DEK_SIZE];
    wrapper
        .wrap(dek.as_bytes(), &mut wrapped)
        .map_err(|_| CryptoError::Encryption { reason: "key wrap failed".to_string() })?;
    Ok(wrapped)
}

fn unwrap_dek(kek: &Kek, wrapped: &[u8]) -> Result<DataKey, CryptoError> {
    if wrapped.len() != WRAPPED_DEK_SIZE {
        return Err(CryptoError::Decryption {
            reason: format!(
                "wrapped key is {} bytes, expected {WRAPPED_DEK_SIZE}",
                wrapped.len()
            ),
        });
    }

    let wrapper = KekAes256::new(kek.as_bytes().into());
    let mut dek = DataKey::zeroed();
    wrapper
        .unwrap(wrapped, &mut dek.key)
        .map_err(|_| CryptoError::Decryption { reason: "key unwrap failed".to_string() })?;
    Ok(dek)
}
