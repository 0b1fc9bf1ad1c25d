//! Key-encryption-key configuration and lookup
//!
//! KEKs are loaded once from an explicit [`KeyConfig`] at process start and
//! held in a [`KeyRing`]. The active KEK wraps every new DEK; retired KEKs are
//! kept only so that envelopes written before a rotation still open.

use std::{collections::HashMap, fmt};

use zeroize::Zeroize;

use crate::error::CryptoError;

/// Size of a key-encryption-key in bytes (AES-256)
pub const KEK_SIZE: usize = 32;

/// Number of hex characters that encode one KEK
pub const KEK_HEX_LEN: usize = KEK_SIZE * 2;

/// Longest accepted KEK identifier
pub const MAX_KEK_ID_LEN: usize = 128;

/// Opaque identifier recorded in every envelope next to the wrapped DEK.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KekId(String);

impl KekId {
    /// Validate and wrap an identifier.
    ///
    /// Identifiers are 1 to [`MAX_KEK_ID_LEN`] printable ASCII characters.
    pub fn new(id: impl Into<String>) -> Result<Self, CryptoError> {
        let id = id.into();
        if id.is_empty() {
            return Err(CryptoError::Configuration {
                reason: "key identifier is not configured".to_string(),
            });
        }
        if id.len() > MAX_KEK_ID_LEN {
            return Err(CryptoError::Configuration {
                reason: format!("key identifier longer than {MAX_KEK_ID_LEN} characters"),
            });
        }
        if !id.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(CryptoError::Configuration {
                reason: "key identifier must be printable ASCII without spaces".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Identifier as stored in envelopes.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A 256-bit key-encryption-key.
///
/// Only ever used to wrap and unwrap DEKs. Zeroized on drop, and `Debug`
/// never prints the key.
pub struct Kek {
    bytes: [u8; KEK_SIZE],
}

impl Kek {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEK_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse a KEK from its hex encoding.
    ///
    /// Surrounding whitespace is ignored. Errors describe the problem
    /// (length, alphabet) without repeating any part of the input.
    pub fn from_hex(hex_value: &str) -> Result<Self, CryptoError> {
        let trimmed = hex_value.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::Configuration {
                reason: "key-encryption-key is not configured".to_string(),
            });
        }
        if trimmed.len() != KEK_HEX_LEN {
            return Err(CryptoError::Configuration {
                reason: format!(
                    "key-encryption-key must be {KEK_HEX_LEN} hex characters, got {}",
                    trimmed.len()
                ),
            });
        }

        let mut bytes = [0u8; KEK_SIZE];
        if hex::decode_to_slice(trimmed, &mut bytes).is_err() {
            bytes.zeroize();
            return Err(CryptoError::Configuration {
                reason: "key-encryption-key is not valid hexadecimal".to_string(),
            });
        }

        Ok(Self { bytes })
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEK_SIZE] {
        &self.bytes
    }
}

impl Drop for Kek {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for Kek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Kek(<redacted>)")
    }
}

/// Key material as supplied by the hosting environment.
///
/// Built once at startup (from CLI flags, environment variables, or a test
/// fixture) and handed to [`KeyRing::from_config`]. Hex strings are zeroized
/// when the config is dropped.
#[derive(Default)]
pub struct KeyConfig {
    /// Active KEK, 64 hex characters
    pub kek_hex: Option<String>,
    /// Identifier of the active KEK
    pub kek_id: Option<String>,
    /// Previously active KEKs as `(id, hex)`, accepted for unwrapping only
    pub retired: Vec<(String, String)>,
}

impl KeyConfig {
    /// Config with a single active key.
    pub fn single(kek_id: impl Into<String>, kek_hex: impl Into<String>) -> Self {
        Self { kek_hex: Some(kek_hex.into()), kek_id: Some(kek_id.into()), retired: Vec::new() }
    }
}

impl Drop for KeyConfig {
    fn drop(&mut self) {
        self.kek_hex.zeroize();
        for (_, hex_value) in &mut self.retired {
            hex_value.zeroize();
        }
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let retired: Vec<&str> = self.retired.iter().map(|(id, _)| id.as_str()).collect();
        f.debug_struct("KeyConfig")
            .field("kek_hex", &self.kek_hex.as_ref().map(|_| "<redacted>"))
            .field("kek_id", &self.kek_id)
            .field("retired", &retired)
            .finish()
    }
}

/// Resolves key-encryption-keys for the envelope cipher.
///
/// `current_kek` returns a `Result` so providers that resolve lazily can
/// report a first-use `Configuration` error; [`KeyRing`] validates everything
/// up front and never fails there.
pub trait KeyProvider: Send + Sync {
    /// Active KEK and its identifier, used for every new envelope.
    fn current_kek(&self) -> Result<(&Kek, &KekId), CryptoError>;

    /// KEK recorded under `kek_id`.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound`: no KEK with this identifier is held
    fn kek(&self, kek_id: &str) -> Result<&Kek, CryptoError>;
}

/// In-process set of KEKs: one active, any number retired.
pub struct KeyRing {
    current_id: KekId,
    current: Kek,
    retired: HashMap<String, Kek>,
}

impl KeyRing {
    /// Key ring holding only `kek` under `kek_id`.
    pub fn single(kek_id: KekId, kek: Kek) -> Self {
        Self { current_id: kek_id, current: kek, retired: HashMap::new() }
    }

    /// Validate a [`KeyConfig`] and load every key it names.
    ///
    /// # Errors
    ///
    /// - `Configuration`: active key or identifier missing, any key not 64 hex
    ///   characters, or a retired identifier that collides with another one
    pub fn from_config(config: &KeyConfig) -> Result<Self, CryptoError> {
        let kek_hex = config.kek_hex.as_deref().ok_or_else(|| CryptoError::Configuration {
            reason: "key-encryption-key is not configured".to_string(),
        })?;
        let kek_id = KekId::new(config.kek_id.clone().unwrap_or_default())?;

        let mut ring = Self::single(kek_id, Kek::from_hex(kek_hex)?);
        for (id, hex_value) in &config.retired {
            ring = ring.with_retired(KekId::new(id.clone())?, Kek::from_hex(hex_value)?)?;
        }

        Ok(ring)
    }

    /// Add a retired KEK that is still accepted for unwrapping.
    pub fn with_retired(mut self, kek_id: KekId, kek: Kek) -> Result<Self, CryptoError> {
        if kek_id == self.current_id || self.retired.contains_key(kek_id.as_str()) {
            return Err(CryptoError::Configuration {
                reason: format!("duplicate key identifier {kek_id}"),
            });
        }
        self.retired.insert(kek_id.0, kek);
        Ok(self)
    }

    /// Identifier of the active KEK.
    pub fn current_id(&self) -> &KekId {
        &self.current_id
    }

    /// Number of KEKs held, active one included.
    pub fn len(&self) -> usize {
        self.retired.len() + 1
    }

    /// Always false; a ring holds at least the active KEK.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl KeyProvider for KeyRing {
    fn current_kek(&self) -> Result<(&Kek, &KekId), CryptoError> {
        Ok((&self.current, &self.current_id))
    }

    fn kek(&self, kek_id: &str) -> Result<&Kek, CryptoError> {
        if kek_id == self.current_id.as_str() {
            return Ok(&self.current);
        }
        self.retired
            .get(kek_id)
            .ok_or_else(|| CryptoError::KeyNotFound { kek_id: kek_id.to_string() })
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("current_id", &self.current_id)
            .field("retired", &self.retired.keys().collect::<Vec<_>>())
            .finish()
    }
}
