//! Cinder Cryptographic Primitives
//!
//! Envelope encryption for messages at rest. Pure functions: callers provide
//! random bytes (through [`EnvelopeSeed`]) and key material (through a
//! [`KeyProvider`]), which keeps every operation reproducible under test.
//!
//! # Key Hierarchy
//!
//! A long-lived key-encryption-key (KEK) is loaded from configuration at
//! process start. Every message gets its own one-time data-encryption-key
//! (DEK). The DEK encrypts the message; the KEK only ever wraps DEKs.
//!
//! ```text
//! KeyConfig (hex + id, supplied by the host)
//!        │
//!        ▼
//! KeyRing → KEK (active) + retired KEKs (unwrap only)
//!        │
//!        ▼
//! AES key wrap → wrapped DEK (40 bytes, stored)
//!        │
//!        ▼
//! DEK (32 random bytes, per message, never stored in the clear)
//!        │
//!        ▼
//! AES-256-GCM(nonce, AAD) → Ciphertext + tag
//! ```
//!
//! # Security
//!
//! Confidentiality:
//! - Each envelope has a fresh DEK, so nonce reuse across envelopes cannot
//!   occur under the same key
//! - DEK and KEK buffers are zeroized on drop
//!
//! Integrity:
//! - GCM tag covers ciphertext and AAD; any modified bit fails decryption
//! - Key wrap carries its own integrity check, so a modified wrapped DEK or a
//!   wrong KEK fails before the AEAD runs
//!
//! Context binding:
//! - AAD is supplied by the caller on both sides and never read back from the
//!   stored envelope, so an envelope moved to another context fails to open

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod error;
pub mod kek;

pub use envelope::{
    ALGORITHM, DEK_SIZE, Envelope, EnvelopeSeed, NONCE_SIZE, TAG_SIZE, WRAPPED_DEK_SIZE,
    open_envelope, seal_envelope,
};
pub use error::CryptoError;
pub use kek::{KEK_HEX_LEN, KEK_SIZE, Kek, KekId, KeyConfig, KeyProvider, KeyRing};
