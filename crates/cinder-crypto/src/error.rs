//! Error types for envelope operations

use thiserror::Error;

/// Errors from key resolution and envelope sealing/opening.
///
/// None of the variants carry key material. Reasons are fixed strings chosen
/// by this crate, never the text of an underlying parser error, because those
/// can quote the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Key-encryption-key configuration is missing or malformed
    #[error("key configuration error: {reason}")]
    Configuration {
        /// What is wrong with the configuration
        reason: String,
    },

    /// Sealing a message failed
    #[error("encryption failed: {reason}")]
    Encryption {
        /// Reason for the failure
        reason: String,
    },

    /// Opening an envelope failed (tampering, wrong context, or wrong key)
    #[error("decryption failed: {reason}")]
    Decryption {
        /// Reason for the failure
        reason: String,
    },

    /// Envelope references a key-encryption-key this process does not hold
    #[error("unknown key-encryption-key: {kek_id}")]
    KeyNotFound {
        /// Identifier recorded in the envelope
        kek_id: String,
    },
}

impl CryptoError {
    /// Returns true if the error describes a bad or foreign record rather
    /// than a fault of this process.
    ///
    /// Record errors are recovered per message by showing a placeholder.
    /// Everything else is fatal for the request.
    pub fn is_record_error(&self) -> bool {
        match self {
            Self::Decryption { .. } | Self::KeyNotFound { .. } => true,
            Self::Configuration { .. } | Self::Encryption { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_failures_are_record_errors() {
        let err = CryptoError::Decryption { reason: "authentication failed".to_string() };
        assert!(err.is_record_error());

        let err = CryptoError::KeyNotFound { kek_id: "kek-2023".to_string() };
        assert!(err.is_record_error());
    }

    #[test]
    fn configuration_and_encryption_failures_are_fatal() {
        let err = CryptoError::Configuration { reason: "missing".to_string() };
        assert!(!err.is_record_error());

        let err = CryptoError::Encryption { reason: "aead".to_string() };
        assert!(!err.is_record_error());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::KeyNotFound { kek_id: "kek-old".to_string() };
        assert_eq!(err.to_string(), "unknown key-encryption-key: kek-old");
    }
}
