//! CLI error types.

use std::fmt;

use cinder_core::{GatewayError, StorageError};
use cinder_crypto::CryptoError;

/// Errors that can occur while running a command.
#[derive(Debug)]
pub enum CliError {
    /// Key configuration missing or malformed.
    ///
    /// Fatal before any storage is touched. The message never contains key
    /// material.
    Config(String),

    /// Storage could not be opened.
    Storage(StorageError),

    /// Gateway rejected or failed the request.
    ///
    /// See [`GatewayError::is_client_error`] for whether the request itself
    /// was at fault.
    Gateway(GatewayError),

    /// Writing output failed.
    Io(String),
}

impl CliError {
    /// Process exit code for this error: 2 for bad input or configuration,
    /// 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Gateway(err) if err.is_client_error() => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Gateway(err) => write!(f, "{err}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CryptoError> for CliError {
    fn from(err: CryptoError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.to_string())
    }
}
