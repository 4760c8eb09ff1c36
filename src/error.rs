//! Unified error types for the wallet engine
//!
//! Every lifecycle failure flows through this module so callers can match on
//! a stable `ErrorCode`. Messages never carry passwords, phrases or key bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all engine operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl WalletError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn entropy_unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntropyUnavailable, msg)
    }

    pub fn invalid_mnemonic(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidMnemonic, msg)
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPath, msg)
    }

    pub fn derivation_overflow(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DerivationOverflow, msg)
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, msg)
    }

    pub fn bad_password() -> Self {
        Self::new(ErrorCode::BadPassword, "Incorrect password")
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Corrupted, msg)
    }

    pub fn wallet_busy(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WalletBusy, msg)
    }

    pub fn not_running(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotRunning, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for WalletError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Mnemonic / derivation
    EntropyUnavailable,
    InvalidMnemonic,
    InvalidPath,
    DerivationOverflow,

    // Store
    AlreadyExists,
    NotFound,
    BadPassword,
    Corrupted,
    WalletBusy,
    NotRunning,

    // Input / environment
    InvalidInput,
    Io,
    Config,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Stable snake_case name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::EntropyUnavailable => "entropy_unavailable",
            ErrorCode::InvalidMnemonic => "invalid_mnemonic",
            ErrorCode::InvalidPath => "invalid_path",
            ErrorCode::DerivationOverflow => "derivation_overflow",
            ErrorCode::AlreadyExists => "already_exists",
            ErrorCode::NotFound => "not_found",
            ErrorCode::BadPassword => "bad_password",
            ErrorCode::Corrupted => "corrupted",
            ErrorCode::WalletBusy => "wallet_busy",
            ErrorCode::NotRunning => "not_running",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::Io => "io",
            ErrorCode::Config => "config",
            ErrorCode::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias for engine operations
pub type WalletResult<T> = Result<T, WalletError>;

// Conversions from common error types

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::new(ErrorCode::Internal, format!("JSON error: {}", e))
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => WalletError::not_found(e.to_string()),
            std::io::ErrorKind::AlreadyExists => WalletError::already_exists(e.to_string()),
            _ => WalletError::new(ErrorCode::Io, e.to_string()),
        }
    }
}

impl From<toml::de::Error> for WalletError {
    fn from(e: toml::de::Error) -> Self {
        WalletError::config(format!("Invalid settings: {}", e.message()))
    }
}

impl From<bip39::Error> for WalletError {
    fn from(e: bip39::Error) -> Self {
        // bip39 errors name the offending word; keep only the category.
        let reason = match e {
            bip39::Error::BadWordCount(n) => format!("unsupported word count {}", n),
            bip39::Error::UnknownWord(_) => "word not in dictionary".to_string(),
            bip39::Error::BadEntropyBitCount(n) => format!("bad entropy length {} bits", n),
            bip39::Error::InvalidChecksum => "checksum mismatch".to_string(),
            _ => "malformed phrase".to_string(),
        };
        WalletError::invalid_mnemonic(format!("Invalid mnemonic: {}", reason))
    }
}

impl From<bitcoin::bip32::Error> for WalletError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        use bitcoin::bip32::Error;
        match e {
            Error::Secp256k1(_) => WalletError::derivation_overflow(
                "Derived child key is invalid for this index",
            ),
            Error::InvalidChildNumber(n) => {
                WalletError::derivation_overflow(format!("Child index {} out of range", n))
            }
            Error::CannotDeriveFromHardenedKey => WalletError::invalid_path(
                "Hardened derivation requires the private key",
            ),
            other => WalletError::invalid_path(format!("BIP32 error: {}", other)),
        }
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(e: tokio::task::JoinError) -> Self {
        WalletError::internal(format!("Background task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = WalletError::wallet_busy("Another wallet is running")
            .with_details("close it first");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("wallet_busy"));
        assert!(json.contains("Another wallet is running"));
        assert_eq!(err.code.to_string(), "wallet_busy");
    }

    #[test]
    fn test_io_error_mapping() {
        let err: WalletError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err: WalletError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.code, ErrorCode::Io);
    }

    #[test]
    fn test_bip39_error_does_not_echo_words() {
        let err: WalletError = bip39::Error::UnknownWord(3).into();
        assert!(err.is(ErrorCode::InvalidMnemonic));
        assert!(!err.message.contains('3'));
    }
}
