//! Engine Settings
//!
//! Tunables for the wallet engine with:
//! - Presets (standard, hardened, low-memory)
//! - TOML loading with per-field defaults
//! - Validation before use

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::error::{WalletError, WalletResult};
use crate::store::{KdfParams, RetryPolicy};
use crate::types::Network;
use crate::wallet::WordCount;

const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_BACKOFF_MS: u64 = 10_000;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Network receiver addresses and default peers belong to
    pub network: Network,
    /// Length of freshly generated recovery phrases
    pub word_count: WordCount,
    /// Minimum password length in characters
    pub min_password_len: usize,
    /// Default `tracing` filter directive when `RUST_LOG` is unset
    pub log_level: String,
    /// Directory wallets live in when the host passes a bare file name
    pub data_dir: Option<PathBuf>,
    /// Node address recorded when the host does not supply one
    pub node_addr: Option<String>,
    /// Argon2id cost for new stores. Existing stores keep their own.
    pub kdf: KdfParams,
    /// Bounded retry for transient storage I/O
    pub io_retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::standard()
    }
}

impl EngineSettings {
    /// Standard preset
    pub fn standard() -> Self {
        Self {
            network: Network::Mainnet,
            word_count: WordCount::Twelve,
            kdf: KdfParams::default(),
            min_password_len: 1,
            io_retry: RetryPolicy::default(),
            log_level: "info".to_string(),
            data_dir: None,
            node_addr: None,
        }
    }

    /// Hardened preset: 24 words, heavier KDF, longer passwords
    pub fn hardened() -> Self {
        Self {
            word_count: WordCount::TwentyFour,
            kdf: KdfParams {
                memory_cost: 262_144, // 256 MiB
                time_cost: 4,
                parallelism: 4,
            },
            min_password_len: 12,
            log_level: "warn".to_string(),
            ..Self::standard()
        }
    }

    /// Low-memory preset for constrained devices
    pub fn low_memory() -> Self {
        Self {
            kdf: KdfParams {
                memory_cost: 19_456, // 19 MiB
                time_cost: 2,
                parallelism: 1,
            },
            ..Self::standard()
        }
    }

    /// Parse settings from TOML text and validate them
    pub fn from_toml_str(text: &str) -> WalletResult<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> WalletResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WalletError::config(format!("Cannot read settings file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> WalletResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| WalletError::internal(format!("Settings serialization failed: {}", e)))
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> WalletResult<()> {
        self.kdf.check_bounds().map_err(WalletError::config)?;

        if self.min_password_len == 0 {
            return Err(WalletError::config("min_password_len must be at least 1"));
        }

        let retry = &self.io_retry;
        if retry.max_attempts == 0 || retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(WalletError::config(format!(
                "io_retry.max_attempts must be between 1 and {}",
                MAX_RETRY_ATTEMPTS
            )));
        }
        if retry.backoff_ms > MAX_BACKOFF_MS {
            return Err(WalletError::config(format!(
                "io_retry.backoff_ms must be at most {}",
                MAX_BACKOFF_MS
            )));
        }

        if EnvFilter::try_new(&self.log_level).is_err() {
            return Err(WalletError::config(format!(
                "log_level '{}' is not a valid filter",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Resolve a host-supplied wallet path against `data_dir`
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.data_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_presets_validate() {
        assert!(EngineSettings::standard().validate().is_ok());
        assert!(EngineSettings::hardened().validate().is_ok());
        assert!(EngineSettings::low_memory().validate().is_ok());
        assert_eq!(EngineSettings::hardened().word_count, WordCount::TwentyFour);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut settings = EngineSettings::low_memory();
        settings.network = Network::Testnet;
        settings.data_dir = Some(PathBuf::from("/var/lib/wallets"));

        let text = settings.to_toml_string().unwrap();
        let parsed = EngineSettings::from_toml_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = EngineSettings::from_toml_str(
            r#"
            network = "testnet"
            word_count = 24

            [kdf]
            memory_cost = 1024
            "#,
        )
        .unwrap();
        assert_eq!(parsed.network, Network::Testnet);
        assert_eq!(parsed.word_count, WordCount::TwentyFour);
        assert_eq!(parsed.kdf.memory_cost, 1024);
        assert_eq!(parsed.kdf.time_cost, KdfParams::default().time_cost);
        assert_eq!(parsed.log_level, "info");
    }

    #[test]
    fn test_invalid_settings() {
        let err = EngineSettings::from_toml_str("word_count = 15").unwrap_err();
        assert_eq!(err.code, ErrorCode::Config);

        let mut settings = EngineSettings::standard();
        settings.kdf.parallelism = 0;
        assert_eq!(settings.validate().unwrap_err().code, ErrorCode::Config);

        let mut settings = EngineSettings::standard();
        settings.kdf.time_cost = crate::store::MAX_TIME_COST + 1;
        assert_eq!(settings.validate().unwrap_err().code, ErrorCode::Config);

        let mut settings = EngineSettings::standard();
        settings.io_retry.max_attempts = 0;
        assert_eq!(settings.validate().unwrap_err().code, ErrorCode::Config);

        let mut settings = EngineSettings::standard();
        settings.min_password_len = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_resolve_path() {
        let mut settings = EngineSettings::standard();
        assert_eq!(settings.resolve_path(Path::new("w.db")), PathBuf::from("w.db"));

        settings.data_dir = Some(PathBuf::from("/data"));
        assert_eq!(settings.resolve_path(Path::new("w.db")), PathBuf::from("/data/w.db"));
        assert_eq!(settings.resolve_path(Path::new("/abs/w.db")), PathBuf::from("/abs/w.db"));
    }
}
