//! Mnemonic Engine
//!
//! Generates and validates BIP-39 recovery phrases over the English
//! dictionary and stretches them into a 64-byte seed.
//!
//! SECURITY: entropy and seeds live in `Zeroizing` buffers and are cleared on drop.

use bip39::Language;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};

/// Number of words in the dictionary
pub const DICTIONARY_SIZE: usize = 2048;

/// Length of a derived seed in bytes
pub const SEED_LEN: usize = 64;

/// Supported phrase lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum WordCount {
    #[default]
    Twelve,
    TwentyFour,
}

impl WordCount {
    /// Entropy consumed for this phrase length, in bytes
    pub fn entropy_len(&self) -> usize {
        match self {
            WordCount::Twelve => 16,
            WordCount::TwentyFour => 32,
        }
    }

    pub fn words(&self) -> usize {
        match self {
            WordCount::Twelve => 12,
            WordCount::TwentyFour => 24,
        }
    }
}

impl TryFrom<usize> for WordCount {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            12 => Ok(WordCount::Twelve),
            24 => Ok(WordCount::TwentyFour),
            other => Err(format!("Unsupported word count {} (expected 12 or 24)", other)),
        }
    }
}

impl From<WordCount> for usize {
    fn from(count: WordCount) -> usize {
        count.words()
    }
}

/// A checksum-valid recovery phrase
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic {
    inner: bip39::Mnemonic,
}

impl Mnemonic {
    /// Words in order
    pub fn words(&self) -> Vec<String> {
        self.phrase().split(' ').map(str::to_string).collect()
    }

    /// Space-separated phrase
    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.inner.to_string())
    }

    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }

    /// Dictionary index of every word
    pub fn word_indices(&self) -> Vec<u16> {
        self.phrase()
            .split(' ')
            .filter_map(|w| Language::English.find_word(w))
            .collect()
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.word_count())
            .finish()
    }
}

/// Seed stretched from a mnemonic and passphrase
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl PartialEq for Seed {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Seed {}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// Generate a fresh mnemonic from the OS random source
pub fn generate_mnemonic(word_count: WordCount) -> WalletResult<Mnemonic> {
    generate_mnemonic_with(&mut OsRng, word_count)
}

/// Generate a mnemonic from the supplied random source
///
/// SECURITY: Entropy is securely zeroized after mnemonic generation
pub fn generate_mnemonic_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    word_count: WordCount,
) -> WalletResult<Mnemonic> {
    let mut entropy = Zeroizing::new([0u8; 32]);
    let len = word_count.entropy_len();

    rng.try_fill_bytes(&mut entropy[..len])
        .map_err(|e| WalletError::entropy_unavailable(format!("Secure random source failed: {}", e)))?;

    let inner = bip39::Mnemonic::from_entropy_in(Language::English, &entropy[..len])
        .map_err(|e| WalletError::internal(format!("Failed to create mnemonic: {}", e)))?;

    crate::log_debug!("mnemonic", "Generated mnemonic", words = word_count.words());
    Ok(Mnemonic { inner })
}

/// Parse a phrase, collapsing whitespace and case first
pub fn parse_mnemonic(phrase: &str) -> WalletResult<Mnemonic> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" "),
    );

    if normalized.is_empty() {
        return Err(WalletError::invalid_mnemonic("Mnemonic is empty"));
    }

    let inner = bip39::Mnemonic::parse_in_normalized(Language::English, &normalized)?;

    if WordCount::try_from(inner.word_count()).is_err() {
        return Err(WalletError::invalid_mnemonic(format!(
            "Invalid mnemonic: unsupported word count {}",
            inner.word_count()
        )));
    }

    Ok(Mnemonic { inner })
}

/// Check a phrase without raising
pub fn validate_mnemonic(phrase: &str) -> bool {
    parse_mnemonic(phrase).is_ok()
}

/// Stretch a mnemonic into its seed (PBKDF2-HMAC-SHA512, 2048 rounds)
pub fn derive_seed(mnemonic: &Mnemonic, passphrase: &str) -> Seed {
    Seed(Zeroizing::new(mnemonic.inner.to_seed(passphrase)))
}

/// The fixed word list, index-addressable
pub fn dictionary() -> &'static [&'static str; DICTIONARY_SIZE] {
    Language::English.word_list()
}

/// Index of a word in the dictionary
pub fn word_index(word: &str) -> Option<u16> {
    Language::English.find_word(word)
}
