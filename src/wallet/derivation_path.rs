//! Key Derivation Paths
//!
//! Parses BIP-32 paths of the form `m/44'/0'/0'/0/5`. Hardened components may
//! be marked with `'`, `h` or `H`.

use bitcoin::bip32::{ChildNumber, DerivationPath};

use crate::error::{WalletError, WalletResult};
use crate::types::Network;

/// Standard BIP purposes
pub mod bip_purposes {
    pub const BIP44: u32 = 44; // Legacy (P2PKH)
}

/// Hardened offset for BIP-32 derivation
pub const HARDENED: u32 = 0x80000000;

/// Deepest path BIP-32 can serialize (depth is a single byte)
pub const MAX_DEPTH: usize = 255;

/// Parsed derivation path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    pub components: Vec<PathComponent>,
}

/// Single component of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathComponent {
    pub index: u32,
    pub hardened: bool,
}

impl PathComponent {
    pub fn new(index: u32, hardened: bool) -> Self {
        Self { index, hardened }
    }

    pub fn normal(index: u32) -> Self {
        Self::new(index, false)
    }

    pub fn hardened(index: u32) -> Self {
        Self::new(index, true)
    }

    /// Get the full index including hardened bit
    pub fn full_index(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED
        } else {
            self.index
        }
    }

    fn to_child_number(self) -> WalletResult<ChildNumber> {
        let child = if self.hardened {
            ChildNumber::from_hardened_idx(self.index)
        } else {
            ChildNumber::from_normal_idx(self.index)
        };
        child.map_err(WalletError::from)
    }
}

impl std::fmt::Display for PathComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m")?;
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for KeyPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

impl KeyPath {
    pub fn new(components: Vec<PathComponent>) -> Self {
        Self { components }
    }

    /// Root path `m`
    pub fn master() -> Self {
        Self::new(Vec::new())
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn has_hardened(&self) -> bool {
        self.components.iter().any(|c| c.hardened)
    }

    /// Append a component
    pub fn child(&self, component: PathComponent) -> Self {
        let mut components = self.components.clone();
        components.push(component);
        Self { components }
    }

    /// Convert to the bitcoin crate's representation
    pub fn to_derivation_path(&self) -> WalletResult<DerivationPath> {
        let children = self
            .components
            .iter()
            .map(|c| c.to_child_number())
            .collect::<WalletResult<Vec<_>>>()?;
        Ok(DerivationPath::from(children))
    }
}

/// Parse a derivation path string
pub fn parse_path(path: &str) -> WalletResult<KeyPath> {
    let trimmed = path.trim();

    if trimmed == "m" || trimmed == "M" {
        return Ok(KeyPath::master());
    }

    // Must start with m/
    let path_part = trimmed
        .strip_prefix("m/")
        .or_else(|| trimmed.strip_prefix("M/"))
        .ok_or_else(|| WalletError::invalid_path("Derivation path must start with 'm/'"))?;

    if path_part.is_empty() {
        return Err(WalletError::invalid_path("Empty derivation path"));
    }

    let components = path_part
        .split('/')
        .map(parse_component)
        .collect::<WalletResult<Vec<_>>>()?;

    if components.len() > MAX_DEPTH {
        return Err(WalletError::invalid_path(format!(
            "Derivation path deeper than {} levels",
            MAX_DEPTH
        )));
    }

    Ok(KeyPath { components })
}

/// Parse a single path component
fn parse_component(s: &str) -> WalletResult<PathComponent> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Err(WalletError::invalid_path("Empty path component"));
    }

    // Check for hardened indicator
    let (number_str, hardened) = match trimmed.strip_suffix(|c: char| matches!(c, '\'' | 'h' | 'H')) {
        Some(number) => (number, true),
        None => (trimmed, false),
    };

    if number_str.is_empty() || !number_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WalletError::invalid_path(format!(
            "Invalid path component '{}'",
            s
        )));
    }

    // All digits: a parse failure can only mean the value overflowed u32.
    let index: u32 = number_str.parse().map_err(|_| {
        WalletError::derivation_overflow(format!("Path component {} exceeds u32", number_str))
    })?;

    // The top bit is reserved for the hardened flag
    if index >= HARDENED {
        return Err(WalletError::derivation_overflow(format!(
            "Path component {} exceeds maximum index {}",
            index,
            HARDENED - 1
        )));
    }

    Ok(PathComponent::new(index, hardened))
}

/// Standard receive path: m/44'/coin'/account'/0/index
pub fn receive_path(network: Network, account: u32, index: u32) -> KeyPath {
    KeyPath::new(vec![
        PathComponent::hardened(bip_purposes::BIP44),
        PathComponent::hardened(network.coin_type()),
        PathComponent::hardened(account),
        PathComponent::normal(0),
        PathComponent::normal(index),
    ])
}

/// Account-level path m/44'/coin'/account', the root of watch-only exports
pub fn account_path(network: Network, account: u32) -> KeyPath {
    KeyPath::new(vec![
        PathComponent::hardened(bip_purposes::BIP44),
        PathComponent::hardened(network.coin_type()),
        PathComponent::hardened(account),
    ])
}
