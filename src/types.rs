//! Shared types for the wallet engine
//!
//! Data structures that cross module boundaries are defined here
//! for consistent serialization towards the host application.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Network Types
// =============================================================================

/// Network a wallet and its receiver addresses belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Base58Check version byte of receiver addresses
    pub fn address_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    /// SLIP-0044 coin type used in the standard receive path
    pub fn coin_type(&self) -> u32 {
        match self {
            Network::Mainnet => 0,
            Network::Testnet => 1,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            _ => Err(format!("Unknown network: {}", s)),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Wallet Types
// =============================================================================

/// Lifecycle state of a wallet handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Uninitialized,
    Closed,
    Running,
    Destroyed,
}

impl WalletStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, WalletStatus::Running)
    }
}

/// Metadata recorded in the store when a wallet is created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletMetadata {
    /// Version of the host application that created the wallet
    pub app_version: String,
    /// Node the host connects to; handed to the networking layer untouched
    pub node_addr: String,
}

impl WalletMetadata {
    pub fn new(app_version: impl Into<String>, node_addr: impl Into<String>) -> Self {
        Self {
            app_version: app_version.into(),
            node_addr: node_addr.into(),
        }
    }
}

/// Public description of a wallet. Never contains key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub id: String,
    pub path: PathBuf,
    /// Protocol version the wallet was created with
    pub protocol_version: u32,
    pub created_with: WalletMetadata,
    /// BIP-32 fingerprint of the master key (hex)
    pub fingerprint: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
}

// =============================================================================
// Peer Types
// =============================================================================

/// Where a peer entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSource {
    Default,
    Discovered,
}

/// Network endpoint used to bootstrap node connectivity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerEntry {
    pub host: String,
    pub port: u16,
    pub source: PeerSource,
}

impl PeerEntry {
    pub fn new(host: impl Into<String>, port: u16, source: PeerSource) -> Self {
        Self {
            host: host.into(),
            port,
            source,
        }
    }

    /// `host:port` form handed to the networking layer
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// Envelope used by the host client for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<crate::error::WalletError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: crate::error::WalletError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":{"code":"internal","message":"Serialization failed"}}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_properties() {
        assert_eq!(Network::Mainnet.address_version(), 0x00);
        assert_eq!(Network::Testnet.address_version(), 0x6f);
        assert_eq!(Network::Testnet.coin_type(), 1);
        assert_eq!("TESTNET".parse::<Network>(), Ok(Network::Testnet));
        assert!("regtest".parse::<Network>().is_err());
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::ok("test_data".to_string());
        let json = response.to_json();
        assert!(json.contains("success"));
        assert!(json.contains("test_data"));
    }

    #[test]
    fn test_peer_endpoint() {
        let peer = PeerEntry::new("node.example.net", 10000, PeerSource::Default);
        assert_eq!(peer.endpoint(), "node.example.net:10000");
    }
}
