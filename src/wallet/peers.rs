//! Peer Directory
//!
//! Versioned bootstrap peers per network plus the peers the networking layer
//! reports back. Nothing here performs I/O.

use std::sync::{PoisonError, RwLock};

use crate::error::{WalletError, WalletResult};
use crate::types::{Network, PeerEntry, PeerSource};

/// Bumped whenever a default table changes
pub const DEFAULT_PEERS_VERSION: u32 = 3;

/// Port nodes listen on unless an entry says otherwise
pub const DEFAULT_NODE_PORT: u16 = 10000;

const MAINNET_PEERS: &[(&str, u16)] = &[
    ("eu-node01.mainnet.mw-wallet.org", 10000),
    ("eu-node02.mainnet.mw-wallet.org", 10000),
    ("us-node01.mainnet.mw-wallet.org", 10000),
    ("us-node02.mainnet.mw-wallet.org", 10000),
    ("ap-node01.mainnet.mw-wallet.org", 10000),
];

const TESTNET_PEERS: &[(&str, u16)] = &[
    ("eu-node01.testnet.mw-wallet.org", 11000),
    ("us-node01.testnet.mw-wallet.org", 11000),
];

/// Fixed bootstrap list for `network`, in table order
pub fn default_peers(network: Network) -> Vec<PeerEntry> {
    let table = match network {
        Network::Mainnet => MAINNET_PEERS,
        Network::Testnet => TESTNET_PEERS,
    };
    table
        .iter()
        .map(|(host, port)| PeerEntry::new(*host, *port, PeerSource::Default))
        .collect()
}

/// Bootstrap list as `host:port` strings
pub fn get_default_peers(network: Network) -> Vec<String> {
    default_peers(network).iter().map(PeerEntry::endpoint).collect()
}

impl PeerEntry {
    /// Parse `host:port`; a bare host gets the default node port
    pub fn parse(endpoint: &str, source: PeerSource) -> WalletResult<Self> {
        let trimmed = endpoint.trim();
        if trimmed.is_empty() {
            return Err(WalletError::invalid_input("Peer endpoint is empty"));
        }

        let (host, port) = if let Some(rest) = trimmed.strip_prefix('[') {
            // [v6addr] or [v6addr]:port
            let (inner, tail) = rest.split_once(']').ok_or_else(|| {
                WalletError::invalid_input(format!("Unclosed bracket in peer '{}'", trimmed))
            })?;
            let port = match (tail, tail.strip_prefix(':')) {
                ("", _) => DEFAULT_NODE_PORT,
                (_, Some(port)) => parse_port(port, trimmed)?,
                (_, None) => return Err(invalid_host(trimmed)),
            };
            if inner.is_empty() || !inner.contains(':') {
                return Err(invalid_host(trimmed));
            }
            (&trimmed[..inner.len() + 2], port)
        } else {
            match trimmed.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port, trimmed)?),
                None => (trimmed, DEFAULT_NODE_PORT),
            }
        };

        if host.is_empty()
            || host.contains(char::is_whitespace)
            || (host.contains(':') && !host.starts_with('['))
        {
            return Err(invalid_host(trimmed));
        }
        if port == 0 {
            return Err(WalletError::invalid_input("Peer port must be non-zero"));
        }

        Ok(PeerEntry::new(host.to_ascii_lowercase(), port, source))
    }
}

fn parse_port(port: &str, endpoint: &str) -> WalletResult<u16> {
    port.parse()
        .map_err(|_| WalletError::invalid_input(format!("Invalid peer port in '{}'", endpoint)))
}

fn invalid_host(endpoint: &str) -> WalletError {
    WalletError::invalid_input(format!("Invalid peer host in '{}'", endpoint))
}

/// Known peers: defaults first, then discovered ones in arrival order
pub struct PeerDirectory {
    network: Network,
    peers: RwLock<Vec<PeerEntry>>,
}

impl PeerDirectory {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            peers: RwLock::new(default_peers(network)),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Record a peer learned by the networking layer.
    /// Returns false if the endpoint is already known.
    pub fn add_discovered(&self, endpoint: &str) -> WalletResult<bool> {
        let entry = PeerEntry::parse(endpoint, PeerSource::Discovered)?;
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);

        if peers.iter().any(|p| p.endpoint() == entry.endpoint()) {
            return Ok(false);
        }
        crate::log_debug!("peers", "Discovered peer", endpoint = entry.endpoint());
        peers.push(entry);
        Ok(true)
    }

    /// Snapshot of every known peer
    pub fn peers(&self) -> Vec<PeerEntry> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.peers().iter().map(PeerEntry::endpoint).collect()
    }

    /// Drop discovered peers, keeping the defaults
    pub fn reset(&self) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|p| p.source == PeerSource::Default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_peers_stable() {
        assert_eq!(get_default_peers(Network::Mainnet), get_default_peers(Network::Mainnet));
        let peers = get_default_peers(Network::Mainnet);
        assert_eq!(peers.len(), MAINNET_PEERS.len());
        assert_eq!(peers[0], "eu-node01.mainnet.mw-wallet.org:10000");
        assert!(default_peers(Network::Testnet)
            .iter()
            .all(|p| p.source == PeerSource::Default));
    }

    #[test]
    fn test_default_tables_have_no_duplicates() {
        for network in [Network::Mainnet, Network::Testnet] {
            let mut endpoints = get_default_peers(network);
            let len = endpoints.len();
            endpoints.sort();
            endpoints.dedup();
            assert_eq!(endpoints.len(), len);
        }
    }

    #[test]
    fn test_parse_endpoint() {
        let peer = PeerEntry::parse("Node.Example.net:12000", PeerSource::Discovered).unwrap();
        assert_eq!(peer.endpoint(), "node.example.net:12000");

        let bare = PeerEntry::parse("10.0.0.1", PeerSource::Discovered).unwrap();
        assert_eq!(bare.port, DEFAULT_NODE_PORT);

        assert!(PeerEntry::parse("", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse("host:notaport", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse(":10000", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse("host:0", PeerSource::Discovered).is_err());
    }

    #[test]
    fn test_parse_ipv6_requires_brackets() {
        assert!(PeerEntry::parse("::1", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse("fe80::1:10000", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse("[::1", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse("[]:10000", PeerSource::Discovered).is_err());
        assert!(PeerEntry::parse("[::1]12000", PeerSource::Discovered).is_err());

        let peer = PeerEntry::parse("[::1]:12000", PeerSource::Discovered).unwrap();
        assert_eq!(peer.host, "[::1]");
        assert_eq!(peer.port, 12000);
        assert_eq!(peer.endpoint(), "[::1]:12000");

        let bare = PeerEntry::parse("[FE80::1]", PeerSource::Discovered).unwrap();
        assert_eq!(bare.endpoint(), "[fe80::1]:10000");
    }

    #[test]
    fn test_directory_survives_poisoned_lock() {
        let directory = std::sync::Arc::new(PeerDirectory::new(Network::Mainnet));
        directory.add_discovered("10.0.0.1:10000").unwrap();

        let holder = std::sync::Arc::clone(&directory);
        let _ = std::thread::spawn(move || {
            let _guard = holder.peers.write().unwrap();
            panic!("peer list writer died");
        })
        .join();
        assert!(directory.peers.is_poisoned());

        assert_eq!(directory.peers().len(), MAINNET_PEERS.len() + 1);
        directory.reset();
        assert_eq!(directory.peers().len(), MAINNET_PEERS.len());
        assert!(directory.add_discovered("10.0.0.2:10000").unwrap());
    }

    #[test]
    fn test_directory_dedup_and_order() {
        let directory = PeerDirectory::new(Network::Mainnet);
        assert!(directory.add_discovered("10.0.0.1:10000").unwrap());
        assert!(directory.add_discovered("10.0.0.2:10000").unwrap());
        assert!(!directory.add_discovered("10.0.0.1:10000").unwrap());
        assert!(!directory.add_discovered("eu-node01.mainnet.mw-wallet.org:10000").unwrap());

        let endpoints = directory.endpoints();
        assert_eq!(endpoints.len(), MAINNET_PEERS.len() + 2);
        assert_eq!(endpoints[MAINNET_PEERS.len()], "10.0.0.1:10000");
        assert_eq!(endpoints[MAINNET_PEERS.len() + 1], "10.0.0.2:10000");

        directory.reset();
        assert_eq!(directory.endpoints(), get_default_peers(Network::Mainnet));
    }
}
