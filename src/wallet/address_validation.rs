//! Receiver Address Validation
//!
//! Receiver addresses are Base58Check strings:
//! `version(1) || hash160(pubkey)(20) || checksum(4)` where the checksum is
//! the first four bytes of double SHA-256 over version and payload.

use bitcoin::hashes::{hash160, sha256d, Hash};
use bitcoin::secp256k1::PublicKey;
use std::fmt;

use crate::error::{WalletError, WalletResult};
use crate::types::Network;

/// Decoded length of a receiver address
pub const ADDRESS_LEN: usize = 25;

const PAYLOAD_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;

/// Checksum-validated receiver address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    payload: [u8; PAYLOAD_LEN],
}

impl Address {
    /// Address paying to a compressed public key
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        let hash = hash160::Hash::hash(&public_key.serialize());
        Self {
            network,
            payload: hash.to_byte_array(),
        }
    }

    /// Decode and verify an address for `network`
    pub fn parse(address: &str, network: Network) -> WalletResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(WalletError::invalid_input("Address is empty"));
        }

        let decoded = bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| WalletError::invalid_input("Invalid Base58 encoding"))?;

        if decoded.len() != ADDRESS_LEN {
            return Err(WalletError::invalid_input(format!(
                "Address must decode to {} bytes, got {}",
                ADDRESS_LEN,
                decoded.len()
            )));
        }

        let (body, checksum) = decoded.split_at(ADDRESS_LEN - CHECKSUM_LEN);
        if checksum_of(body) != checksum {
            return Err(WalletError::invalid_input("Invalid Base58Check checksum"));
        }

        if body[0] != network.address_version() {
            return Err(WalletError::invalid_input(format!(
                "Address is not a {} address (version 0x{:02x})",
                network, body[0]
            )));
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&body[1..]);
        Ok(Self { network, payload })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// HASH160 of the receiving public key
    pub fn payload(&self) -> &[u8; PAYLOAD_LEN] {
        &self.payload
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes = Vec::with_capacity(ADDRESS_LEN);
        bytes.push(self.network.address_version());
        bytes.extend_from_slice(&self.payload);
        let checksum = checksum_of(&bytes);
        bytes.extend_from_slice(&checksum);
        f.write_str(&bs58::encode(bytes).into_string())
    }
}

fn checksum_of(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = sha256d::Hash::hash(data).to_byte_array();
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&hash[..CHECKSUM_LEN]);
    checksum
}

/// Whether `address` is a well-formed receiver address on `network`.
/// Never fails; malformed input is simply `false`.
pub fn check_receiver_address(address: &str, network: Network) -> bool {
    Address::parse(address, network).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};

    #[test]
    fn test_known_mainnet_addresses() {
        assert!(check_receiver_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Mainnet));
        assert!(check_receiver_address("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", Network::Mainnet));
        assert!(check_receiver_address("  1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2\n", Network::Mainnet));
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        assert!(!check_receiver_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb", Network::Mainnet));
    }

    #[test]
    fn test_wrong_network_rejected() {
        assert!(!check_receiver_address("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Testnet));
    }

    #[test]
    fn test_malformed_input() {
        for bad in ["", "   ", "0OIl", "1A1zP1eP5Q", "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"] {
            assert!(!check_receiver_address(bad, Network::Mainnet), "{}", bad);
        }
        // P2SH version byte is not a receiver address
        assert!(!check_receiver_address("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", Network::Mainnet));
    }

    #[test]
    fn test_matches_bitcoin_p2pkh() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let public = secret.public_key(&secp);

        let ours = Address::from_public_key(&public, Network::Mainnet).to_string();
        let compressed = bitcoin::CompressedPublicKey(public);
        let theirs = bitcoin::Address::p2pkh(compressed, bitcoin::NetworkKind::Main).to_string();
        assert_eq!(ours, theirs);

        let testnet = Address::from_public_key(&public, Network::Testnet).to_string();
        assert!(testnet.starts_with('m') || testnet.starts_with('n'));
        assert!(check_receiver_address(&testnet, Network::Testnet));
    }

    #[test]
    fn test_parse_roundtrip() {
        let parsed = Address::parse("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", Network::Mainnet).unwrap();
        assert_eq!(parsed.to_string(), "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2");
        assert_eq!(parsed.network(), Network::Mainnet);
    }
}
