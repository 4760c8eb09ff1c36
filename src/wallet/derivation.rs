//! Key Derivation
//!
//! Derives the BIP-32 master key from a seed and child keys from the master
//! key along a `KeyPath`. Everything here is a pure function of its inputs.
//!
//! SECURITY: All private key material is erased when no longer needed.

use bitcoin::bip32::{Xpriv, Xpub};
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use bitcoin::NetworkKind;
use std::fmt;
use std::sync::OnceLock;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::types::Network;

use super::address_validation::Address;
use super::derivation_path::{account_path, receive_path, KeyPath};
use super::mnemonic::Seed;

/// Length of a serialized extended private key
pub const MASTER_KEY_LEN: usize = 78;

fn secp() -> &'static Secp256k1<All> {
    static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}

/// Root of all wallet keys. Lives in memory only.
pub struct MasterKey {
    xpriv: Xpriv,
}

impl MasterKey {
    /// Hex fingerprint of the master public key
    pub fn fingerprint(&self) -> String {
        hex::encode(self.xpriv.fingerprint(secp()).as_bytes())
    }

    /// Derive the key at `path`
    pub fn derive_child(&self, path: &KeyPath) -> WalletResult<ChildKey> {
        let derivation = path.to_derivation_path()?;
        let child = self.xpriv.derive_priv(secp(), &derivation)?;

        Ok(ChildKey {
            path: path.clone(),
            secret: child.private_key,
            public: child.private_key.public_key(secp()),
        })
    }

    /// Extended public key at the master level
    pub fn watch_only(&self) -> WatchOnlyKey {
        WatchOnlyKey {
            xpub: Xpub::from_priv(secp(), &self.xpriv),
            base: KeyPath::master(),
        }
    }

    /// Extended public key at m/44'/coin'/account', enough to derive every
    /// receive address of that account without the spending key
    pub fn watch_only_account(&self, network: Network, account: u32) -> WalletResult<WatchOnlyKey> {
        let base = account_path(network, account);
        let account_key = self.xpriv.derive_priv(secp(), &base.to_derivation_path()?)?;
        Ok(WatchOnlyKey {
            xpub: Xpub::from_priv(secp(), &account_key),
            base,
        })
    }

    /// Receiver address at the standard path
    pub fn receive_address(&self, network: Network, account: u32, index: u32) -> WalletResult<Address> {
        let child = self.derive_child(&receive_path(network, account, index))?;
        Ok(Address::from_public_key(&child.public_key(), network))
    }

    pub(crate) fn to_bytes(&self) -> Zeroizing<[u8; MASTER_KEY_LEN]> {
        Zeroizing::new(self.xpriv.encode())
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        if bytes.len() != MASTER_KEY_LEN {
            return Err(WalletError::corrupted(format!(
                "Master key must be {} bytes, got {}",
                MASTER_KEY_LEN,
                bytes.len()
            )));
        }
        let xpriv = Xpriv::decode(bytes)
            .map_err(|_| WalletError::corrupted("Stored master key is malformed"))?;
        if xpriv.depth != 0 {
            return Err(WalletError::corrupted("Stored key is not a master key"));
        }
        Ok(Self { xpriv })
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes()[..].ct_eq(&other.to_bytes()[..]).into()
    }
}

impl Eq for MasterKey {}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.xpriv.private_key.non_secure_erase();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// Key derived at a specific path
pub struct ChildKey {
    path: KeyPath,
    secret: SecretKey,
    public: PublicKey,
}

impl ChildKey {
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Compressed SEC1 public key (33 bytes)
    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public.serialize()
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.secret_bytes())
    }

    pub fn address(&self, network: Network) -> Address {
        Address::from_public_key(&self.public, network)
    }
}

impl PartialEq for ChildKey {
    fn eq(&self, other: &Self) -> bool {
        let same_secret: bool = self.secret_bytes()[..].ct_eq(&other.secret_bytes()[..]).into();
        same_secret && self.public == other.public && self.path == other.path
    }
}

impl Drop for ChildKey {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildKey")
            .field("path", &self.path.to_string())
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish()
    }
}

/// Extended public key for watch-only derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOnlyKey {
    xpub: Xpub,
    base: KeyPath,
}

impl WatchOnlyKey {
    /// Path of this key relative to the master
    pub fn base_path(&self) -> &KeyPath {
        &self.base
    }

    /// Public key at `relative`, which must not contain hardened steps
    pub fn derive_public(&self, relative: &KeyPath) -> WalletResult<PublicKey> {
        if relative.has_hardened() {
            return Err(WalletError::invalid_path(
                "Watch-only keys cannot derive hardened children",
            ));
        }
        let derivation = relative.to_derivation_path()?;
        Ok(self.xpub.derive_pub(secp(), &derivation)?.public_key)
    }

    /// Serialized `xpub`
    pub fn encode(&self) -> String {
        self.xpub.to_string()
    }
}

/// Derive the master key from a seed
pub fn derive_master_key(seed: &Seed) -> WalletResult<MasterKey> {
    let xpriv = Xpriv::new_master(NetworkKind::Main, seed.as_bytes())?;
    Ok(MasterKey { xpriv })
}

/// Derive the key at `path` from the master key
pub fn derive_child_key(master: &MasterKey, path: &KeyPath) -> WalletResult<ChildKey> {
    master.derive_child(path)
}
