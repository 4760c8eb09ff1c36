//! Wallet Module
//!
//! Mnemonic generation, key derivation, receiver address validation and the
//! peer directory. Everything here is stateless and safe to call from any
//! thread; lifecycle state lives in `crate::store`.

mod address_validation;
mod derivation;
mod derivation_path;
mod mnemonic;
pub mod peers;

pub use address_validation::*;
pub use derivation::*;
pub use derivation_path::*;
pub use mnemonic::*;
pub use peers::{default_peers, get_default_peers, PeerDirectory, DEFAULT_PEERS_VERSION};
