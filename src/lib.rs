//! Wallet Engine Library
//!
//! Native core of a wallet application. The host calls into it for
//! everything that touches key material.
//!
//! # Architecture
//!
//! This crate provides:
//! - **wallet**: Mnemonics, key derivation, receiver addresses, default peers
//! - **store**: Password-encrypted wallet files and the running-wallet rule
//! - **lifecycle**: `WalletEngine`, the create/open/restore/close surface
//! - **utils**: Settings and redacting logging
//!
//! # Security
//!
//! This crate uses `zeroize` to securely clear sensitive data from memory.
//! Seeds, entropy and master keys are erased when dropped, and errors never
//! carry passwords, phrases or key bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use wallet_engine::{EngineSettings, WalletEngine};
//!
//! let engine = WalletEngine::new(EngineSettings::standard())?;
//! let wallet = engine.create_wallet("1.0.0", "127.0.0.1:10000", "main.wallet", "pw", None, false)?;
//! let phrase = wallet.take_recovery_phrase();
//! println!("First address: {}", wallet.receive_address(0)?);
//! engine.close_wallet();
//! ```

pub mod error;
pub mod lifecycle;
pub mod store;
pub mod types;
pub mod utils;
pub mod wallet;

pub use error::{ErrorCode, WalletError, WalletResult};
pub use lifecycle::WalletEngine;
pub use store::{Wallet, WalletRuntime, WalletStore};
pub use types::*;
pub use utils::settings::EngineSettings;
