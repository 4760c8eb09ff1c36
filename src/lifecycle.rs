//! Wallet Lifecycle Controller
//!
//! `WalletEngine` is the surface a host application talks to. It validates
//! inputs, turns a recovery phrase into a master key, and hands persistence
//! and the running-wallet rule to `WalletStore`. Store errors pass through
//! unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{WalletError, WalletResult};
use crate::store::{Wallet, WalletStore};
use crate::types::{PeerEntry, WalletInfo, WalletMetadata};
use crate::utils::settings::EngineSettings;
use crate::wallet::{
    check_receiver_address, derive_master_key, derive_seed, dictionary, generate_mnemonic,
    get_default_peers, parse_mnemonic, PeerDirectory,
};

/// Entry point for hosts
#[derive(Clone)]
pub struct WalletEngine {
    settings: EngineSettings,
    store: WalletStore,
    peers: Arc<PeerDirectory>,
}

impl WalletEngine {
    /// Engine with its own runtime
    pub fn new(settings: EngineSettings) -> WalletResult<Self> {
        let store = WalletStore::new(&settings);
        Self::with_store(settings, store)
    }

    /// Engine over an existing store (and its runtime)
    pub fn with_store(settings: EngineSettings, store: WalletStore) -> WalletResult<Self> {
        settings.validate()?;
        let peers = Arc::new(PeerDirectory::new(settings.network));
        Ok(Self {
            settings,
            store,
            peers,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.peers
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.settings.resolve_path(path)
    }

    fn metadata(&self, app_version: &str, node_addr: &str) -> WalletMetadata {
        let node_addr = match (node_addr.trim(), &self.settings.node_addr) {
            ("", Some(fallback)) => fallback.clone(),
            (given, _) => given.to_string(),
        };
        WalletMetadata::new(app_version, node_addr)
    }

    fn check_password(&self, password: &str) -> WalletResult<()> {
        if password.chars().count() < self.settings.min_password_len {
            return Err(WalletError::invalid_input(format!(
                "Password must be at least {} characters",
                self.settings.min_password_len
            )));
        }
        Ok(())
    }

    /// Whether a valid wallet store exists at `path`
    pub fn is_wallet_initialized(&self, path: impl AsRef<Path>) -> bool {
        self.store.is_initialized(&self.resolve(path.as_ref()))
    }

    /// Public header of the store at `path`
    pub fn inspect_wallet(&self, path: impl AsRef<Path>) -> WalletResult<WalletInfo> {
        self.store.inspect(&self.resolve(path.as_ref()))
    }

    /// Close the running wallet, if any
    pub fn close_wallet(&self) {
        if !self.store.close_running() {
            crate::log_debug!("lifecycle", "close_wallet with no running wallet");
        }
    }

    pub fn is_wallet_running(&self) -> bool {
        self.store.is_running()
    }

    /// Create a wallet, or restore one from `mnemonic_phrase` when `restore`
    /// is set. The wallet is running when this returns.
    ///
    /// Without a phrase a fresh one is generated; read it once through
    /// `Wallet::take_recovery_phrase`.
    pub fn create_wallet(
        &self,
        app_version: &str,
        node_addr: &str,
        path: impl AsRef<Path>,
        password: &str,
        mnemonic_phrase: Option<&str>,
        restore: bool,
    ) -> WalletResult<Wallet> {
        let path = self.resolve(path.as_ref());
        self.check_password(password)?;

        let phrase = mnemonic_phrase.filter(|p| !p.trim().is_empty());
        let (mnemonic, generated) = match phrase {
            Some(phrase) => (parse_mnemonic(phrase)?, false),
            None if restore => {
                return Err(WalletError::invalid_mnemonic(
                    "A recovery phrase is required to restore a wallet",
                ))
            }
            None => (generate_mnemonic(self.settings.word_count)?, true),
        };

        let master = derive_master_key(&derive_seed(&mnemonic, ""))?;
        let metadata = self.metadata(app_version, node_addr);

        self.store.create(&path, password, &master, &metadata)?;
        let wallet = self.store.open(&path, password, metadata)?;

        if generated {
            wallet.attach_recovery_phrase(mnemonic.phrase());
        }

        crate::log_info!(
            "lifecycle",
            "Wallet ready",
            wallet_id = wallet.id(),
            restored = restore,
            words = mnemonic.word_count()
        );
        Ok(wallet)
    }

    /// Restore a wallet from its recovery phrase
    pub fn restore_wallet(
        &self,
        app_version: &str,
        node_addr: &str,
        path: impl AsRef<Path>,
        password: &str,
        mnemonic_phrase: &str,
    ) -> WalletResult<Wallet> {
        self.create_wallet(app_version, node_addr, path, password, Some(mnemonic_phrase), true)
    }

    /// Open an existing wallet and make it the running one
    pub fn open_wallet(
        &self,
        app_version: &str,
        node_addr: &str,
        path: impl AsRef<Path>,
        password: &str,
    ) -> WalletResult<Wallet> {
        let path = self.resolve(path.as_ref());
        let metadata = self.metadata(app_version, node_addr);
        self.store.open(&path, password, metadata)
    }

    /// Fresh recovery phrase, as words
    pub fn create_mnemonic(&self) -> WalletResult<Vec<String>> {
        Ok(generate_mnemonic(self.settings.word_count)?.words())
    }

    /// The word list phrases are drawn from, in index order
    pub fn get_dictionary(&self) -> Vec<String> {
        dictionary().iter().map(|w| w.to_string()).collect()
    }

    pub fn check_receiver_address(&self, address: &str) -> bool {
        check_receiver_address(address, self.settings.network)
    }

    /// Bootstrap peers as `host:port`
    pub fn get_default_peers(&self) -> Vec<String> {
        get_default_peers(self.settings.network)
    }

    /// Bootstrap plus discovered peers
    pub fn known_peers(&self) -> Vec<PeerEntry> {
        self.peers.peers()
    }

    /// `create_wallet` on the blocking pool
    pub async fn create_wallet_async(
        &self,
        app_version: String,
        node_addr: String,
        path: PathBuf,
        password: zeroize::Zeroizing<String>,
        mnemonic_phrase: Option<zeroize::Zeroizing<String>>,
        restore: bool,
    ) -> WalletResult<Wallet> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.create_wallet(
                &app_version,
                &node_addr,
                &path,
                &password,
                mnemonic_phrase.as_deref().map(String::as_str),
                restore,
            )
        })
        .await?
    }

    /// `open_wallet` on the blocking pool
    pub async fn open_wallet_async(
        &self,
        app_version: String,
        node_addr: String,
        path: PathBuf,
        password: zeroize::Zeroizing<String>,
    ) -> WalletResult<Wallet> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.open_wallet(&app_version, &node_addr, &path, &password)
        })
        .await?
    }
}
