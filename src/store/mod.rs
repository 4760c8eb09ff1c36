//! Wallet State Store
//!
//! Owns the encrypted wallet files and the per-process "one running wallet"
//! rule. Handle states: `Uninitialized -> Closed -> Running -> Closed -> Destroyed`.
//!
//! The running slot of one `WalletRuntime` sits behind its mutex. Key
//! derivation in create/open runs outside it; the slot is checked before and
//! re-checked when the result is committed. While a wallet runs, the store
//! also holds an exclusive OS lock on `<path>.lock`.

mod encrypted;
mod fsio;

pub use encrypted::{
    seal, unseal, KdfParams, KdfSection, StoreBody, StoreFile, StoreHeader, FORMAT_VERSION,
    MAX_MEMORY_COST, MAX_PARALLELISM, MAX_TIME_COST, PROTOCOL_VERSION, STORE_FORMAT,
};
pub use fsio::{lock_path, read_file, write_new_atomic, RetryPolicy, StoreLock};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::types::{Network, WalletInfo, WalletMetadata, WalletStatus};
use crate::utils::settings::EngineSettings;
use crate::wallet::{receive_path, Address, ChildKey, KeyPath, MasterKey, WatchOnlyKey};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable part of a handle, shared with the runtime while running
struct Session {
    status: WalletStatus,
    key: Option<MasterKey>,
}

impl Session {
    fn wipe(&mut self) {
        // MasterKey erases its secret on drop
        self.key = None;
    }
}

struct ActiveWallet {
    id: String,
    path: PathBuf,
    session: Arc<Mutex<Session>>,
    _lock: StoreLock,
}

#[derive(Default)]
struct RuntimeState {
    active: Option<ActiveWallet>,
}

/// Process-level wallet runtime. Hosts normally keep exactly one.
#[derive(Default)]
pub struct WalletRuntime {
    state: Mutex<RuntimeState>,
}

impl WalletRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Handle to one wallet
pub struct Wallet {
    info: WalletInfo,
    runtime_meta: WalletMetadata,
    network: Network,
    session: Arc<Mutex<Session>>,
    recovery_phrase: Mutex<Option<Zeroizing<String>>>,
}

impl Wallet {
    fn new(info: WalletInfo, runtime_meta: WalletMetadata, network: Network, session: Session) -> Self {
        Self {
            info,
            runtime_meta,
            network,
            session: Arc::new(Mutex::new(session)),
            recovery_phrase: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn path(&self) -> &Path {
        &self.info.path
    }

    /// Protocol version the wallet was created with
    pub fn protocol_version(&self) -> u32 {
        self.info.protocol_version
    }

    pub fn info(&self) -> &WalletInfo {
        &self.info
    }

    /// App version and node address of the current session
    pub fn runtime_metadata(&self) -> &WalletMetadata {
        &self.runtime_meta
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn status(&self) -> WalletStatus {
        lock(&self.session).status
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    fn with_key<T>(&self, f: impl FnOnce(&MasterKey) -> WalletResult<T>) -> WalletResult<T> {
        let session = lock(&self.session);
        match (&session.status, &session.key) {
            (WalletStatus::Running, Some(key)) => f(key),
            (status, _) => Err(WalletError::not_running(format!(
                "Wallet {} is {:?}",
                self.info.id, status
            ))),
        }
    }

    pub fn derive_child_key(&self, path: &KeyPath) -> WalletResult<ChildKey> {
        self.with_key(|key| key.derive_child(path))
    }

    /// Receiver address `index` of account 0
    pub fn receive_address(&self, index: u32) -> WalletResult<Address> {
        let path = receive_path(self.network, 0, index);
        self.with_key(|key| Ok(key.derive_child(&path)?.address(self.network)))
    }

    pub fn watch_only_account(&self, account: u32) -> WalletResult<WatchOnlyKey> {
        self.with_key(|key| key.watch_only_account(self.network, account))
    }

    pub(crate) fn attach_recovery_phrase(&self, phrase: Zeroizing<String>) {
        *lock(&self.recovery_phrase) = Some(phrase);
    }

    /// Phrase generated for a new wallet. Returned once, then gone.
    pub fn take_recovery_phrase(&self) -> Option<Zeroizing<String>> {
        lock(&self.recovery_phrase).take()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.info.id)
            .field("path", &self.info.path)
            .field("status", &self.status())
            .finish()
    }
}

/// Encrypted wallet files plus the runtime that tracks the running wallet
#[derive(Clone)]
pub struct WalletStore {
    runtime: Arc<WalletRuntime>,
    network: Network,
    kdf: KdfParams,
    retry: RetryPolicy,
}

impl WalletStore {
    pub fn new(settings: &EngineSettings) -> Self {
        Self::with_runtime(Arc::new(WalletRuntime::new()), settings)
    }

    /// Share an existing runtime
    pub fn with_runtime(runtime: Arc<WalletRuntime>, settings: &EngineSettings) -> Self {
        Self {
            runtime,
            network: settings.network,
            kdf: settings.kdf,
            retry: settings.io_retry,
        }
    }

    pub fn runtime(&self) -> &Arc<WalletRuntime> {
        &self.runtime
    }

    /// Whether a well-formed store exists at `path`. No password needed.
    pub fn is_initialized(&self, path: &Path) -> bool {
        self.read_store(path).is_ok()
    }

    /// Public description of the store at `path`. No password needed.
    pub fn inspect(&self, path: &Path) -> WalletResult<WalletInfo> {
        let file = self.read_store(path)?;
        Ok(info_from_header(&file.body.header, path))
    }

    fn ensure_idle(&self) -> WalletResult<()> {
        match &lock(&self.runtime.state).active {
            Some(active) => Err(busy(active)),
            None => Ok(()),
        }
    }

    fn read_store(&self, path: &Path) -> WalletResult<StoreFile> {
        let bytes = read_file(path, &self.retry)?;
        StoreFile::from_slice(&bytes)
    }

    /// Encrypt `master` into a new store. The returned handle is `Closed`.
    pub fn create(
        &self,
        path: &Path,
        password: &str,
        master: &MasterKey,
        metadata: &WalletMetadata,
    ) -> WalletResult<Wallet> {
        self.ensure_idle()?;
        if path.exists() {
            return Err(WalletError::already_exists(format!(
                "A wallet store already exists at {}",
                path.display()
            )));
        }

        let header = StoreHeader {
            id: uuid::Uuid::new_v4().to_string(),
            protocol_version: PROTOCOL_VERSION,
            app_version: metadata.app_version.clone(),
            node_addr: metadata.node_addr.clone(),
            fingerprint: master.fingerprint(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let file = seal(master, password, header, &self.kdf)?;

        // Argon2 ran unlocked; commit only if nothing started meanwhile
        let state = lock(&self.runtime.state);
        if let Some(active) = &state.active {
            return Err(busy(active));
        }
        write_new_atomic(path, &file.to_vec()?, &self.retry)?;
        drop(state);

        crate::log_info!(
            "store",
            "Wallet store created",
            wallet_id = file.body.header.id,
            store_path = path.display()
        );

        let info = info_from_header(&file.body.header, path);
        Ok(Wallet::new(
            info,
            metadata.clone(),
            self.network,
            Session {
                status: WalletStatus::Closed,
                key: None,
            },
        ))
    }

    /// Decrypt the store at `path`. The returned handle is `Running`.
    pub fn open(&self, path: &Path, password: &str, runtime_meta: WalletMetadata) -> WalletResult<Wallet> {
        self.ensure_idle()?;

        let file = self.read_store(path)?;
        let store_lock = StoreLock::acquire(path)?;
        let master = match unseal(&file, password) {
            Ok(master) => master,
            Err(e) => {
                crate::log_warn!(
                    "store",
                    "Wallet open failed",
                    store_path = path.display(),
                    code = e.code
                );
                return Err(e);
            }
        };

        let info = info_from_header(&file.body.header, path);
        let wallet = Wallet::new(
            info,
            runtime_meta,
            self.network,
            Session {
                status: WalletStatus::Running,
                key: Some(master),
            },
        );

        let mut state = lock(&self.runtime.state);
        if let Some(active) = &state.active {
            return Err(busy(active));
        }
        state.active = Some(ActiveWallet {
            id: wallet.info.id.clone(),
            path: path.to_path_buf(),
            session: Arc::clone(&wallet.session),
            _lock: store_lock,
        });

        crate::log_info!("store", "Wallet opened", wallet_id = wallet.info.id);
        Ok(wallet)
    }

    /// Wipe key material and mark the handle `Closed`. Idempotent.
    pub fn close(&self, wallet: &Wallet) {
        let mut state = lock(&self.runtime.state);
        let is_active = state
            .active
            .as_ref()
            .map_or(false, |a| Arc::ptr_eq(&a.session, &wallet.session));
        if is_active {
            if let Some(active) = state.active.take() {
                close_session(&active.session);
                crate::log_info!("store", "Wallet closed", wallet_id = active.id);
            }
        } else {
            close_session(&wallet.session);
        }
    }

    /// Close whatever wallet is running. Returns false if none was.
    pub fn close_running(&self) -> bool {
        let mut state = lock(&self.runtime.state);
        match state.active.take() {
            Some(active) => {
                close_session(&active.session);
                crate::log_info!("store", "Wallet closed", wallet_id = active.id);
                true
            }
            None => false,
        }
    }

    /// Close if needed and invalidate the handle for good
    pub fn release(&self, wallet: Wallet) {
        self.close(&wallet);
        lock(&wallet.session).status = WalletStatus::Destroyed;
    }

    /// Whether any wallet on this runtime is running.
    /// Never waits on key derivation; the runtime mutex is only held to
    /// check and commit the running slot.
    pub fn is_running(&self) -> bool {
        lock(&self.runtime.state).active.is_some()
    }

    /// Path of the running wallet, if any
    pub fn running_path(&self) -> Option<PathBuf> {
        lock(&self.runtime.state).active.as_ref().map(|a| a.path.clone())
    }
}

fn close_session(session: &Mutex<Session>) {
    let mut session = lock(session);
    session.wipe();
    if session.status == WalletStatus::Running {
        session.status = WalletStatus::Closed;
    }
}

fn busy(active: &ActiveWallet) -> WalletError {
    WalletError::wallet_busy("Another wallet is already running")
        .with_details(format!("running wallet id {}", active.id))
}

fn info_from_header(header: &StoreHeader, path: &Path) -> WalletInfo {
    WalletInfo {
        id: header.id.clone(),
        path: path.to_path_buf(),
        protocol_version: header.protocol_version,
        created_with: WalletMetadata::new(header.app_version.clone(), header.node_addr.clone()),
        fingerprint: header.fingerprint.clone(),
        created_at: header.created_at.clone(),
    }
}
