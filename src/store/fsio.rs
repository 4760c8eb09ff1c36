//! File primitives for the wallet store: bounded retry, atomic no-clobber
//! writes and the exclusive OS lock held while a wallet runs.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{WalletError, WalletResult};

/// Bounded retry for transient storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    /// Run `op`, retrying transient failures up to `max_attempts` times
    pub fn run<T>(&self, what: &'static str, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if is_transient(&e) && attempt < attempts => {
                    crate::log_warn!(
                        "store",
                        "Transient I/O failure, retrying",
                        operation = what,
                        attempt = attempt,
                        max_attempts = attempts,
                        error = e.kind()
                    );
                    std::thread::sleep(Duration::from_millis(self.backoff_ms * u64::from(attempt)));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Read a whole file
pub fn read_file(path: &Path, retry: &RetryPolicy) -> WalletResult<Vec<u8>> {
    retry.run("read", || fs::read(path)).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            WalletError::not_found(format!("No wallet store at {}", path.display()))
        } else {
            WalletError::from(e)
        }
    })
}

/// Write `bytes` to `path` atomically, failing if `path` already exists.
///
/// The content goes to a private temp file in the same directory, is synced,
/// and is then hard-linked into place. A reader never sees a partial file.
pub fn write_new_atomic(path: &Path, bytes: &[u8], retry: &RetryPolicy) -> WalletResult<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir)?;

    let tmp = temp_path(path);
    let result = write_temp(&tmp, bytes, retry).and_then(|()| link_no_clobber(&tmp, path));
    let _ = fs::remove_file(&tmp);
    result?;

    sync_dir(&dir);
    Ok(())
}

fn write_temp(tmp: &Path, bytes: &[u8], retry: &RetryPolicy) -> WalletResult<()> {
    let mut file = open_private(tmp)?;
    retry.run("write", || {
        // Start over so a retried partial write does not duplicate bytes
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(bytes)
    })?;
    retry.run("sync", || file.sync_all())?;
    Ok(())
}

fn link_no_clobber(tmp: &Path, path: &Path) -> WalletResult<()> {
    match fs::hard_link(tmp, path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(WalletError::already_exists(
            format!("A wallet store already exists at {}", path.display()),
        )),
        // Filesystems without hard links: rename cannot refuse to clobber, so
        // check first. The store mutex keeps this process from racing itself.
        Err(_) => {
            if path.exists() {
                return Err(WalletError::already_exists(format!(
                    "A wallet store already exists at {}",
                    path.display()
                )));
            }
            fs::rename(tmp, path)?;
            Ok(())
        }
    }
}

fn open_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wallet".to_string());
    parent_dir(path).join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// Path of the lock file guarding `store`
pub fn lock_path(store: &Path) -> PathBuf {
    let mut name = store.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive OS lock on `<store>.lock`, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Take the lock without blocking; `WalletBusy` if someone else holds it
    pub fn acquire(store: &Path) -> WalletResult<Self> {
        let path = lock_path(store);
        let mut options = OpenOptions::new();
        options.create(true).read(true).write(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if is_contended(&e) => Err(WalletError::wallet_busy(format!(
                "Wallet store {} is in use by another process",
                store.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::cell::Cell;

    #[test]
    fn test_retry_is_bounded() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_ms: 0,
        };
        let result: io::Result<()> = policy.run("test", || {
            calls.set(calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_recovers_and_skips_permanent_errors() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff_ms: 0,
        };
        let value = policy
            .run("test", || {
                calls.set(calls.get() + 1);
                if calls.get() < 2 {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "slow disk"))
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(value, 7);

        calls.set(0);
        let result: io::Result<()> = policy.run("test", || {
            calls.set(calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_write_new_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wallet.db");

        write_new_atomic(&path, b"first", &RetryPolicy::none()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        let err = write_new_atomic(&path, b"second", &RetryPolicy::none()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"first");

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_store_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.db");
        write_new_atomic(&path, b"data", &RetryPolicy::none()).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("absent"), &RetryPolicy::none()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("wallet.db");

        let first = StoreLock::acquire(&store).unwrap();
        assert_eq!(first.path(), lock_path(&store));
        let err = StoreLock::acquire(&store).unwrap_err();
        assert_eq!(err.code, ErrorCode::WalletBusy);

        drop(first);
        assert!(StoreLock::acquire(&store).is_ok());
    }
}
