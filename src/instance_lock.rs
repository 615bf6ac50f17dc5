//! Single instance lock using Unix socket.
//!
//! Two notifiers watching the same sensor would issue every create/dismiss
//! call twice. Uses a Unix socket which is automatically cleaned up by the OS
//! when the process dies, avoiding stale lock files.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOCKET_NAME: &str = "weather-warning-notifier.sock";

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another instance is already running.
    #[error("another instance is already running")]
    AlreadyRunning,

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Single instance lock using a Unix socket.
///
/// The lock is held as long as this struct exists. When dropped, the socket
/// file is removed.
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at the default socket path.
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(Self::socket_path())
    }

    /// Acquire the lock at `path`.
    pub fn acquire_at(path: PathBuf) -> Result<Self, InstanceLockError> {
        // A socket file nobody listens on is left over from a SIGKILL'd process.
        if path.exists() {
            match UnixStream::connect(&path) {
                Ok(_) => return Err(InstanceLockError::AlreadyRunning),
                Err(_) => {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                // Race condition: another instance bound between our check and bind
                Err(InstanceLockError::AlreadyRunning)
            }
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the path to the socket file.
    pub fn socket_path() -> PathBuf {
        socket_path_in(std::env::var("XDG_RUNTIME_DIR").ok())
    }
}

/// Socket path inside the runtime dir (auto-cleaned on logout), or /tmp.
fn socket_path_in(runtime_dir: Option<String>) -> PathBuf {
    runtime_dir
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_NAME)
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Clean up the socket file on normal exit
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_socket(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wwn-test-{}-{}.sock", name, std::process::id()))
    }

    #[test]
    fn test_socket_path_uses_runtime_dir() {
        assert_eq!(
            socket_path_in(Some("/run/user/1000".to_string())),
            PathBuf::from("/run/user/1000/weather-warning-notifier.sock")
        );
    }

    #[test]
    fn test_socket_path_fallback_to_tmp() {
        assert_eq!(
            socket_path_in(None),
            PathBuf::from("/tmp/weather-warning-notifier.sock")
        );
        assert_eq!(
            socket_path_in(Some(String::new())),
            PathBuf::from("/tmp/weather-warning-notifier.sock")
        );
    }

    #[test]
    fn test_second_acquire_fails_while_held() {
        let path = temp_socket("held");
        let lock = InstanceLock::acquire_at(path.clone()).unwrap();
        assert!(matches!(
            InstanceLock::acquire_at(path.clone()),
            Err(InstanceLockError::AlreadyRunning)
        ));

        drop(lock);
        assert!(!path.exists());

        let relock = InstanceLock::acquire_at(path.clone()).unwrap();
        assert_eq!(relock.path(), path.as_path());
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let path = temp_socket("stale");
        let _ = std::fs::remove_file(&path);
        std::fs::write(&path, b"").unwrap();

        let lock = InstanceLock::acquire_at(path.clone()).unwrap();
        assert_eq!(lock.path(), path.as_path());
    }
}
