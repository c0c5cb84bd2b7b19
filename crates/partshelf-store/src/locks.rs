// ABOUTME: Registry of per-library-instance async mutexes.
// ABOUTME: Serializes the ledger check, conversion, and ledger record sequence per instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// One lock per library instance directory. Requests targeting different
/// instances proceed in parallel; requests targeting the same instance run
/// their check-then-record sequences one after another.
#[derive(Debug, Default)]
pub struct LibraryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl LibraryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `instance_dir`. The guard releases the
    /// lock when dropped.
    pub async fn acquire(&self, instance_dir: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(instance_dir.to_path_buf()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_instance_is_exclusive() {
        let locks = Arc::new(LibraryLocks::new());
        let guard = locks.acquire(Path::new("/lib/a")).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(Path::new("/lib/a")).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished(), "second acquire should wait");

        drop(guard);
        tokio::time::timeout(Duration::from_secs(2), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn different_instances_do_not_block() {
        let locks = LibraryLocks::new();
        let _a = locks.acquire(Path::new("/lib/a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(Path::new("/lib/b"))).await;
        assert!(b.is_ok());
    }
}
