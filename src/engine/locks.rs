// src/engine/locks.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

/// One async lock per parent file.
///
/// Two `process` calls for the same file run one after the other; calls for
/// different files do not wait on each other. An entry lives only while some
/// call holds or waits for it.
#[derive(Debug, Default)]
pub struct ParentLocks {
    locks: Mutex<LockMap>,
}

impl ParentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, parent: &Path) -> ParentGuard<'_> {
        let lock = Arc::clone(self.map().entry(parent.to_path_buf()).or_default());
        let guard = lock.lock_owned().await;
        ParentGuard {
            owner: self,
            parent: parent.to_path_buf(),
            guard: Some(guard),
        }
    }

    /// Parents with a live entry.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Held for the duration of one `process` call.
#[derive(Debug)]
pub struct ParentGuard<'a> {
    owner: &'a ParentLocks,
    parent: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ParentGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.owner.map();
        // Waiters hold a clone, so a count of one means nobody else wants it.
        if map
            .get(&self.parent)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.parent);
        }
    }
}
