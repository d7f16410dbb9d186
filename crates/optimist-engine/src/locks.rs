//! Per-key serialization for keyed operations.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per key, created on demand and dropped once unused.
pub(crate) struct KeyLocks<K> {
    locks: Mutex<BTreeMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Ord + Clone> KeyLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Wait for exclusive access to `key`. Returns `None` without waiting
    /// when serialization is disabled.
    pub(crate) async fn acquire(&self, key: &K, enabled: bool) -> Option<OwnedMutexGuard<()>> {
        if !enabled {
            return None;
        }
        let lock = {
            let mut locks = self.locks.lock().expect("key lock table poisoned");
            // Only the table holds a lock nobody is waiting on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        Some(lock.lock_owned().await)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().expect("key lock table poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn disabled_never_blocks() {
        let locks = KeyLocks::new();
        let first = locks.acquire(&1u8, false).await;
        let second = locks.acquire(&1u8, false).await;
        assert!(first.is_none() && second.is_none());
        assert_eq!(locks.tracked(), 0);
    }

    #[tokio::test]
    async fn same_key_waits_other_keys_do_not() {
        let locks = Arc::new(KeyLocks::new());
        let held = locks.acquire(&"a", true).await;
        assert!(held.is_some());

        // Another key is free.
        let other = locks.acquire(&"b", true).await;
        assert!(other.is_some());

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire(&"a", true).await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn unused_locks_are_pruned() {
        let locks = KeyLocks::new();
        drop(locks.acquire(&1u32, true).await);
        drop(locks.acquire(&2u32, true).await);
        // The second acquire pruned key 1; key 2 is pruned on the next one.
        assert_eq!(locks.tracked(), 1);
        drop(locks.acquire(&3u32, true).await);
        assert_eq!(locks.tracked(), 1);
    }
}
