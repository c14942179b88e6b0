//! Per-case serialization of commands.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per case instance.
///
/// Commands against the same case run one at a time inside this process;
/// commands against different cases proceed concurrently. Across processes
/// the `IMMEDIATE` transaction of each command provides the same guarantee.
#[derive(Debug, Clone, Default)]
pub struct CaseLocks {
    inner: Arc<Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>>,
}

impl CaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other command holds `case_id`, then holds it until the
    /// returned guard is dropped.
    pub async fn lock(&self, case_id: u64) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            // entries nobody holds or waits for
            locks.retain(|id, mutex| *id == case_id || Arc::strong_count(mutex) > 1);
            Arc::clone(locks.entry(case_id).or_default())
        };
        mutex.lock_owned().await
    }

    /// Number of cases currently tracked.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_case_is_serialized() {
        let locks = CaseLocks::new();
        let guard = locks.lock(1).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_cases_do_not_block() {
        let locks = CaseLocks::new();
        let _first = locks.lock(1).await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.lock(2)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = CaseLocks::new();
        drop(locks.lock(1).await);
        drop(locks.lock(2).await);
        drop(locks.lock(3).await);
        assert_eq!(locks.len(), 1);
    }
}
