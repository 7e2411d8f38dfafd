//! Per-resource mutual exclusion
//!
//! Serializes operations that touch the same logical entity (a post, a comment)
//! independently of the storage engine's own isolation. The registry map is
//! guarded by a short-lived synchronous mutex; the per-key locks are async and
//! may be held across `.await`.
//!
//! Entries are reference counted: a key's lock stays cached while any handle,
//! holder or waiter references it, and is evicted when the last guard for it is
//! released, so the map only grows with the number of keys currently in use.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

pub type ResourceLock = Arc<AsyncMutex<()>>;

#[derive(Debug, Default)]
pub struct ResourceLocks {
    entries: Mutex<HashMap<String, ResourceLock>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `key`, creating it on first use.
    ///
    /// While any clone of the returned handle is alive, every call with the
    /// same key yields the identical lock instance.
    pub fn lock_for(&self, key: &str) -> ResourceLock {
        let mut entries = self.entries.lock();
        entries
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits until `key` is free and holds it until the guard is dropped.
    ///
    /// Dropping the returned future while it is still queued gives up the
    /// place in line and evicts the key if nobody else references it.
    pub async fn acquire(&self, key: &str) -> ResourceGuard<'_> {
        let guard = Waiter {
            registry: self,
            key,
            wait: Some(self.lock_for(key).lock_owned().boxed()),
        }
        .await;
        trace!(key, "resource lock acquired");
        ResourceGuard {
            registry: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently cached.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries.lock();
        // Handles are only cloned under this mutex, so a count of one means
        // the map holds the sole reference and nobody is holding or waiting.
        if entries
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            entries.remove(key);
        }
    }
}

/// A queued `acquire`. Runs the eviction check when dropped, whether or not
/// the lock was obtained.
struct Waiter<'a> {
    registry: &'a ResourceLocks,
    key: &'a str,
    wait: Option<BoxFuture<'static, OwnedMutexGuard<()>>>,
}

impl Future for Waiter<'_> {
    type Output = OwnedMutexGuard<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.wait.as_mut() {
            Some(wait) => wait.poll_unpin(cx),
            None => Poll::Pending,
        }
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        // The pending wait owns a handle; release it before the check.
        drop(self.wait.take());
        self.registry.release(self.key);
    }
}

/// Exclusive hold on one resource key.
#[derive(Debug)]
pub struct ResourceGuard<'a> {
    registry: &'a ResourceLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ResourceGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the guard's own reference is gone before the
        // eviction check.
        drop(self.guard.take());
        self.registry.release(&self.key);
        trace!(key = %self.key, "resource lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_same_key_returns_identical_lock() {
        let locks = ResourceLocks::new();
        let first = locks.lock_for("post-1");
        let second = locks.lock_for("post-1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_distinct_keys_return_distinct_locks() {
        let locks = ResourceLocks::new();
        let a = locks.lock_for("post-1");
        let b = locks.lock_for("post-2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_entry_evicted_after_last_guard() {
        let locks = ResourceLocks::new();
        {
            let guard = locks.acquire("comment-9").await;
            assert_eq!(guard.key(), "comment-9");
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_handle_alive() {
        let locks = ResourceLocks::new();
        let handle = locks.lock_for("post-1");
        drop(locks.acquire("post-1").await);

        assert_eq!(locks.len(), 1);
        assert!(Arc::ptr_eq(&handle, &locks.lock_for("post-1")));
    }

    #[tokio::test]
    async fn test_same_key_serializes_holders() {
        let locks = Arc::new(ResourceLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire("post-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_entry() {
        let locks = ResourceLocks::new();
        let holder = locks.acquire("post-1").await;

        let mut waiter = Box::pin(locks.acquire("post-1"));
        assert!((&mut waiter).now_or_never().is_none());

        drop(holder);
        assert_eq!(locks.len(), 1);
        drop(waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_cancelled_while_lock_held() {
        let locks = ResourceLocks::new();
        let holder = locks.acquire("post-1").await;

        let mut waiter = Box::pin(locks.acquire("post-1"));
        assert!((&mut waiter).now_or_never().is_none());
        drop(waiter);
        assert_eq!(locks.len(), 1);

        drop(holder);
        assert!(locks.is_empty());
        drop(locks.acquire("post-1").await);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let locks = ResourceLocks::new();
        let _a = locks.acquire("post-1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("post-2")).await;
        assert!(b.is_ok());
    }
}
