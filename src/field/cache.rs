//! Bounded, chronologically ordered day-cache with single-flight loading
//! (`SPEC_FULL.md` §5, §10.5).
//!
//! Two concurrent requests for the same unresident day share one in-flight
//! load instead of re-issuing I/O. The active day is pinned and never
//! evicted; when the cache exceeds its capacity the oldest non-active day is
//! dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// A chronological key: `(year, month, day)`.
pub type DayKey = (i32, u32, u32);

enum Slot<T> {
    Loading(Arc<Notify>),
    Ready(Arc<T>),
}

/// An LRU day-cache of resident day payloads, keyed by calendar date.
pub struct DayCache<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
}

struct Inner<T> {
    slots: HashMap<DayKey, Slot<T>>,
    order: Vec<DayKey>,
    active: Option<DayKey>,
}

impl<T> DayCache<T> {
    pub fn new(capacity: usize) -> Self {
        DayCache {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: Vec::new(),
                active: None,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Loads `key`, sharing a single in-flight load across concurrent
    /// callers. Marks `key` as the active day on success and evicts the
    /// oldest non-active day if the cache is over capacity.
    pub async fn load_day<F, Fut, E>(&self, key: DayKey, loader: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            let wait_on = {
                let mut inner = self.inner.lock().await;
                match inner.slots.get(&key) {
                    Some(Slot::Ready(value)) => {
                        let value = Arc::clone(value);
                        inner.active = Some(key);
                        inner.touch(key);
                        return Ok(value);
                    }
                    Some(Slot::Loading(notify)) => Some(Arc::clone(notify)),
                    None => {
                        inner
                            .slots
                            .insert(key, Slot::Loading(Arc::new(Notify::new())));
                        None
                    }
                }
            };

            if let Some(notify) = wait_on {
                notify.notified().await;
                continue;
            }

            // We are the loader for this key.
            let result = loader().await;
            let mut inner = self.inner.lock().await;
            match result {
                Ok(value) => {
                    let value = Arc::new(value);
                    let notify = match inner.slots.insert(key, Slot::Ready(Arc::clone(&value))) {
                        Some(Slot::Loading(notify)) => notify,
                        _ => Arc::new(Notify::new()),
                    };
                    inner.active = Some(key);
                    inner.touch(key);
                    inner.evict_over_capacity(self.capacity);
                    notify.notify_waiters();
                    return Ok(value);
                }
                Err(err) => {
                    if let Some(Slot::Loading(notify)) = inner.slots.remove(&key) {
                        notify.notify_waiters();
                    }
                    return Err(err);
                }
            }
        }
    }

    pub async fn active_key(&self) -> Option<DayKey> {
        self.inner.lock().await.active
    }

    pub async fn resident_count(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_resident(&self, key: DayKey) -> bool {
        matches!(
            self.inner.lock().await.slots.get(&key),
            Some(Slot::Ready(_))
        )
    }
}

impl<T> Inner<T> {
    fn touch(&mut self, key: DayKey) {
        self.order.retain(|k| *k != key);
        self.order.push(key);
    }

    fn evict_over_capacity(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            let evict_index = self
                .order
                .iter()
                .position(|k| Some(*k) != self.active)
                .unwrap_or(0);
            let key = self.order.remove(evict_index);
            self.slots.remove(&key);
            debug!(year = key.0, month = key.1, day = key.2, "evicted day from cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loads_and_caches() {
        let cache: DayCache<i32> = DayCache::new(2);
        let calls = AtomicUsize::new(0);
        let v1 = cache
            .load_day((2011, 1, 1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(42)
            })
            .await
            .unwrap();
        assert_eq!(*v1, 42);
        let v2 = cache
            .load_day((2011, 1, 1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(43)
            })
            .await
            .unwrap();
        assert_eq!(*v2, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn evicts_oldest_non_active_over_capacity() {
        let cache: DayCache<i32> = DayCache::new(2);
        for day in 1..=3 {
            cache
                .load_day((2011, 1, day), || async move { Ok::<_, ()>(day as i32) })
                .await
                .unwrap();
        }
        assert_eq!(cache.resident_count().await, 2);
        assert!(!cache.is_resident((2011, 1, 1)).await);
        assert!(cache.is_resident((2011, 1, 3)).await);
        assert_eq!(cache.active_key().await, Some((2011, 1, 3)));
    }

    #[tokio::test]
    async fn failed_load_does_not_cache() {
        let cache: DayCache<i32> = DayCache::new(2);
        let result = cache
            .load_day((2011, 1, 1), || async { Err::<i32, _>("boom") })
            .await;
        assert!(result.is_err());
        assert!(!cache.is_resident((2011, 1, 1)).await);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let cache: Arc<DayCache<i32>> = Arc::new(DayCache::new(2));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .load_day((2011, 1, 1), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok::<_, ()>(7)
                    })
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            assert_eq!(*h.await.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
