//! Short-lived collection cache with explicit invalidation.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Entry<T> {
    values: Vec<T>,
    fetched_at: Instant,
}

struct CacheState<T> {
    generation: u64,
    entry: Option<Entry<T>>,
}

/// Holds the last fetched collection for `ttl`.
///
/// Every [`invalidate`](Self::invalidate) bumps the generation; a fetch that
/// started under an older generation returns its result but never stores it.
pub struct CollectionCache<T> {
    ttl: Duration,
    state: Mutex<CacheState<T>>,
}

impl<T: Clone> CollectionCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                generation: 0,
                entry: None,
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.entry = None;
    }

    /// The cached collection, if still fresh.
    pub fn get(&self) -> Option<Vec<T>> {
        let state = self.state.lock();
        state
            .entry
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.values.clone())
    }

    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<Vec<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        if let Some(values) = self.get() {
            return Ok(values);
        }

        let generation = self.generation();
        let values = fetch().await?;

        let mut state = self.state.lock();
        if state.generation == generation {
            state.entry = Some(Entry {
                values: values.clone(),
                fetched_at: Instant::now(),
            });
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_get_or_fetch_caches_until_invalidated() {
        let cache = CollectionCache::new(Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);
        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ()>(vec![1, 2, 3])
        };

        assert_eq!(cache.get_or_fetch(fetch).await, Ok(vec![1, 2, 3]));
        assert_eq!(cache.get_or_fetch(fetch).await, Ok(vec![1, 2, 3]));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        cache.invalidate();
        assert!(cache.get().is_none());
        cache.get_or_fetch(fetch).await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_fetches() {
        let cache = CollectionCache::new(Duration::ZERO);
        cache.get_or_fetch(|| async { Ok::<_, ()>(vec![1]) }).await.unwrap();
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn test_fetch_racing_invalidation_is_not_stored() {
        let cache = CollectionCache::new(Duration::from_secs(60));

        let values = cache
            .get_or_fetch(|| async {
                cache.invalidate();
                Ok::<_, ()>(vec!["stale"])
            })
            .await;

        assert_eq!(values, Ok(vec!["stale"]));
        assert!(cache.get().is_none());
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: CollectionCache<u8> = CollectionCache::new(Duration::from_secs(60));
        assert_eq!(cache.get_or_fetch(|| async { Err("down") }).await, Err("down"));
        assert!(cache.get().is_none());
    }
}
