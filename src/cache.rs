use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry<T> {
  payload: T,
  captured_at: Instant,
}

struct CacheState<T> {
  entries: HashMap<String, CacheEntry<T>>,
  /// Bumped by every `invalidate`; a read only stores its result if the epoch it
  /// started under is still current.
  epochs: HashMap<String, u64>,
}

/// Short-lived memoization of per-gallery reads.
///
/// Clones share the same map. Entries expire after `ttl` or when `invalidate` is
/// called by a write path. The lock is only held for map access, never across the
/// underlying read, so a slow read does not block other galleries. A read that was
/// already in flight when its key was invalidated returns its result to the caller
/// but does not store it.
pub struct ReadThroughCache<T> {
  name: &'static str,
  ttl: Duration,
  state: Arc<StdMutex<CacheState<T>>>,
}

impl<T> Clone for ReadThroughCache<T> {
  fn clone(&self) -> Self {
    Self { name: self.name, ttl: self.ttl, state: Arc::clone(&self.state) }
  }
}

impl<T: Clone> ReadThroughCache<T> {
  pub fn new(name: &'static str, ttl: Duration) -> Self {
    let state = CacheState { entries: HashMap::new(), epochs: HashMap::new() };
    Self { name, ttl, state: Arc::new(StdMutex::new(state)) }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, CacheState<T>> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// The fresh payload for `key`, or the epoch a new read would start under.
  fn lookup(&self, key: &str) -> Result<T, u64> {
    let state = self.lock();
    match state.entries.get(key).filter(|e| e.captured_at.elapsed() < self.ttl) {
      Some(entry) => Ok(entry.payload.clone()),
      None => Err(state.epochs.get(key).copied().unwrap_or(0)),
    }
  }

  /// Return the cached payload for `key` if younger than the TTL, otherwise run `fetch`
  /// and remember its result. A failed fetch leaves the cache untouched.
  pub async fn get_or_fetch<E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let epoch = match self.lookup(key) {
      Ok(payload) => {
        debug!(cache = self.name, key, "cache hit");
        return Ok(payload);
      }
      Err(epoch) => epoch,
    };
    debug!(cache = self.name, key, "cache miss");
    let payload = fetch().await?;
    let mut state = self.lock();
    if state.epochs.get(key).copied().unwrap_or(0) == epoch {
      let entry = CacheEntry { payload: payload.clone(), captured_at: Instant::now() };
      state.entries.insert(key.to_string(), entry);
    } else {
      debug!(cache = self.name, key, "cache: read overtaken by invalidate, not stored");
    }
    Ok(payload)
  }

  pub fn invalidate(&self, key: &str) {
    let mut state = self.lock();
    *state.epochs.entry(key.to_string()).or_insert(0) += 1;
    if state.entries.remove(key).is_some() {
      debug!(cache = self.name, key, "cache invalidated");
    }
  }

  #[cfg(test)]
  pub fn contains(&self, key: &str) -> bool {
    self.lookup(key).is_ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  async fn read(cache: &ReadThroughCache<Vec<u32>>, calls: &AtomicUsize, key: &str) -> Result<Vec<u32>, String> {
    cache
      .get_or_fetch(key, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1, 2, 3])
      })
      .await
  }

  #[tokio::test(start_paused = true)]
  async fn second_read_within_ttl_is_served_from_cache() {
    let cache = ReadThroughCache::new("test", Duration::from_secs(300));
    let calls = AtomicUsize::new(0);
    assert_eq!(read(&cache, &calls, "g1").await.unwrap(), vec![1, 2, 3]);
    tokio::time::advance(Duration::from_secs(299)).await;
    read(&cache, &calls, "g1").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn expired_entry_is_refetched() {
    let cache = ReadThroughCache::new("test", Duration::from_secs(300));
    let calls = AtomicUsize::new(0);
    read(&cache, &calls, "g1").await.unwrap();
    tokio::time::advance(Duration::from_secs(300)).await;
    assert!(!cache.contains("g1"));
    read(&cache, &calls, "g1").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn invalidate_forces_second_read() {
    let cache = ReadThroughCache::new("test", Duration::from_secs(300));
    let calls = AtomicUsize::new(0);
    read(&cache, &calls, "g1").await.unwrap();
    cache.invalidate("g1");
    read(&cache, &calls, "g1").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn keys_are_independent() {
    let cache = ReadThroughCache::new("test", Duration::from_secs(300));
    let calls = AtomicUsize::new(0);
    read(&cache, &calls, "g1").await.unwrap();
    read(&cache, &calls, "g2").await.unwrap();
    cache.invalidate("g2");
    assert!(cache.contains("g1"));
    assert!(!cache.contains("g2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn failed_read_is_not_cached() {
    let cache: ReadThroughCache<Vec<u32>> = ReadThroughCache::new("test", Duration::from_secs(300));
    let err = cache.get_or_fetch("g1", || async { Err::<Vec<u32>, _>("backend down".to_string()) }).await;
    assert_eq!(err, Err("backend down".to_string()));
    assert!(!cache.contains("g1"));

    let calls = AtomicUsize::new(0);
    read(&cache, &calls, "g1").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn clones_share_entries() {
    let cache = ReadThroughCache::new("test", Duration::from_secs(300));
    let other = cache.clone();
    let calls = AtomicUsize::new(0);
    read(&cache, &calls, "g1").await.unwrap();
    assert!(other.contains("g1"));
    other.invalidate("g1");
    assert!(!cache.contains("g1"));
  }

  #[tokio::test]
  async fn read_in_flight_during_invalidate_is_not_stored() {
    let cache: ReadThroughCache<Vec<&'static str>> = ReadThroughCache::new("test", Duration::from_secs(300));
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let slow = tokio::spawn({
      let cache = cache.clone();
      async move {
        cache
          .get_or_fetch("g1", || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok::<_, String>(vec!["old"])
          })
          .await
      }
    });

    started_rx.await.unwrap();
    cache.invalidate("g1");
    release_tx.send(()).unwrap();
    assert_eq!(slow.await.unwrap(), Ok(vec!["old"]));
    assert!(!cache.contains("g1"));

    let after = cache.get_or_fetch("g1", || async { Ok::<_, String>(vec!["old", "new"]) }).await;
    assert_eq!(after, Ok(vec!["old", "new"]));
  }
}
