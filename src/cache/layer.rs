//! Cache-aside combinator over the in-memory store.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::key::QueryKey;
use super::store::MemoryStore;

/// Wraps a fetch operation with look-up/compute/store semantics.
///
/// Two concurrent misses for the same key may both compute and both write;
/// last write wins, and both values are equivalent for the same key, so no
/// de-duplication is attempted.
#[derive(Clone)]
pub struct CacheLayer {
  store: Arc<MemoryStore>,
}

impl CacheLayer {
  pub fn new(store: Arc<MemoryStore>) -> Self {
    Self { store }
  }

  /// Return the cached value for `key`, or compute, store and return it.
  ///
  /// A cache hit never invokes `compute`. A failed compute propagates its
  /// error untouched and caches nothing, so the next caller retries.
  pub async fn with_cache<T, F, Fut>(
    &self,
    key: &impl QueryKey,
    ttl: Duration,
    compute: F,
  ) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let cache_key = key.cache_key();

    if let Some(value) = self.store.get::<T>(&cache_key) {
      debug!("cache hit: {}", key.description());
      return Ok(value);
    }

    debug!("cache miss: {}", key.description());
    let value = compute().await?;
    self.store.set(&cache_key, &value, ttl);
    Ok(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;
  use serde_json::{json, Value};
  use std::sync::atomic::{AtomicU32, Ordering};

  struct Key(&'static str);

  impl QueryKey for Key {
    fn prefix(&self) -> &'static str {
      self.0
    }

    fn payload(&self) -> Value {
      json!({})
    }
  }

  fn layer() -> CacheLayer {
    CacheLayer::new(Arc::new(MemoryStore::new()))
  }

  #[tokio::test]
  async fn second_call_within_ttl_skips_compute() {
    let layer = layer();
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      let value: u32 = layer
        .with_cache(&Key("t"), Duration::from_secs(60), || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(7)
        })
        .await
        .unwrap();
      assert_eq!(value, 7);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn compute_runs_again_after_expiry() {
    let layer = layer();
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      let _: u32 = layer
        .with_cache(&Key("t"), Duration::ZERO, || async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(7)
        })
        .await
        .unwrap();
      tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn errors_propagate_and_are_not_cached() {
    let layer = layer();
    let calls = AtomicU32::new(0);

    let result: Result<u32> = layer
      .with_cache(&Key("t"), Duration::from_secs(60), || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(eyre!("db unreachable"))
      })
      .await;
    assert!(result.is_err());

    // The failure was not cached; the next call retries the compute.
    let value: u32 = layer
      .with_cache(&Key("t"), Duration::from_secs(60), || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(9)
      })
      .await
      .unwrap();

    assert_eq!(value, 9);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
