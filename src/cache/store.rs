//! In-process key→value store with per-entry TTL.
//!
//! Entries are serialized to JSON on insert, so the store stays untyped while
//! callers read and write their own concrete types. Expiry is lazy: a `get`
//! on a dead entry removes it, and a periodic sweep bounds memory for keys
//! that are never re-requested.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct Entry {
  value: serde_json::Value,
  created_at: Instant,
  ttl: Duration,
}

impl Entry {
  fn is_expired(&self, now: Instant) -> bool {
    now.duration_since(self.created_at) > self.ttl
  }
}

/// TTL-bounded in-memory cache, shared process-wide behind an `Arc`.
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Store a value under `key`, overwriting any previous entry.
  ///
  /// Caching is best-effort: a serialization failure is logged and swallowed
  /// so the freshly computed value still reaches the caller.
  pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
    let value = match serde_json::to_value(value) {
      Ok(v) => v,
      Err(e) => {
        warn!("cache: failed to serialize value for {}: {}", key, e);
        return;
      }
    };

    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(
        key.to_string(),
        Entry {
          value,
          created_at: Instant::now(),
          ttl,
        },
      );
    }
  }

  /// Return the value for `key` if present and not expired.
  ///
  /// An expired entry is removed on the spot. An entry that no longer
  /// deserializes as `T` is removed and treated as a miss.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let mut entries = self.entries.lock().ok()?;

    let expired = match entries.get(key) {
      Some(entry) => entry.is_expired(Instant::now()),
      None => return None,
    };

    if expired {
      entries.remove(key);
      return None;
    }

    let entry = entries.get(key)?;
    match serde_json::from_value(entry.value.clone()) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!("cache: stale shape for {}: {}", key, e);
        entries.remove(key);
        None
      }
    }
  }

  /// Remove a single entry.
  pub fn remove(&self, key: &str) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .remove(key);
    Ok(())
  }

  /// Drop all entries.
  pub fn clear(&self) -> Result<()> {
    self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .clear();
    Ok(())
  }

  /// Remove every expired entry. Returns the number removed.
  pub fn sweep(&self) -> usize {
    let Ok(mut entries) = self.entries.lock() else {
      return 0;
    };
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
  }

  /// Number of entries currently held, expired or not.
  pub fn len(&self) -> usize {
    self.entries.lock().map(|e| e.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

/// Start a periodic sweep task for `store`.
///
/// The task holds only a `Weak` reference and exits once the store is
/// dropped, so the cache lifecycle stays owned by whoever built it.
pub fn spawn_sweeper(store: &Arc<MemoryStore>, every: Duration) -> tokio::task::JoinHandle<()> {
  let store: Weak<MemoryStore> = Arc::downgrade(store);
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately; skip it so the sweep cadence starts
    // one full interval after startup.
    interval.tick().await;
    loop {
      interval.tick().await;
      match store.upgrade() {
        Some(store) => {
          let removed = store.sweep();
          if removed > 0 {
            debug!("cache: sweep removed {} expired entries", removed);
          }
        }
        None => break,
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn get_returns_fresh_value() {
    let store = MemoryStore::new();
    store.set("k", &42u32, Duration::from_secs(60));
    assert_eq!(store.get::<u32>("k"), Some(42));
  }

  #[test]
  fn set_overwrites_existing_entry() {
    let store = MemoryStore::new();
    store.set("k", &1u32, Duration::from_secs(60));
    store.set("k", &2u32, Duration::from_secs(60));
    assert_eq!(store.get::<u32>("k"), Some(2));
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn expired_entry_misses_and_is_removed() {
    let store = MemoryStore::new();
    store.set("k", &42u32, Duration::ZERO);
    std::thread::sleep(Duration::from_millis(5));

    assert_eq!(store.get::<u32>("k"), None);
    // The miss removed the entry.
    assert_eq!(store.len(), 0);
  }

  #[test]
  fn sweep_removes_only_expired_entries() {
    let store = MemoryStore::new();
    store.set("dead", &1u32, Duration::ZERO);
    store.set("live", &2u32, Duration::from_secs(60));
    std::thread::sleep(Duration::from_millis(5));

    assert_eq!(store.sweep(), 1);
    assert_eq!(store.get::<u32>("live"), Some(2));
    assert_eq!(store.get::<u32>("dead"), None);
  }

  #[test]
  fn remove_and_clear() {
    let store = MemoryStore::new();
    store.set("a", &1u32, Duration::from_secs(60));
    store.set("b", &2u32, Duration::from_secs(60));

    store.remove("a").unwrap();
    assert_eq!(store.get::<u32>("a"), None);
    assert_eq!(store.get::<u32>("b"), Some(2));

    store.clear().unwrap();
    assert!(store.is_empty());
  }

  #[test]
  fn mismatched_shape_is_a_miss() {
    let store = MemoryStore::new();
    store.set("k", &"not a number", Duration::from_secs(60));
    assert_eq!(store.get::<u32>("k"), None);
    assert_eq!(store.len(), 0);
  }

  #[tokio::test]
  async fn sweeper_stops_when_store_is_dropped() {
    let store = Arc::new(MemoryStore::new());
    let handle = spawn_sweeper(&store, Duration::from_millis(10));
    drop(store);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_finished());
  }
}
