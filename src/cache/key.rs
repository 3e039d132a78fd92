//! Cache key derivation.
//!
//! A key is a pure function of a dataset prefix and a JSON payload describing
//! the query (page, filters, sort). `serde_json::Value` objects keep their
//! keys sorted, so two logically identical queries hash to the same key no
//! matter which order their fields were supplied in.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Types that identify a cacheable query.
pub trait QueryKey {
  /// Dataset prefix, e.g. "consegne:page". Kept out of the hash input's
  /// JSON so related keys stay greppable in logs.
  fn prefix(&self) -> &'static str;

  /// Everything that distinguishes this query from its siblings.
  fn payload(&self) -> Value;

  /// Stable cache key: `prefix:sha256(payload)`.
  fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.prefix().as_bytes());
    hasher.update(b":");
    hasher.update(self.payload().to_string().as_bytes());
    format!("{}:{}", self.prefix(), hex::encode(hasher.finalize()))
  }

  /// Human-readable description for log lines.
  fn description(&self) -> String {
    self.prefix().to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  struct Probe {
    prefix: &'static str,
    payload: Value,
  }

  impl QueryKey for Probe {
    fn prefix(&self) -> &'static str {
      self.prefix
    }

    fn payload(&self) -> Value {
      self.payload.clone()
    }
  }

  #[test]
  fn key_is_independent_of_field_order() {
    let a = Probe {
      prefix: "consegne:page",
      payload: json!({"page": 2, "vettore": "ROSSI", "bu": "SUD"}),
    };
    let b = Probe {
      prefix: "consegne:page",
      payload: json!({"bu": "SUD", "vettore": "ROSSI", "page": 2}),
    };
    assert_eq!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn key_changes_with_page() {
    let a = Probe {
      prefix: "consegne:page",
      payload: json!({"page": 1}),
    };
    let b = Probe {
      prefix: "consegne:page",
      payload: json!({"page": 2}),
    };
    assert_ne!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn key_changes_with_prefix() {
    let a = Probe {
      prefix: "consegne:page",
      payload: json!({}),
    };
    let b = Probe {
      prefix: "consegne:stats",
      payload: json!({}),
    };
    assert_ne!(a.cache_key(), b.cache_key());
  }
}
