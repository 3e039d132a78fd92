//! Sort whitelisting.
//!
//! Caller-supplied sort fields are validated against a fixed per-dataset
//! allow-list before they are ever interpolated into an ORDER BY. This is a
//! security boundary: the resolved field is always one of the allow-list's
//! own static strings, never the caller's input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
  Asc,
  Desc,
}

impl SortOrder {
  pub fn as_sql(self) -> &'static str {
    match self {
      SortOrder::Asc => "ASC",
      SortOrder::Desc => "DESC",
    }
  }

  /// Parse exactly "ASC" or "DESC"; anything else is rejected.
  pub fn parse(raw: &str) -> Option<Self> {
    match raw {
      "ASC" => Some(SortOrder::Asc),
      "DESC" => Some(SortOrder::Desc),
      _ => None,
    }
  }
}

/// A validated sort field and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
  pub field: &'static str,
  pub order: SortOrder,
}

impl SortSpec {
  pub const fn desc(field: &'static str) -> Self {
    Self {
      field,
      order: SortOrder::Desc,
    }
  }

  /// The `field ORDER` fragment for an ORDER BY.
  pub fn as_sql(&self) -> String {
    format!("{} {}", self.field, self.order.as_sql())
  }
}

/// Resolve a requested sort against an allow-list.
///
/// Unknown fields and malformed orders silently fall back to the dataset
/// default; a bad sort request is never an error.
pub fn resolve(
  field: Option<&str>,
  order: Option<&str>,
  allow: &[&'static str],
  default: SortSpec,
) -> SortSpec {
  let field = field
    .and_then(|requested| allow.iter().find(|&&f| f == requested))
    .copied()
    .unwrap_or(default.field);
  let order = order
    .and_then(SortOrder::parse)
    .unwrap_or(default.order);
  SortSpec { field, order }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ALLOW: &[&str] = &["data_mov", "consegna_num", "compenso"];
  const DEFAULT: SortSpec = SortSpec::desc("data_mov");

  #[test]
  fn listed_field_is_accepted() {
    let spec = resolve(Some("compenso"), Some("ASC"), ALLOW, DEFAULT);
    assert_eq!(spec.field, "compenso");
    assert_eq!(spec.order, SortOrder::Asc);
    assert_eq!(spec.as_sql(), "compenso ASC");
  }

  #[test]
  fn unlisted_field_falls_back_to_default() {
    let spec = resolve(Some("tariffa"), Some("ASC"), ALLOW, DEFAULT);
    assert_eq!(spec.field, "data_mov");
  }

  #[test]
  fn injection_attempt_falls_back_to_default() {
    let spec = resolve(
      Some("very'; DROP TABLE consegne;--"),
      Some("ASC"),
      ALLOW,
      DEFAULT,
    );
    assert_eq!(spec.field, "data_mov");
    assert_eq!(spec.order, SortOrder::Asc);
  }

  #[test]
  fn malformed_order_falls_back_to_default() {
    assert_eq!(
      resolve(Some("compenso"), Some("asc; --"), ALLOW, DEFAULT).order,
      SortOrder::Desc
    );
    assert_eq!(resolve(None, None, ALLOW, DEFAULT), DEFAULT);
  }
}
