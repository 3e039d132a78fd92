//! Sentinel decoding and parameterized predicate building.
//!
//! Filters arrive as sparse optional values. The UI convention of sentinel
//! strings ("", "Tutti", "Tutte") meaning "no constraint" is decoded once at
//! the boundary by [`opt_text`]; from there on absence is an `Option::None`,
//! not a magic string.
//!
//! [`Predicate`] collects AND-combined clause fragments plus their bound
//! parameters. Values only ever travel as parameters; the generated SQL text
//! contains column names from static per-dataset tables and placeholders,
//! nothing user-supplied.

use chrono::{Months, NaiveDate, Utc};
use rusqlite::types::Value;

/// Sentinel strings conventionally meaning "no constraint".
const SENTINELS: [&str; 2] = ["Tutti", "Tutte"];

/// Decode a raw filter value, mapping empty strings and sentinels to `None`.
pub fn opt_text(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || SENTINELS.iter().any(|s| trimmed.eq_ignore_ascii_case(s)) {
    None
  } else {
    Some(trimmed.to_string())
  }
}

/// How a filter field matches its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
  /// Substring match: `column LIKE '%' || ? || '%'` (wildcard-wrapped param).
  Contains,
  /// Equality match for enums and codes.
  Exact,
}

/// One entry of a dataset's field-mapping table.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
  pub column: &'static str,
  pub matcher: Match,
}

impl FieldRule {
  pub const fn contains(column: &'static str) -> Self {
    Self {
      column,
      matcher: Match::Contains,
    }
  }

  pub const fn exact(column: &'static str) -> Self {
    Self {
      column,
      matcher: Match::Exact,
    }
  }
}

/// AND-combined WHERE clause under construction.
#[derive(Debug, Default)]
pub struct Predicate {
  clauses: Vec<String>,
  params: Vec<Value>,
}

impl Predicate {
  pub fn new() -> Self {
    Self::default()
  }

  /// Apply a field rule if the value is present.
  pub fn apply(&mut self, rule: FieldRule, value: Option<&str>) {
    let Some(value) = value else { return };
    match rule.matcher {
      Match::Contains => {
        self.clauses.push(format!("{} LIKE ?", rule.column));
        self.params.push(Value::Text(format!("%{}%", value)));
      }
      Match::Exact => {
        self.clauses.push(format!("{} = ?", rule.column));
        self.params.push(Value::Text(value.to_string()));
      }
    }
  }

  /// Equality on an integer column (plain month/year columns).
  pub fn equal_int(&mut self, column: &'static str, value: Option<i64>) {
    if let Some(value) = value {
      self.clauses.push(format!("{} = ?", column));
      self.params.push(Value::Integer(value));
    }
  }

  /// Inclusive lower bound on a date column.
  pub fn date_from(&mut self, column: &'static str, date: Option<NaiveDate>) {
    if let Some(date) = date {
      self.clauses.push(format!("{} >= ?", column));
      self.params.push(Value::Text(date.to_string()));
    }
  }

  /// Inclusive upper bound on a date column.
  pub fn date_to(&mut self, column: &'static str, date: Option<NaiveDate>) {
    if let Some(date) = date {
      self.clauses.push(format!("{} <= ?", column));
      self.params.push(Value::Text(date.to_string()));
    }
  }

  /// Match a month/year value against an override column, falling back to a
  /// computed column for rows where the override was never set. A row with
  /// an override that differs from the filter does not match, even if its
  /// fallback would.
  pub fn with_fallback(
    &mut self,
    primary: &'static str,
    fallback: &'static str,
    value: Option<u32>,
  ) {
    if let Some(value) = value {
      self.clauses.push(format!(
        "({p} = ? OR ({p} IS NULL AND {f} = ?))",
        p = primary,
        f = fallback
      ));
      self.params.push(Value::Integer(value as i64));
      self.params.push(Value::Integer(value as i64));
    }
  }

  /// Bound the scan to the trailing `months` months from today.
  ///
  /// Used as the no-filter fallback for the costliest (grouped, unfiltered)
  /// query shape. Not a user filter: callers never see it reported back.
  pub fn trailing_months(&mut self, column: &'static str, months: u32) {
    let today = Utc::now().date_naive();
    let cutoff = today.checked_sub_months(Months::new(months)).unwrap_or(today);
    self.clauses.push(format!("{} >= ?", column));
    self.params.push(Value::Text(cutoff.to_string()));
  }

  /// True if no clauses were contributed.
  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty()
  }

  /// The ` WHERE ...` fragment, or an empty string when unconstrained.
  pub fn where_clause(&self) -> String {
    if self.clauses.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", self.clauses.join(" AND "))
    }
  }

  /// Bound parameters, in clause order.
  pub fn params(&self) -> &[Value] {
    &self.params
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn opt_text_decodes_sentinels() {
    assert_eq!(opt_text(""), None);
    assert_eq!(opt_text("  "), None);
    assert_eq!(opt_text("Tutti"), None);
    assert_eq!(opt_text("Tutte"), None);
    assert_eq!(opt_text("tutti"), None);
    assert_eq!(opt_text("ROSSI"), Some("ROSSI".to_string()));
    assert_eq!(opt_text(" ROSSI "), Some("ROSSI".to_string()));
  }

  #[test]
  fn sentinel_and_absent_build_identical_predicates() {
    let mut from_sentinel = Predicate::new();
    from_sentinel.apply(FieldRule::exact("vettore"), opt_text("Tutti").as_deref());

    let mut from_absent = Predicate::new();
    from_absent.apply(FieldRule::exact("vettore"), None);

    assert_eq!(from_sentinel.where_clause(), from_absent.where_clause());
    assert!(from_sentinel.is_empty());
  }

  #[test]
  fn empty_predicate_matches_all() {
    let p = Predicate::new();
    assert_eq!(p.where_clause(), "");
    assert!(p.params().is_empty());
  }

  #[test]
  fn contains_wraps_param_in_wildcards() {
    let mut p = Predicate::new();
    p.apply(FieldRule::contains("viaggio"), Some("V123"));

    assert_eq!(p.where_clause(), " WHERE viaggio LIKE ?");
    assert_eq!(p.params(), &[Value::Text("%V123%".to_string())]);
  }

  #[test]
  fn clauses_are_and_combined_in_order() {
    let mut p = Predicate::new();
    p.apply(FieldRule::exact("bu"), Some("SUD"));
    p.apply(FieldRule::contains("ragione_sociale"), Some("BAR"));
    p.date_from("data_mov", Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    p.date_to("data_mov", Some(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()));

    assert_eq!(
      p.where_clause(),
      " WHERE bu = ? AND ragione_sociale LIKE ? AND data_mov >= ? AND data_mov <= ?"
    );
    assert_eq!(p.params().len(), 4);
  }

  #[test]
  fn month_fallback_prefers_override_column() {
    let mut p = Predicate::new();
    p.with_fallback("mese_fatt", "mese_mov", Some(6));

    assert_eq!(
      p.where_clause(),
      " WHERE (mese_fatt = ? OR (mese_fatt IS NULL AND mese_mov = ?))"
    );
    assert_eq!(p.params(), &[Value::Integer(6), Value::Integer(6)]);
  }

  #[test]
  fn trailing_months_binds_cutoff_date() {
    let mut p = Predicate::new();
    p.trailing_months("data_mov", 3);

    assert_eq!(p.where_clause(), " WHERE data_mov >= ?");

    let expected = Utc::now()
      .date_naive()
      .checked_sub_months(Months::new(3))
      .unwrap();
    match &p.params()[0] {
      Value::Text(bound) => {
        let bound: NaiveDate = bound.parse().unwrap();
        // Tolerate the test straddling midnight.
        assert!((bound - expected).num_days().abs() <= 1);
      }
      other => panic!("expected text param, got {:?}", other),
    }
  }
}
