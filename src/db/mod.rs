pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

/// Parameterized-query executor over the relational store.
///
/// The services never concatenate values into SQL text; everything reaches
/// the database as bound parameters through this wrapper.
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open or create the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;

    Ok(db)
  }

  /// In-memory database, used by the integration tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("traspo").join("traspo.db"))
  }

  /// Run database migrations.
  fn run_migrations(&self) -> Result<()> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;
    Ok(())
  }

  /// Run a data query, mapping each row through `map`.
  pub fn query_rows<T>(
    &self,
    sql: &str,
    params: &[Value],
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
  ) -> Result<Vec<T>> {
    trace!("query: {}", sql);
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(sql)
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(rusqlite::params_from_iter(params.iter()), map)
      .map_err(|e| eyre!("Failed to execute query: {}", e))?
      .collect::<rusqlite::Result<Vec<T>>>()
      .map_err(|e| eyre!("Failed to read row: {}", e))?;

    Ok(rows)
  }

  /// Run a single-row COUNT-style query.
  pub fn query_count(&self, sql: &str, params: &[Value]) -> Result<u64> {
    trace!("count: {}", sql);
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(sql, rusqlite::params_from_iter(params.iter()), |row| {
        row.get(0)
      })
      .map_err(|e| eyre!("Failed to execute count query: {}", e))?;

    Ok(count.max(0) as u64)
  }

  /// Run a single-column text query (DISTINCT filter-option lists).
  pub fn query_strings(&self, sql: &str, params: &[Value]) -> Result<Vec<String>> {
    self.query_rows(sql, params, |row| row.get::<_, String>(0))
  }

  /// Execute a statement (inserts in tests, maintenance).
  pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(sql, rusqlite::params_from_iter(params.iter()))
      .map_err(|e| eyre!("Failed to execute statement: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parameterized_round_trip() {
    let db = Database::open_in_memory().unwrap();
    db.execute(
      "INSERT INTO consegne (consegna_num, data_mov, colli, compenso) VALUES (?, ?, ?, ?)",
      &[
        Value::Text("C001".into()),
        Value::Text("2026-06-01".into()),
        Value::Integer(10),
        Value::Real(25.5),
      ],
    )
    .unwrap();

    let count = db
      .query_count(
        "SELECT COUNT(*) FROM consegne WHERE consegna_num = ?",
        &[Value::Text("C001".into())],
      )
      .unwrap();
    assert_eq!(count, 1);
  }

  #[test]
  fn malformed_sql_is_an_error() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.query_count("SELECT COUNT(*) FROM nessuna_tabella", &[]).is_err());
  }
}
