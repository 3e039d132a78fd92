//! Trip dataset: row-level pages, stats, filter options.

use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::cache::{CacheLayer, QueryKey};
use crate::db::Database;
use crate::query::{self, FieldRule, Predicate, ResultPage, SortSpec};

use super::{OPTIONS_TTL, PAGE_TTL, STATS_TTL};

const VIAGGIO: FieldRule = FieldRule::contains("viaggio");
const NOMINATIVO: FieldRule = FieldRule::contains("nominativo");
const TARGA: FieldRule = FieldRule::contains("targa");
const DEPOSITO: FieldRule = FieldRule::exact("deposito");

const SORT_FIELDS: &[&str] = &[
  "data_inizio",
  "viaggio",
  "nominativo",
  "targa",
  "tot_km",
  "colli",
  "peso_kg",
];
const DEFAULT_SORT: SortSpec = SortSpec::desc("data_inizio");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViaggiFilters {
  pub viaggio: Option<String>,
  pub nominativo: Option<String>,
  pub targa: Option<String>,
  pub deposito: Option<String>,
  pub data_da: Option<NaiveDate>,
  pub data_a: Option<NaiveDate>,
  pub mese: Option<u32>,
  pub anno: Option<u32>,
}

impl ViaggiFilters {
  fn predicate(&self) -> Predicate {
    let mut p = Predicate::new();
    p.apply(VIAGGIO, self.viaggio.as_deref());
    p.apply(NOMINATIVO, self.nominativo.as_deref());
    p.apply(TARGA, self.targa.as_deref());
    p.apply(DEPOSITO, self.deposito.as_deref());
    p.date_from("data_inizio", self.data_da);
    p.date_to("data_inizio", self.data_a);
    // Trips have no billing override; month/year are single computed columns.
    p.equal_int("mese", self.mese.map(i64::from));
    p.equal_int("anno", self.anno.map(i64::from));
    p
  }
}

/// One departed trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaggioRow {
  pub viaggio: String,
  pub data_inizio: Option<String>,
  pub deposito: Option<String>,
  pub nominativo: Option<String>,
  pub targa: Option<String>,
  pub tot_km: f64,
  pub colli: i64,
  pub peso_kg: f64,
  pub ordini: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaggiStats {
  pub viaggi: u64,
  pub mezzi: u64,
  pub km: f64,
  pub colli: i64,
  pub peso_kg: f64,
  pub km_medi_viaggio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaggiOptions {
  pub depositi: Vec<String>,
  pub targhe: Vec<String>,
}

enum Key<'a> {
  Page {
    page: u32,
    filters: &'a ViaggiFilters,
    sort: SortSpec,
  },
  Stats {
    filters: &'a ViaggiFilters,
  },
  Options,
}

impl QueryKey for Key<'_> {
  fn prefix(&self) -> &'static str {
    match self {
      Key::Page { .. } => "viaggi:page",
      Key::Stats { .. } => "viaggi:stats",
      Key::Options => "viaggi:options",
    }
  }

  fn payload(&self) -> serde_json::Value {
    match self {
      Key::Page { page, filters, sort } => json!({
        "page": page,
        "filters": filters,
        "sort": { "field": sort.field, "order": sort.order.as_sql() },
      }),
      Key::Stats { filters } => json!({ "filters": filters }),
      Key::Options => json!({}),
    }
  }
}

/// Trip data-access service.
pub struct ViaggiService {
  db: Arc<Database>,
  cache: CacheLayer,
  page_size: u32,
}

impl ViaggiService {
  pub fn new(db: Arc<Database>, cache: CacheLayer) -> Self {
    Self {
      db,
      cache,
      page_size: query::DEFAULT_PAGE_SIZE,
    }
  }

  pub fn with_page_size(mut self, page_size: u32) -> Self {
    self.page_size = page_size.max(1);
    self
  }

  /// One page of trips.
  pub async fn page(
    &self,
    page: u32,
    filters: &ViaggiFilters,
    sort_field: Option<&str>,
    sort_order: Option<&str>,
  ) -> Result<ResultPage<ViaggioRow>> {
    let sort = query::resolve_sort(sort_field, sort_order, SORT_FIELDS, DEFAULT_SORT);
    let page = query::clamp_page(page);
    let key = Key::Page { page, filters, sort };

    self
      .cache
      .with_cache(&key, PAGE_TTL, || async move {
        self.fetch_page(page, filters, sort)
      })
      .await
  }

  pub async fn stats(&self, filters: &ViaggiFilters) -> Result<ViaggiStats> {
    let key = Key::Stats { filters };
    self
      .cache
      .with_cache(&key, STATS_TTL, || async move { self.fetch_stats(filters) })
      .await
  }

  pub async fn filter_options(&self) -> Result<ViaggiOptions> {
    self
      .cache
      .with_cache(&Key::Options, OPTIONS_TTL, || async move {
        Ok(ViaggiOptions {
          depositi: self.distinct("deposito")?,
          targhe: self.distinct("targa")?,
        })
      })
      .await
  }

  fn fetch_page(
    &self,
    page: u32,
    filters: &ViaggiFilters,
    sort: SortSpec,
  ) -> Result<ResultPage<ViaggioRow>> {
    let predicate = filters.predicate();
    let where_clause = predicate.where_clause();

    let data_sql = format!(
      "SELECT viaggio, data_inizio, deposito, nominativo, targa, \
       COALESCE(tot_km, 0), COALESCE(colli, 0), COALESCE(peso_kg, 0), COALESCE(ordini, 0) \
       FROM viaggi{} ORDER BY {} LIMIT ? OFFSET ?",
      where_clause,
      sort.as_sql()
    );

    let mut params = predicate.params().to_vec();
    params.push(Value::Integer(i64::from(self.page_size)));
    params.push(Value::Integer(query::offset(page, self.page_size) as i64));

    let rows = self.db.query_rows(&data_sql, &params, map_row)?;

    let count_sql = format!("SELECT COUNT(*) FROM viaggi{}", where_clause);
    let total = self.db.query_count(&count_sql, predicate.params())?;

    Ok(ResultPage::new(rows, total, self.page_size))
  }

  fn fetch_stats(&self, filters: &ViaggiFilters) -> Result<ViaggiStats> {
    let predicate = filters.predicate();
    let sql = format!(
      "SELECT COUNT(*), COUNT(DISTINCT targa), COALESCE(SUM(tot_km), 0), \
       COALESCE(SUM(colli), 0), COALESCE(SUM(peso_kg), 0) FROM viaggi{}",
      predicate.where_clause()
    );

    let mut rows = self.db.query_rows(&sql, predicate.params(), |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, i64>(1)?,
        row.get::<_, f64>(2)?,
        row.get::<_, i64>(3)?,
        row.get::<_, f64>(4)?,
      ))
    })?;

    let (viaggi, mezzi, km, colli, peso_kg) = rows
      .pop()
      .ok_or_else(|| eyre!("Stats query returned no rows"))?;

    Ok(ViaggiStats {
      viaggi: viaggi.max(0) as u64,
      mezzi: mezzi.max(0) as u64,
      km,
      colli,
      peso_kg,
      km_medi_viaggio: if viaggi > 0 { km / viaggi as f64 } else { 0.0 },
    })
  }

  fn distinct(&self, column: &str) -> Result<Vec<String>> {
    let sql = format!(
      "SELECT DISTINCT {c} FROM viaggi WHERE {c} IS NOT NULL AND {c} <> '' ORDER BY {c}",
      c = column
    );
    self.db.query_strings(&sql, &[])
  }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ViaggioRow> {
  Ok(ViaggioRow {
    viaggio: row.get(0)?,
    data_inizio: row.get(1)?,
    deposito: row.get(2)?,
    nominativo: row.get(3)?,
    targa: row.get(4)?,
    tot_km: row.get(5)?,
    colli: row.get(6)?,
    peso_kg: row.get(7)?,
    ordini: row.get(8)?,
  })
}
