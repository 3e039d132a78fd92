//! Delivery dataset: row-level pages, grouped pages, stats, filter options.
//!
//! The grouped view is the costliest query shape in the system; when called
//! with no filters at all it is bounded to a trailing window of recent months
//! instead of scanning the whole table.

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

// Field-mapping table: filter field → column → match strategy.
const VIAGGIO: FieldRule = FieldRule::contains("viaggio");
const ORDINE: FieldRule = FieldRule::contains("ordine");
const COD_CLIENTE: FieldRule = FieldRule::contains("cod_cliente");
const CLIENTE: FieldRule = FieldRule::contains("ragione_sociale");
const DIVISIONE: FieldRule = FieldRule::exact("divisione");
const BU: FieldRule = FieldRule::exact("bu");
const DEPOSITO: FieldRule = FieldRule::exact("deposito");
const VETTORE: FieldRule = FieldRule::exact("vettore");
const TIPOLOGIA: FieldRule = FieldRule::exact("tipologia");

const ROW_SORT_FIELDS: &[&str] = &[
  "data_mov",
  "consegna_num",
  "viaggio",
  "ordine",
  "vettore",
  "colli",
  "compenso",
];
const GROUP_SORT_FIELDS: &[&str] = &["data_mov", "consegna_num", "vettore", "colli", "compenso"];
const DEFAULT_SORT: SortSpec = SortSpec::desc("data_mov");

/// Sparse delivery filters; `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsegneFilters {
  pub viaggio: Option<String>,
  pub ordine: Option<String>,
  pub cod_cliente: Option<String>,
  pub cliente: Option<String>,
  pub divisione: Option<String>,
  pub bu: Option<String>,
  pub deposito: Option<String>,
  pub vettore: Option<String>,
  pub tipologia: Option<String>,
  pub data_da: Option<NaiveDate>,
  pub data_a: Option<NaiveDate>,
  pub mese: Option<u32>,
  pub anno: Option<u32>,
}

impl ConsegneFilters {
  /// Build the WHERE predicate, in fixed field order.
  fn predicate(&self) -> Predicate {
    let mut p = Predicate::new();
    p.apply(VIAGGIO, self.viaggio.as_deref());
    p.apply(ORDINE, self.ordine.as_deref());
    p.apply(COD_CLIENTE, self.cod_cliente.as_deref());
    p.apply(CLIENTE, self.cliente.as_deref());
    p.apply(DIVISIONE, self.divisione.as_deref());
    p.apply(BU, self.bu.as_deref());
    p.apply(DEPOSITO, self.deposito.as_deref());
    p.apply(VETTORE, self.vettore.as_deref());
    p.apply(TIPOLOGIA, self.tipologia.as_deref());
    p.date_from("data_mov", self.data_da);
    p.date_to("data_mov", self.data_a);
    p.with_fallback("mese_fatt", "mese_mov", self.mese);
    p.with_fallback("anno_fatt", "anno_mov", self.anno);
    p
  }
}

/// One invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsegnaRow {
  pub divisione: Option<String>,
  pub bu: Option<String>,
  pub deposito: Option<String>,
  pub data_mov: Option<String>,
  pub viaggio: Option<String>,
  pub ordine: Option<String>,
  pub consegna_num: String,
  pub cod_cliente: Option<String>,
  pub ragione_sociale: Option<String>,
  pub cod_articolo: Option<String>,
  pub descr_articolo: Option<String>,
  pub vettore: Option<String>,
  pub descr_vettore: Option<String>,
  pub tipologia: Option<String>,
  pub colli: i64,
  pub compenso: f64,
}

/// One delivery, collapsed over its invoice lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsegnaGruppo {
  pub consegna_num: String,
  pub data_mov: Option<String>,
  pub viaggio: Option<String>,
  pub vettore: Option<String>,
  pub descr_vettore: Option<String>,
  pub tipologia: Option<String>,
  pub cod_cliente: Option<String>,
  pub ragione_sociale: Option<String>,
  pub bu: Option<String>,
  pub colli: i64,
  pub compenso: f64,
  pub ordini: i64,
  pub righe: i64,
}

/// Whole-filtered-set aggregates, independent of pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsegneStats {
  pub righe: u64,
  pub consegne: u64,
  pub clienti: u64,
  pub vettori: u64,
  pub colli: i64,
  pub compenso: f64,
  pub compenso_medio_consegna: f64,
  pub colli_medi_consegna: f64,
}

/// Distinct values backing the filter dropdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsegneOptions {
  pub divisioni: Vec<String>,
  pub bu: Vec<String>,
  pub depositi: Vec<String>,
  pub vettori: Vec<String>,
  pub tipologie: Vec<String>,
}

enum Key<'a> {
  Page {
    page: u32,
    filters: &'a ConsegneFilters,
    sort: SortSpec,
  },
  Grouped {
    page: u32,
    filters: &'a ConsegneFilters,
    sort: SortSpec,
  },
  Stats {
    filters: &'a ConsegneFilters,
  },
  Options,
}

impl QueryKey for Key<'_> {
  fn prefix(&self) -> &'static str {
    match self {
      Key::Page { .. } => "consegne:page",
      Key::Grouped { .. } => "consegne:grouped",
      Key::Stats { .. } => "consegne:stats",
      Key::Options => "consegne:options",
    }
  }

  fn payload(&self) -> serde_json::Value {
    match self {
      Key::Page { page, filters, sort } | Key::Grouped { page, filters, sort } => json!({
        "page": page,
        "filters": filters,
        "sort": { "field": sort.field, "order": sort.order.as_sql() },
      }),
      Key::Stats { filters } => json!({ "filters": filters }),
      Key::Options => json!({}),
    }
  }
}

/// Delivery data-access service.
pub struct ConsegneService {
  db: Arc<Database>,
  cache: CacheLayer,
  page_size: u32,
  fallback_months: u32,
}

impl ConsegneService {
  pub fn new(db: Arc<Database>, cache: CacheLayer) -> Self {
    Self {
      db,
      cache,
      page_size: query::DEFAULT_PAGE_SIZE,
      fallback_months: 3,
    }
  }

  /// Larger exploratory page sizes for callers that post-filter client-side.
  pub fn with_page_size(mut self, page_size: u32) -> Self {
    self.page_size = page_size.max(1);
    self
  }

  /// Width of the no-filter window on the grouped view.
  pub fn with_fallback_months(mut self, months: u32) -> Self {
    self.fallback_months = months;
    self
  }

  /// One page of invoice lines.
  pub async fn page(
    &self,
    page: u32,
    filters: &ConsegneFilters,
    sort_field: Option<&str>,
    sort_order: Option<&str>,
  ) -> Result<ResultPage<ConsegnaRow>> {
    let sort = query::resolve_sort(sort_field, sort_order, ROW_SORT_FIELDS, DEFAULT_SORT);
    let page = query::clamp_page(page);
    let key = Key::Page { page, filters, sort };

    self
      .cache
      .with_cache(&key, PAGE_TTL, || async move {
        self.fetch_page(page, filters, sort)
      })
      .await
  }

  /// One page of deliveries, grouped over their invoice lines.
  pub async fn grouped_page(
    &self,
    page: u32,
    filters: &ConsegneFilters,
    sort_field: Option<&str>,
    sort_order: Option<&str>,
  ) -> Result<ResultPage<ConsegnaGruppo>> {
    let sort = query::resolve_sort(sort_field, sort_order, GROUP_SORT_FIELDS, DEFAULT_SORT);
    let page = query::clamp_page(page);
    let key = Key::Grouped { page, filters, sort };

    self
      .cache
      .with_cache(&key, PAGE_TTL, || async move {
        self.fetch_grouped(page, filters, sort)
      })
      .await
  }

  /// Aggregates over the full filtered set.
  pub async fn stats(&self, filters: &ConsegneFilters) -> Result<ConsegneStats> {
    let key = Key::Stats { filters };
    self
      .cache
      .with_cache(&key, STATS_TTL, || async move { self.fetch_stats(filters) })
      .await
  }

  /// Distinct filter values; changes rarely, cached the longest.
  pub async fn filter_options(&self) -> Result<ConsegneOptions> {
    self
      .cache
      .with_cache(&Key::Options, OPTIONS_TTL, || async move {
        Ok(ConsegneOptions {
          divisioni: self.distinct("divisione")?,
          bu: self.distinct("bu")?,
          depositi: self.distinct("deposito")?,
          vettori: self.distinct("vettore")?,
          tipologie: self.distinct("tipologia")?,
        })
      })
      .await
  }

  fn fetch_page(
    &self,
    page: u32,
    filters: &ConsegneFilters,
    sort: SortSpec,
  ) -> Result<ResultPage<ConsegnaRow>> {
    let predicate = filters.predicate();
    let where_clause = predicate.where_clause();

    let data_sql = format!(
      "SELECT divisione, bu, deposito, data_mov, viaggio, ordine, consegna_num, \
       cod_cliente, ragione_sociale, cod_articolo, descr_articolo, vettore, \
       descr_vettore, tipologia, COALESCE(colli, 0), COALESCE(compenso, 0) \
       FROM consegne{} ORDER BY {} LIMIT ? OFFSET ?",
      where_clause,
      sort.as_sql()
    );

    let mut params = predicate.params().to_vec();
    params.push(Value::Integer(i64::from(self.page_size)));
    params.push(Value::Integer(query::offset(page, self.page_size) as i64));

    let rows = self.db.query_rows(&data_sql, &params, map_row)?;

    let count_sql = format!("SELECT COUNT(*) FROM consegne{}", where_clause);
    let total = self.db.query_count(&count_sql, predicate.params())?;

    Ok(ResultPage::new(rows, total, self.page_size))
  }

  fn fetch_grouped(
    &self,
    page: u32,
    filters: &ConsegneFilters,
    sort: SortSpec,
  ) -> Result<ResultPage<ConsegnaGruppo>> {
    let mut predicate = filters.predicate();
    if predicate.is_empty() {
      // Unfiltered aggregation over the whole table is the costliest query
      // in the system; bound it to recent months.
      predicate.trailing_months("data_mov", self.fallback_months);
    }
    let where_clause = predicate.where_clause();

    const GROUP_KEYS: &str = "consegna_num, data_mov, viaggio, vettore, descr_vettore, \
       tipologia, cod_cliente, ragione_sociale, bu";

    let data_sql = format!(
      "SELECT consegna_num, data_mov, viaggio, vettore, descr_vettore, tipologia, \
       cod_cliente, ragione_sociale, bu, \
       COALESCE(SUM(colli), 0) AS colli, COALESCE(SUM(compenso), 0) AS compenso, \
       COUNT(DISTINCT ordine) AS ordini, COUNT(*) AS righe \
       FROM consegne{} GROUP BY {} ORDER BY {} LIMIT ? OFFSET ?",
      where_clause,
      GROUP_KEYS,
      sort.as_sql()
    );

    let mut params = predicate.params().to_vec();
    params.push(Value::Integer(i64::from(self.page_size)));
    params.push(Value::Integer(query::offset(page, self.page_size) as i64));

    let rows = self.db.query_rows(&data_sql, &params, map_group)?;

    // Count distinct groups, not raw rows.
    let count_sql = format!(
      "SELECT COUNT(*) FROM (SELECT 1 FROM consegne{} GROUP BY {}) t",
      where_clause, GROUP_KEYS
    );
    let total = self.db.query_count(&count_sql, predicate.params())?;

    Ok(ResultPage::new(rows, total, self.page_size))
  }

  fn fetch_stats(&self, filters: &ConsegneFilters) -> Result<ConsegneStats> {
    let predicate = filters.predicate();
    let sql = format!(
      "SELECT COUNT(*), COUNT(DISTINCT consegna_num), COUNT(DISTINCT cod_cliente), \
       COUNT(DISTINCT vettore), COALESCE(SUM(colli), 0), COALESCE(SUM(compenso), 0) \
       FROM consegne{}",
      predicate.where_clause()
    );

    let mut rows = self.db.query_rows(&sql, predicate.params(), |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, i64>(1)?,
        row.get::<_, i64>(2)?,
        row.get::<_, i64>(3)?,
        row.get::<_, i64>(4)?,
        row.get::<_, f64>(5)?,
      ))
    })?;

    let (righe, consegne, clienti, vettori, colli, compenso) = rows
      .pop()
      .ok_or_else(|| eyre!("Stats query returned no rows"))?;

    let per_consegna = |total: f64| {
      if consegne > 0 {
        total / consegne as f64
      } else {
        0.0
      }
    };

    Ok(ConsegneStats {
      righe: righe.max(0) as u64,
      consegne: consegne.max(0) as u64,
      clienti: clienti.max(0) as u64,
      vettori: vettori.max(0) as u64,
      colli,
      compenso,
      compenso_medio_consegna: per_consegna(compenso),
      colli_medi_consegna: per_consegna(colli as f64),
    })
  }

  fn distinct(&self, column: &str) -> Result<Vec<String>> {
    let sql = format!(
      "SELECT DISTINCT {c} FROM consegne WHERE {c} IS NOT NULL AND {c} <> '' ORDER BY {c}",
      c = column
    );
    self.db.query_strings(&sql, &[])
  }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ConsegnaRow> {
  Ok(ConsegnaRow {
    divisione: row.get(0)?,
    bu: row.get(1)?,
    deposito: row.get(2)?,
    data_mov: row.get(3)?,
    viaggio: row.get(4)?,
    ordine: row.get(5)?,
    consegna_num: row.get(6)?,
    cod_cliente: row.get(7)?,
    ragione_sociale: row.get(8)?,
    cod_articolo: row.get(9)?,
    descr_articolo: row.get(10)?,
    vettore: row.get(11)?,
    descr_vettore: row.get(12)?,
    tipologia: row.get(13)?,
    colli: row.get(14)?,
    compenso: row.get(15)?,
  })
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<ConsegnaGruppo> {
  Ok(ConsegnaGruppo {
    consegna_num: row.get(0)?,
    data_mov: row.get(1)?,
    viaggio: row.get(2)?,
    vettore: row.get(3)?,
    descr_vettore: row.get(4)?,
    tipologia: row.get(5)?,
    cod_cliente: row.get(6)?,
    ragione_sociale: row.get(7)?,
    bu: row.get(8)?,
    colli: row.get(9)?,
    compenso: row.get(10)?,
    ordini: row.get(11)?,
    righe: row.get(12)?,
  })
}
