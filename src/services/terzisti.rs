//! Third-party-carrier dataset: grouped pages, stats, filter options.
//!
//! Carrier settlement works per delivery, so the primary view is the grouped
//! one; the raw invoice lines are only ever read through the aggregates.

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
const COD_CLIENTE: FieldRule = FieldRule::contains("cod_cliente");
const CLIENTE: FieldRule = FieldRule::contains("ragione_sociale");
const DIVISIONE: FieldRule = FieldRule::exact("divisione");
const BU: FieldRule = FieldRule::exact("bu");
const DEPOSITO: FieldRule = FieldRule::exact("deposito");
const VETTORE: FieldRule = FieldRule::exact("vettore");
const TIPOLOGIA: FieldRule = FieldRule::exact("tipologia");

const SORT_FIELDS: &[&str] = &["data_mov", "consegna_num", "vettore", "colli", "compenso"];
const DEFAULT_SORT: SortSpec = SortSpec::desc("data_mov");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerzistiFilters {
  pub viaggio: Option<String>,
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

impl TerzistiFilters {
  fn predicate(&self) -> Predicate {
    let mut p = Predicate::new();
    p.apply(VIAGGIO, self.viaggio.as_deref());
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

/// One delivery as settled with its carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerzistaGruppo {
  pub consegna_num: String,
  pub data_mov: Option<String>,
  pub viaggio: Option<String>,
  pub vettore: String,
  pub descr_vettore: Option<String>,
  pub tipologia: Option<String>,
  pub cod_cliente: Option<String>,
  pub ragione_sociale: Option<String>,
  pub deposito: Option<String>,
  pub colli: i64,
  pub compenso: f64,
  pub tariffa_media: f64,
  pub righe: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerzistiStats {
  pub consegne: u64,
  pub vettori: u64,
  pub viaggi: u64,
  pub colli: i64,
  pub compenso: f64,
  pub compenso_medio_consegna: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerzistiOptions {
  pub divisioni: Vec<String>,
  pub bu: Vec<String>,
  pub depositi: Vec<String>,
  pub vettori: Vec<String>,
  pub tipologie: Vec<String>,
}

enum Key<'a> {
  Grouped {
    page: u32,
    filters: &'a TerzistiFilters,
    sort: SortSpec,
  },
  Stats {
    filters: &'a TerzistiFilters,
  },
  Options,
}

impl QueryKey for Key<'_> {
  fn prefix(&self) -> &'static str {
    match self {
      Key::Grouped { .. } => "terzisti:grouped",
      Key::Stats { .. } => "terzisti:stats",
      Key::Options => "terzisti:options",
    }
  }

  fn payload(&self) -> serde_json::Value {
    match self {
      Key::Grouped { page, filters, sort } => json!({
        "page": page,
        "filters": filters,
        "sort": { "field": sort.field, "order": sort.order.as_sql() },
      }),
      Key::Stats { filters } => json!({ "filters": filters }),
      Key::Options => json!({}),
    }
  }
}

/// Carrier data-access service.
pub struct TerzistiService {
  db: Arc<Database>,
  cache: CacheLayer,
  page_size: u32,
}

impl TerzistiService {
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

  /// One page of per-delivery carrier settlements.
  pub async fn grouped_page(
    &self,
    page: u32,
    filters: &TerzistiFilters,
    sort_field: Option<&str>,
    sort_order: Option<&str>,
  ) -> Result<ResultPage<TerzistaGruppo>> {
    let sort = query::resolve_sort(sort_field, sort_order, SORT_FIELDS, DEFAULT_SORT);
    let page = query::clamp_page(page);
    let key = Key::Grouped { page, filters, sort };

    self
      .cache
      .with_cache(&key, PAGE_TTL, || async move {
        self.fetch_grouped(page, filters, sort)
      })
      .await
  }

  pub async fn stats(&self, filters: &TerzistiFilters) -> Result<TerzistiStats> {
    let key = Key::Stats { filters };
    self
      .cache
      .with_cache(&key, STATS_TTL, || async move { self.fetch_stats(filters) })
      .await
  }

  pub async fn filter_options(&self) -> Result<TerzistiOptions> {
    self
      .cache
      .with_cache(&Key::Options, OPTIONS_TTL, || async move {
        Ok(TerzistiOptions {
          divisioni: self.distinct("divisione")?,
          bu: self.distinct("bu")?,
          depositi: self.distinct("deposito")?,
          vettori: self.distinct("vettore")?,
          tipologie: self.distinct("tipologia")?,
        })
      })
      .await
  }

  fn fetch_grouped(
    &self,
    page: u32,
    filters: &TerzistiFilters,
    sort: SortSpec,
  ) -> Result<ResultPage<TerzistaGruppo>> {
    let predicate = filters.predicate();
    let where_clause = predicate.where_clause();

    const GROUP_KEYS: &str = "consegna_num, data_mov, viaggio, vettore, descr_vettore, \
       tipologia, cod_cliente, ragione_sociale, deposito";

    let data_sql = format!(
      "SELECT consegna_num, data_mov, viaggio, vettore, descr_vettore, tipologia, \
       cod_cliente, ragione_sociale, deposito, \
       COALESCE(SUM(colli), 0) AS colli, COALESCE(SUM(compenso), 0) AS compenso, \
       COALESCE(AVG(tariffa), 0) AS tariffa_media, COUNT(*) AS righe \
       FROM terzisti{} GROUP BY {} ORDER BY {} LIMIT ? OFFSET ?",
      where_clause,
      GROUP_KEYS,
      sort.as_sql()
    );

    let mut params = predicate.params().to_vec();
    params.push(Value::Integer(i64::from(self.page_size)));
    params.push(Value::Integer(query::offset(page, self.page_size) as i64));

    let rows = self.db.query_rows(&data_sql, &params, map_group)?;

    let count_sql = format!(
      "SELECT COUNT(*) FROM (SELECT 1 FROM terzisti{} GROUP BY {}) t",
      where_clause, GROUP_KEYS
    );
    let total = self.db.query_count(&count_sql, predicate.params())?;

    Ok(ResultPage::new(rows, total, self.page_size))
  }

  fn fetch_stats(&self, filters: &TerzistiFilters) -> Result<TerzistiStats> {
    let predicate = filters.predicate();
    let sql = format!(
      "SELECT COUNT(DISTINCT consegna_num), COUNT(DISTINCT vettore), \
       COUNT(DISTINCT viaggio), COALESCE(SUM(colli), 0), COALESCE(SUM(compenso), 0) \
       FROM terzisti{}",
      predicate.where_clause()
    );

    let mut rows = self.db.query_rows(&sql, predicate.params(), |row| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, i64>(1)?,
        row.get::<_, i64>(2)?,
        row.get::<_, i64>(3)?,
        row.get::<_, f64>(4)?,
      ))
    })?;

    let (consegne, vettori, viaggi, colli, compenso) = rows
      .pop()
      .ok_or_else(|| eyre!("Stats query returned no rows"))?;

    Ok(TerzistiStats {
      consegne: consegne.max(0) as u64,
      vettori: vettori.max(0) as u64,
      viaggi: viaggi.max(0) as u64,
      colli,
      compenso,
      compenso_medio_consegna: if consegne > 0 {
        compenso / consegne as f64
      } else {
        0.0
      },
    })
  }

  fn distinct(&self, column: &str) -> Result<Vec<String>> {
    let sql = format!(
      "SELECT DISTINCT {c} FROM terzisti WHERE {c} IS NOT NULL AND {c} <> '' ORDER BY {c}",
      c = column
    );
    self.db.query_strings(&sql, &[])
  }
}

fn map_group(row: &Row<'_>) -> rusqlite::Result<TerzistaGruppo> {
  Ok(TerzistaGruppo {
    consegna_num: row.get(0)?,
    data_mov: row.get(1)?,
    viaggio: row.get(2)?,
    vettore: row.get(3)?,
    descr_vettore: row.get(4)?,
    tipologia: row.get(5)?,
    cod_cliente: row.get(6)?,
    ragione_sociale: row.get(7)?,
    deposito: row.get(8)?,
    colli: row.get(9)?,
    compenso: row.get(10)?,
    tariffa_media: row.get(11)?,
    righe: row.get(12)?,
  })
}
