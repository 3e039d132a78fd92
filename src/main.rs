use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use traspo::cache::{spawn_sweeper, CacheLayer, MemoryStore};
use traspo::config::Config;
use traspo::db::Database;
use traspo::query::opt_text;
use traspo::services::{
  consegne::ConsegneFilters, terzisti::TerzistiFilters, viaggi::ViaggiFilters, ConsegneService,
  TerzistiService, ViaggiService,
};

#[derive(Parser, Debug)]
#[command(name = "traspo")]
#[command(about = "Query deliveries, carrier settlements and trips from the logistics database")]
#[command(version)]
struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/traspo/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Delivery invoice lines
  Consegne {
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    page: PageArgs,
  },
  /// Deliveries grouped over their invoice lines
  Gruppi {
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    page: PageArgs,
  },
  /// Third-party carrier settlements, grouped per delivery
  Terzisti {
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    page: PageArgs,
  },
  /// Trip records
  Viaggi {
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    page: PageArgs,
  },
}

/// Shared filter flags. Textual values go through the sentinel decode, so
/// passing "Tutti" on the command line behaves like omitting the flag.
#[derive(Args, Debug)]
struct FilterArgs {
  #[arg(long)]
  viaggio: Option<String>,
  #[arg(long)]
  ordine: Option<String>,
  #[arg(long)]
  cod_cliente: Option<String>,
  #[arg(long)]
  cliente: Option<String>,
  #[arg(long)]
  divisione: Option<String>,
  #[arg(long)]
  bu: Option<String>,
  #[arg(long)]
  deposito: Option<String>,
  #[arg(long)]
  vettore: Option<String>,
  #[arg(long)]
  tipologia: Option<String>,
  #[arg(long)]
  nominativo: Option<String>,
  #[arg(long)]
  targa: Option<String>,
  #[arg(long)]
  data_da: Option<NaiveDate>,
  #[arg(long)]
  data_a: Option<NaiveDate>,
  #[arg(long)]
  mese: Option<u32>,
  #[arg(long)]
  anno: Option<u32>,
}

#[derive(Args, Debug)]
struct PageArgs {
  /// 1-based page number
  #[arg(long, default_value_t = 1)]
  page: u32,
  /// Sort field (dataset-specific allow-list; unknown fields use the default)
  #[arg(long)]
  sort: Option<String>,
  /// ASC or DESC
  #[arg(long)]
  order: Option<String>,
  /// Print aggregate stats for the filtered set instead of a page
  #[arg(long)]
  stats: bool,
}

impl FilterArgs {
  fn decoded(&self, raw: &Option<String>) -> Option<String> {
    raw.as_deref().and_then(opt_text)
  }

  fn consegne(&self) -> ConsegneFilters {
    ConsegneFilters {
      viaggio: self.decoded(&self.viaggio),
      ordine: self.decoded(&self.ordine),
      cod_cliente: self.decoded(&self.cod_cliente),
      cliente: self.decoded(&self.cliente),
      divisione: self.decoded(&self.divisione),
      bu: self.decoded(&self.bu),
      deposito: self.decoded(&self.deposito),
      vettore: self.decoded(&self.vettore),
      tipologia: self.decoded(&self.tipologia),
      data_da: self.data_da,
      data_a: self.data_a,
      mese: self.mese,
      anno: self.anno,
    }
  }

  fn terzisti(&self) -> TerzistiFilters {
    TerzistiFilters {
      viaggio: self.decoded(&self.viaggio),
      cod_cliente: self.decoded(&self.cod_cliente),
      cliente: self.decoded(&self.cliente),
      divisione: self.decoded(&self.divisione),
      bu: self.decoded(&self.bu),
      deposito: self.decoded(&self.deposito),
      vettore: self.decoded(&self.vettore),
      tipologia: self.decoded(&self.tipologia),
      data_da: self.data_da,
      data_a: self.data_a,
      mese: self.mese,
      anno: self.anno,
    }
  }

  fn viaggi(&self) -> ViaggiFilters {
    ViaggiFilters {
      viaggio: self.decoded(&self.viaggio),
      nominativo: self.decoded(&self.nominativo),
      targa: self.decoded(&self.targa),
      deposito: self.decoded(&self.deposito),
      data_da: self.data_da,
      data_a: self.data_a,
      mese: self.mese,
      anno: self.anno,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = Config::load(cli.config.as_deref())?;

  let db = Arc::new(match &config.database.path {
    Some(path) => Database::open(path)?,
    None => Database::open_default()?,
  });

  // Composition root owns the cache and its sweeper for the process lifetime.
  let store = Arc::new(MemoryStore::new());
  let _sweeper = spawn_sweeper(&store, config.cache.sweep_interval());
  let cache = CacheLayer::new(Arc::clone(&store));

  match &cli.command {
    Command::Consegne { filters, page } => {
      let service = ConsegneService::new(Arc::clone(&db), cache.clone())
        .with_page_size(config.query.page_size)
        .with_fallback_months(config.query.fallback_months);
      let filters = filters.consegne();

      if page.stats {
        let stats = service.stats(&filters).await?;
        println!(
          "righe {}  consegne {}  clienti {}  vettori {}  colli {}  compenso {:.2}  medio/consegna {:.2}",
          stats.righe,
          stats.consegne,
          stats.clienti,
          stats.vettori,
          stats.colli,
          stats.compenso,
          stats.compenso_medio_consegna
        );
      } else {
        let result = service
          .page(page.page, &filters, page.sort.as_deref(), page.order.as_deref())
          .await?;
        for row in &result.rows {
          println!(
            "{:<12} {:<10} {:<10} {:<20} {:>6} {:>10.2}",
            row.consegna_num,
            row.data_mov.as_deref().unwrap_or("-"),
            row.viaggio.as_deref().unwrap_or("-"),
            row.descr_vettore.as_deref().unwrap_or("-"),
            row.colli,
            row.compenso
          );
        }
        print_footer(page.page, result.total_pages, result.total_items);
      }
    }
    Command::Gruppi { filters, page } => {
      let service = ConsegneService::new(Arc::clone(&db), cache.clone())
        .with_page_size(config.query.page_size)
        .with_fallback_months(config.query.fallback_months);
      let filters = filters.consegne();

      let result = service
        .grouped_page(page.page, &filters, page.sort.as_deref(), page.order.as_deref())
        .await?;
      for gruppo in &result.rows {
        println!(
          "{:<12} {:<10} {:<20} righe {:>4} ordini {:>4} colli {:>6} compenso {:>10.2}",
          gruppo.consegna_num,
          gruppo.data_mov.as_deref().unwrap_or("-"),
          gruppo.descr_vettore.as_deref().unwrap_or("-"),
          gruppo.righe,
          gruppo.ordini,
          gruppo.colli,
          gruppo.compenso
        );
      }
      print_footer(page.page, result.total_pages, result.total_items);
    }
    Command::Terzisti { filters, page } => {
      let service =
        TerzistiService::new(Arc::clone(&db), cache.clone()).with_page_size(config.query.page_size);
      let filters = filters.terzisti();

      if page.stats {
        let stats = service.stats(&filters).await?;
        println!(
          "consegne {}  vettori {}  viaggi {}  colli {}  compenso {:.2}  medio/consegna {:.2}",
          stats.consegne,
          stats.vettori,
          stats.viaggi,
          stats.colli,
          stats.compenso,
          stats.compenso_medio_consegna
        );
      } else {
        let result = service
          .grouped_page(page.page, &filters, page.sort.as_deref(), page.order.as_deref())
          .await?;
        for gruppo in &result.rows {
          println!(
            "{:<12} {:<10} {:<20} colli {:>6} compenso {:>10.2} tariffa {:>8.2}",
            gruppo.consegna_num,
            gruppo.data_mov.as_deref().unwrap_or("-"),
            gruppo.vettore,
            gruppo.colli,
            gruppo.compenso,
            gruppo.tariffa_media
          );
        }
        print_footer(page.page, result.total_pages, result.total_items);
      }
    }
    Command::Viaggi { filters, page } => {
      let service =
        ViaggiService::new(Arc::clone(&db), cache.clone()).with_page_size(config.query.page_size);
      let filters = filters.viaggi();

      if page.stats {
        let stats = service.stats(&filters).await?;
        println!(
          "viaggi {}  mezzi {}  km {:.1}  colli {}  peso {:.1} kg  km/viaggio {:.1}",
          stats.viaggi, stats.mezzi, stats.km, stats.colli, stats.peso_kg, stats.km_medi_viaggio
        );
      } else {
        let result = service
          .page(page.page, &filters, page.sort.as_deref(), page.order.as_deref())
          .await?;
        for row in &result.rows {
          println!(
            "{:<10} {:<10} {:<20} {:<8} km {:>7.1} colli {:>5}",
            row.viaggio,
            row.data_inizio.as_deref().unwrap_or("-"),
            row.nominativo.as_deref().unwrap_or("-"),
            row.targa.as_deref().unwrap_or("-"),
            row.tot_km,
            row.colli
          );
        }
        print_footer(page.page, result.total_pages, result.total_items);
      }
    }
  }

  Ok(())
}

fn print_footer(page: u32, total_pages: u64, total_items: u64) {
  println!("-- page {} of {} ({} items)", page.max(1), total_pages, total_items);
}
