//! `solar-index`: command-line entry point for the Solar Index Spain
//! pipeline.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store and either serves the JSON API or runs one pipeline action.
//!
//! ```text
//! solar-index serve
//! solar-index fetch [--year 2024 --month 3]     # defaults to last month
//! solar-index ingest --year 2024 --month 3 --generation 3123.46 --capacity 31.754
//! solar-index backfill --year 2024 --from 1 --to 12
//! solar-index export
//! solar-index hash-password
//! ```

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::{Datelike as _, Utc};
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use solar_api::{AppState, AuthConfig};
use solar_core::{Period, record::DataSource};
use solar_ingest::{
  ActivityLog, Ingestor, StopSignal,
  drafts::BulletinDrafts,
  export::CsvExporter,
  redata::RedataSource,
};
use solar_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

type SolarIngestor = Ingestor<SqliteStore, CsvExporter, BulletinDrafts<SqliteStore>>;

#[derive(Parser)]
#[command(author, version, about = "Solar Index Spain data pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API.
  Serve,
  /// Fetch one month from REData and ingest it.
  Fetch {
    #[arg(long, requires = "month")]
    year:  Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
  },
  /// Ingest operator-supplied values for one month.
  Ingest {
    #[arg(long)]
    year:       i32,
    #[arg(long)]
    month:      u32,
    /// Solar PV generation, GWh.
    #[arg(long)]
    generation: f64,
    /// Installed solar PV capacity, GW.
    #[arg(long)]
    capacity:   f64,
    #[arg(long, default_value = "manual")]
    source:     String,
  },
  /// Fetch and ingest a range of months of one year, oldest first.
  Backfill {
    #[arg(long)]
    year: i32,
    #[arg(long, default_value_t = 1)]
    from: u32,
    #[arg(long, default_value_t = 12)]
    to:   u32,
  },
  /// Regenerate the master CSV files from the store.
  Export,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Command::HashPassword => hash_password(),
    Command::Serve => {
      let (cfg, ingestor) = setup(&cli.config).await?;
      serve(cfg, ingestor).await
    }
    Command::Fetch { year, month } => {
      let (cfg, ingestor) = setup(&cli.config).await?;
      let period = match (year, month) {
        (Some(year), Some(month)) => Period::new(year, month)?,
        _ => last_month()?,
      };
      let source = RedataSource::new(cfg.fetch.redata())?;
      let report = ingestor.run_period(&source, period).await?;
      print_report(&report);
      Ok(())
    }
    Command::Ingest { year, month, generation, capacity, source } => {
      let (_, ingestor) = setup(&cli.config).await?;
      let period = Period::new(year, month)?;
      let source = DataSource::parse(&source)?;
      let report = ingestor
        .ingest_period(period, Some(generation), Some(capacity), source)
        .await?;
      print_report(&report);
      Ok(())
    }
    Command::Backfill { year, from, to } => {
      let (cfg, ingestor) = setup(&cli.config).await?;
      backfill(&cfg, &ingestor, year, from, to).await
    }
    Command::Export => {
      let (cfg, ingestor) = setup(&cli.config).await?;
      ingestor.regenerate_exports().await?;
      println!("Master CSVs regenerated in {}", cfg.csv_dir.display());
      Ok(())
    }
  }
}

/// Load configuration and open the store.
async fn setup(config_path: &Path) -> anyhow::Result<(ServerConfig, SolarIngestor)> {
  let cfg = ServerConfig::load(config_path)?;
  let ingestor = build_ingestor(&cfg).await?;
  Ok((cfg, ingestor))
}

async fn build_ingestor(cfg: &ServerConfig) -> anyhow::Result<SolarIngestor> {
  if let Some(parent) = cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  Ok(Ingestor::new(
    store.clone(),
    CsvExporter::new(&cfg.csv_dir),
    BulletinDrafts::new(store),
    ActivityLog::new(),
  ))
}

async fn serve(cfg: ServerConfig, ingestor: SolarIngestor) -> anyhow::Result<()> {
  if cfg.auth_username.is_empty() || cfg.auth_password_hash.is_empty() {
    tracing::warn!("operator account is not configured; operator endpoints will reject every request");
  }

  let state = AppState::new(ingestor, AuthConfig {
    username:      cfg.auth_username.clone(),
    password_hash: cfg.auth_password_hash.clone(),
  });

  let app = axum::Router::new()
    .nest("/api", solar_api::api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      tracing::info!("received Ctrl+C, shutting down");
    })
    .await
    .context("server error")?;

  Ok(())
}

async fn backfill(
  cfg: &ServerConfig,
  ingestor: &SolarIngestor,
  year: i32,
  from: u32,
  to: u32,
) -> anyhow::Result<()> {
  if from > to {
    bail!("--from ({from}) must not be after --to ({to})");
  }
  let source = RedataSource::new(cfg.fetch.redata())?;

  // Ctrl-C lets the month in flight finish, then stops.
  let stop = StopSignal::new();
  let watcher = {
    let stop = stop.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("received Ctrl+C, stopping after the current month");
        stop.stop();
      }
    })
  };

  let summary = ingestor.backfill(&source, year, from..=to, &stop).await?;
  watcher.abort();

  for outcome in &summary.outcomes {
    match &outcome.result {
      Ok(report) if report.warnings.is_empty() => println!("{}  ok", outcome.period),
      Ok(report) => println!("{}  ok ({})", outcome.period, report.warnings.join("; ")),
      Err(err) => println!("{}  FAILED: {err}", outcome.period),
    }
  }
  println!(
    "{} ok, {} failed{}",
    summary.ok,
    summary.failed,
    if summary.stopped { " (stopped early)" } else { "" }
  );

  if summary.failed > 0 {
    bail!("{} period(s) failed", summary.failed);
  }
  Ok(())
}

fn print_report(report: &solar_ingest::IngestReport) {
  let g = &report.generation;
  let c = &report.capacity;
  println!("{}", report.period);
  println!("  generation  {:.2} GWh  (revised: {})", g.generation_gwh, g.is_revised);
  println!("  capacity    {:.3} GW  (revised: {})", c.capacity_gw, c.is_revised);
  for warning in &report.warnings {
    println!("  warning: {warning}");
  }
}

/// The calendar month before today's, in UTC.
fn last_month() -> anyhow::Result<Period> {
  let today = Utc::now().date_naive();
  let (year, month) = match today.month() {
    1 => (today.year() - 1, 12),
    m => (today.year(), m - 1),
  };
  Ok(Period::new(year, month)?)
}

fn hash_password() -> anyhow::Result<()> {
  let password = read_password()?;
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
    .to_string();
  println!("{hash}");
  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
