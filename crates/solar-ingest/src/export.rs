//! CSV exports of both series.
//!
//! Two kinds of file per series: a master file holding the full ascending
//! history, and a one-row slice per month. Missing metrics render as empty
//! cells. Numbers use the fixed decimal scales of the storage columns so the
//! files stay byte-compatible with earlier exports.

use std::{
  fmt::Write as _,
  future::Future,
  path::{Path, PathBuf},
};

use solar_core::{
  Period,
  metrics::round_to,
  record::{CapacityRecord, GenerationRecord, Series},
};

use crate::error::ExportError;

pub const GENERATION_HEADER: &str = "year,month,period,generation_gwh,mom_pct,yoy_pct,\
   rolling_12m_gwh,capacity_factor_pct,momentum_score,data_source";

pub const CAPACITY_HEADER: &str = "year,month,period,capacity_gw,monthly_addition_gw,\
   rolling_12m_added_gw,build_pace_gw_yr,data_source";

pub fn master_file_name(series: Series) -> String {
  format!("solar-{series}-spain-master.csv")
}

pub fn slice_file_name(series: Series, period: Period) -> String {
  format!("solar-{series}-spain-{period}.csv")
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// Half-way cases round away from zero, as the DECIMAL columns did.
fn fixed(value: f64, places: usize) -> String {
  // `+ 0.0` folds a rounded `-0.0` into `0.0`.
  let rounded = round_to(value, places as i32) + 0.0;
  format!("{rounded:.places$}")
}

fn cell(value: Option<f64>, places: usize) -> String {
  value.map(|v| fixed(v, places)).unwrap_or_default()
}

fn generation_line(out: &mut String, r: &GenerationRecord) {
  let m = &r.metrics;
  let _ = writeln!(
    out,
    "{},{},{},{},{},{},{},{},{},{}",
    r.period.year(),
    r.period.month(),
    r.period,
    fixed(r.generation_gwh, 2),
    cell(m.mom_pct, 3),
    cell(m.yoy_pct, 3),
    cell(m.rolling_12m_gwh, 2),
    cell(m.capacity_factor_pct, 2),
    m.momentum_score.map(|s| s.to_string()).unwrap_or_default(),
    r.data_source,
  );
}

fn capacity_line(out: &mut String, r: &CapacityRecord) {
  let m = &r.metrics;
  let _ = writeln!(
    out,
    "{},{},{},{},{},{},{},{}",
    r.period.year(),
    r.period.month(),
    r.period,
    fixed(r.capacity_gw, 3),
    cell(m.monthly_addition_gw, 3),
    cell(m.rolling_12m_added_gw, 3),
    cell(m.build_pace_gw_yr, 3),
    r.data_source,
  );
}

pub fn render_generation(rows: &[GenerationRecord]) -> String {
  let mut out = format!("{GENERATION_HEADER}\n");
  for r in rows {
    generation_line(&mut out, r);
  }
  out
}

pub fn render_capacity(rows: &[CapacityRecord]) -> String {
  let mut out = format!("{CAPACITY_HEADER}\n");
  for r in rows {
    capacity_line(&mut out, r);
  }
  out
}

// ─── Exporter ────────────────────────────────────────────────────────────────

/// Destination for rendered exports.
pub trait Exporter: Send + Sync {
  /// Rewrite both master files from the full ascending history.
  fn write_master(
    &self,
    generation: Vec<GenerationRecord>,
    capacity: Vec<CapacityRecord>,
  ) -> impl Future<Output = Result<(), ExportError>> + Send + '_;

  /// Write the one-month slice of each series that has a row.
  fn write_slice(
    &self,
    period: Period,
    generation: Option<GenerationRecord>,
    capacity: Option<CapacityRecord>,
  ) -> impl Future<Output = Result<(), ExportError>> + Send + '_;
}

/// Writes CSV files into a single directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct CsvExporter {
  dir: PathBuf,
}

impl CsvExporter {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  pub fn dir(&self) -> &Path { &self.dir }

  async fn write_file(&self, name: &str, content: String) -> Result<(), ExportError> {
    tokio::fs::create_dir_all(&self.dir)
      .await
      .map_err(|source| ExportError::Io { path: self.dir.clone(), source })?;

    let path = self.dir.join(name);
    tokio::fs::write(&path, content)
      .await
      .map_err(|source| ExportError::Io { path: path.clone(), source })?;

    tracing::debug!(path = %path.display(), "wrote CSV export");
    Ok(())
  }
}

impl Exporter for CsvExporter {
  async fn write_master(
    &self,
    generation: Vec<GenerationRecord>,
    capacity: Vec<CapacityRecord>,
  ) -> Result<(), ExportError> {
    self
      .write_file(&master_file_name(Series::Generation), render_generation(&generation))
      .await?;
    self
      .write_file(&master_file_name(Series::Capacity), render_capacity(&capacity))
      .await?;
    tracing::info!(
      generation_rows = generation.len(),
      capacity_rows = capacity.len(),
      "regenerated master CSVs"
    );
    Ok(())
  }

  async fn write_slice(
    &self,
    period: Period,
    generation: Option<GenerationRecord>,
    capacity: Option<CapacityRecord>,
  ) -> Result<(), ExportError> {
    if let Some(row) = generation {
      self
        .write_file(
          &slice_file_name(Series::Generation, period),
          render_generation(std::slice::from_ref(&row)),
        )
        .await?;
    }
    if let Some(row) = capacity {
      self
        .write_file(
          &slice_file_name(Series::Capacity, period),
          render_capacity(std::slice::from_ref(&row)),
        )
        .await?;
    }
    Ok(())
  }
}
