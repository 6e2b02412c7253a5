//! [`Ingestor`]: drives one period (or a range of periods) through the
//! pipeline.
//!
//! ```text
//! Fetched → Validated → Computed → Persisted → Exported → DraftsEnsured
//!    └──────────┴───────────┴──────────┴──→ Failed(stage, reason)
//! ```
//!
//! Validation is all-or-nothing across the two series: nothing is written
//! unless both raw values pass. Export and draft failures happen after the
//! write; they are logged and reported as warnings but never roll back.

use std::{
  ops::RangeInclusive,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use serde::Serialize;
use solar_core::{
  Period,
  metrics,
  record::{CapacityRecord, DataSource, GenerationRecord, NewReading, Record, Series},
  store::PeriodStore,
  validate::{ValidateFailure, Validator},
};
use strum::Display;

use crate::{
  activity::ActivityLog,
  drafts::DraftSink,
  error::{ExportError, FailureKind, IngestError, Result},
  export::Exporter,
  redata::PeriodDataSource,
};

const CONTEXT: &str = "ingest";

// ─── States ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  Fetch,
  Validate,
  Compute,
  Persist,
  Export,
  Drafts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PeriodState {
  Fetched,
  Validated,
  Computed,
  Persisted,
  Exported,
  DraftsEnsured,
  Failed { stage: Stage, reason: String },
}

// ─── Reports ─────────────────────────────────────────────────────────────────

/// Outcome of a successful ingest. Downstream failures show up in `warnings`
/// and are absent from `trail`.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
  pub period:     Period,
  pub generation: GenerationRecord,
  pub capacity:   CapacityRecord,
  /// States reached, in order.
  pub trail:      Vec<PeriodState>,
  pub warnings:   Vec<String>,
}

#[derive(Debug)]
pub struct PeriodOutcome {
  pub period: Period,
  pub result: Result<IngestReport>,
}

impl PeriodOutcome {
  pub fn state(&self) -> PeriodState {
    match &self.result {
      Ok(report) => report.trail.last().cloned().unwrap_or(PeriodState::Persisted),
      Err(err) => PeriodState::Failed { stage: err.stage, reason: err.kind.to_string() },
    }
  }
}

#[derive(Debug, Default)]
pub struct BackfillSummary {
  pub ok:       usize,
  pub failed:   usize,
  pub outcomes: Vec<PeriodOutcome>,
  /// The stop signal ended the run before the last month.
  pub stopped:  bool,
}

/// Cooperative cancellation flag, checked between periods only.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
  pub fn new() -> Self { Self::default() }

  pub fn stop(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_stopped(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

pub struct Ingestor<S, E, D> {
  store:     S,
  validator: Validator,
  exporter:  E,
  drafts:    D,
  activity:  ActivityLog,
}

impl<S, E, D> Ingestor<S, E, D> {
  pub fn new(store: S, exporter: E, drafts: D, activity: ActivityLog) -> Self {
    Self { store, validator: Validator::default(), exporter, drafts, activity }
  }

  pub fn with_validator(mut self, validator: Validator) -> Self {
    self.validator = validator;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn activity(&self) -> &ActivityLog { &self.activity }
}

impl<S, E, D> Ingestor<S, E, D>
where
  S: PeriodStore,
  E: Exporter,
  D: DraftSink,
{
  /// Validate, compute, persist, export and draft one period from raw values.
  pub async fn ingest_period(
    &self,
    period: Period,
    generation_raw: Option<f64>,
    capacity_raw: Option<f64>,
    source: DataSource,
  ) -> Result<IngestReport> {
    self.activity.info(CONTEXT, format!("Starting ingest for {period}"));

    let result = self.ingest_inner(period, generation_raw, capacity_raw, source).await;
    match &result {
      Ok(report) if report.warnings.is_empty() => {
        self.activity.success(CONTEXT, format!("Ingest completed for {period}"));
      }
      Ok(report) => {
        self.activity.success(
          CONTEXT,
          format!(
            "Ingest completed for {period} with {} warning(s)",
            report.warnings.len()
          ),
        );
      }
      Err(err) if err.is_validation() => {
        self.activity.error(CONTEXT, format!("Validation failed for {period}: {}", err.kind));
      }
      Err(err) => {
        self.activity.error(CONTEXT, format!("Ingest failed for {period}: {err}"));
      }
    }
    result
  }

  async fn ingest_inner(
    &self,
    period: Period,
    generation_raw: Option<f64>,
    capacity_raw: Option<f64>,
    source: DataSource,
  ) -> Result<IngestReport> {
    let mut trail = Vec::new();

    // ── Validate both series before touching the store ──
    let generation_gwh = self.validate(Series::Generation, period, generation_raw).await?;
    let capacity_gw = self.validate(Series::Capacity, period, capacity_raw).await?;
    trail.push(PeriodState::Validated);

    // ── Compute ──
    let derived = metrics::compute(&self.store, period, generation_gwh, capacity_gw)
      .await
      .map_err(|e| IngestError::persistence(Stage::Compute, e))?;
    trail.push(PeriodState::Computed);

    // ── Persist ──
    let generation = self
      .upsert(NewReading::generation(period, generation_gwh, derived.generation, source))
      .await?
      .into_generation();
    let capacity = self
      .upsert(NewReading::capacity(period, capacity_gw, derived.capacity, source))
      .await?
      .into_capacity();
    let (Some(generation), Some(capacity)) = (generation, capacity) else {
      return Err(IngestError::persistence(
        Stage::Persist,
        "store returned a row of the wrong series",
      ));
    };
    trail.push(PeriodState::Persisted);
    tracing::info!(
      %period,
      generation_gwh,
      capacity_gw,
      revised = generation.is_revised || capacity.is_revised,
      "persisted period"
    );

    // ── Downstream: failures here never undo the write ──
    let mut warnings = Vec::new();

    match self.export_period(&generation, &capacity).await {
      Ok(()) => trail.push(PeriodState::Exported),
      Err(err) => {
        let msg = format!("CSV export failed for {period}: {err}");
        self.activity.warn(CONTEXT, msg.clone());
        warnings.push(msg);
      }
    }

    match self.drafts.ensure_drafts(period).await {
      Ok(_) => trail.push(PeriodState::DraftsEnsured),
      Err(err) => {
        let msg = format!("Bulletin drafts failed for {period}: {err}");
        self.activity.warn(CONTEXT, msg.clone());
        warnings.push(msg);
      }
    }

    Ok(IngestReport { period, generation, capacity, trail, warnings })
  }

  async fn validate(&self, series: Series, period: Period, raw: Option<f64>) -> Result<f64> {
    self
      .validator
      .validate(&self.store, series, period, raw)
      .await
      .map_err(|failure| match failure {
        ValidateFailure::Invalid(e) => IngestError::new(Stage::Validate, e),
        ValidateFailure::Store(e) => IngestError::persistence(Stage::Validate, e),
      })
  }

  async fn upsert(&self, reading: NewReading) -> Result<Record> {
    self
      .store
      .upsert(reading)
      .await
      .map_err(|e| IngestError::persistence(Stage::Persist, e))
  }

  async fn export_period(
    &self,
    generation: &GenerationRecord,
    capacity: &CapacityRecord,
  ) -> Result<(), ExportError> {
    self.regenerate_master().await?;
    self
      .exporter
      .write_slice(generation.period, Some(generation.clone()), Some(capacity.clone()))
      .await
  }

  async fn regenerate_master(&self) -> Result<(), ExportError> {
    let generation = self
      .store
      .get_all(Series::Generation)
      .await
      .map_err(|e| ExportError::Store(e.to_string()))?
      .into_iter()
      .filter_map(Record::into_generation)
      .collect();
    let capacity = self
      .store
      .get_all(Series::Capacity)
      .await
      .map_err(|e| ExportError::Store(e.to_string()))?
      .into_iter()
      .filter_map(Record::into_capacity)
      .collect();
    self.exporter.write_master(generation, capacity).await
  }

  /// Rewrite the master CSVs from the store without ingesting anything.
  pub async fn regenerate_exports(&self) -> Result<(), ExportError> {
    match self.regenerate_master().await {
      Ok(()) => {
        self.activity.success(CONTEXT, "Master CSVs regenerated");
        Ok(())
      }
      Err(err) => {
        self.activity.error(CONTEXT, format!("Master CSV regeneration failed: {err}"));
        Err(err)
      }
    }
  }

  /// Fetch raw values for `period` from `source`, then ingest them.
  pub async fn run_period<F: PeriodDataSource>(
    &self,
    source: &F,
    period: Period,
  ) -> Result<IngestReport> {
    let reading = match source.fetch(period).await {
      Ok(reading) => reading,
      Err(err) => {
        self.activity.error(CONTEXT, format!("Fetch failed for {period}: {err}"));
        return Err(IngestError::new(Stage::Fetch, FailureKind::Fetch(err)));
      }
    };

    let mut report = self
      .ingest_period(
        period,
        Some(reading.generation_gwh),
        Some(reading.capacity_gw),
        reading.source,
      )
      .await?;
    report.trail.insert(0, PeriodState::Fetched);
    Ok(report)
  }

  /// Run `months` of `year` in ascending order, one at a time. A failed
  /// period is recorded and the run moves on. `stop` is checked before each
  /// period; the period in flight always completes.
  pub async fn backfill<F: PeriodDataSource>(
    &self,
    source: &F,
    year: i32,
    months: RangeInclusive<u32>,
    stop: &StopSignal,
  ) -> solar_core::Result<BackfillSummary> {
    let periods = months
      .map(|month| Period::new(year, month))
      .collect::<solar_core::Result<Vec<_>>>()?;

    self.activity.info(
      CONTEXT,
      format!("Starting backfill of {} period(s) for {year}", periods.len()),
    );

    let mut summary = BackfillSummary::default();
    for period in periods {
      if stop.is_stopped() {
        summary.stopped = true;
        self.activity.warn(CONTEXT, format!("Backfill stopped before {period}"));
        break;
      }

      let result = self.run_period(source, period).await;
      match &result {
        Ok(_) => summary.ok += 1,
        Err(_) => summary.failed += 1,
      }
      summary.outcomes.push(PeriodOutcome { period, result });
    }

    self.activity.info(
      CONTEXT,
      format!("Backfill finished: {} ok, {} failed", summary.ok, summary.failed),
    );
    Ok(summary)
  }
}
