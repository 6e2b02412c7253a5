//! Record types: one row per (series, period).
//!
//! Raw values arrive from a data source; derived metrics are computed by
//! [`crate::metrics`] and written alongside the raw value in a single upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Period, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// The two parallel time series held by the store.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Series {
  /// Monthly solar PV generation, GWh.
  Generation,
  /// End-of-month installed solar PV capacity, GW.
  Capacity,
}

impl Series {
  pub const ALL: [Series; 2] = [Series::Generation, Series::Capacity];

  /// Parse the snake_case form, mapping failures onto the crate error.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownSeries(s.to_owned()))
  }

  /// Name of the raw-value field, as used in exports and the revision log.
  pub fn raw_field(self) -> &'static str {
    match self {
      Series::Generation => "generation_gwh",
      Series::Capacity => "capacity_gw",
    }
  }
}

/// Where a raw value came from.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DataSource {
  /// Typed in by an operator.
  #[default]
  Manual,
  ApiPrimary,
  ApiSecondary,
}

impl DataSource {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownDataSource(s.to_owned()))
  }
}

// ─── Derived metrics ─────────────────────────────────────────────────────────

/// Derived fields of a generation row. `None` means "metric unavailable".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
  pub mom_pct:             Option<f64>,
  pub yoy_pct:             Option<f64>,
  pub rolling_12m_gwh:     Option<f64>,
  pub capacity_factor_pct: Option<f64>,
  /// Clamped to `0..=100`.
  pub momentum_score:      Option<u8>,
}

/// Derived fields of a capacity row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityMetrics {
  pub monthly_addition_gw:  Option<f64>,
  pub rolling_12m_added_gw: Option<f64>,
  /// Same quantity as `rolling_12m_added_gw`, re-rounded to one decimal.
  pub build_pace_gw_yr:     Option<f64>,
}

/// Both derived bundles for one period, as returned by the metrics engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
  pub generation: GenerationMetrics,
  pub capacity:   CapacityMetrics,
}

/// Derived fields for a single series; the variant selects the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivedMetrics {
  Generation(GenerationMetrics),
  Capacity(CapacityMetrics),
}

impl DerivedMetrics {
  pub fn series(&self) -> Series {
    match self {
      Self::Generation(_) => Series::Generation,
      Self::Capacity(_) => Series::Capacity,
    }
  }
}

// ─── Upsert input ────────────────────────────────────────────────────────────

/// Input to [`crate::store::PeriodStore::upsert`]. Revision flags and
/// timestamps are always set by the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewReading {
  pub period:  Period,
  pub value:   f64,
  pub metrics: DerivedMetrics,
  pub source:  DataSource,
}

impl NewReading {
  pub fn generation(
    period: Period,
    gwh: f64,
    metrics: GenerationMetrics,
    source: DataSource,
  ) -> Self {
    Self { period, value: gwh, metrics: DerivedMetrics::Generation(metrics), source }
  }

  pub fn capacity(
    period: Period,
    gw: f64,
    metrics: CapacityMetrics,
    source: DataSource,
  ) -> Self {
    Self { period, value: gw, metrics: DerivedMetrics::Capacity(metrics), source }
  }

  pub fn series(&self) -> Series { self.metrics.series() }
}

// ─── Stored rows ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
  pub period:         Period,
  pub generation_gwh: f64,
  #[serde(flatten)]
  pub metrics:        GenerationMetrics,
  pub data_source:    DataSource,
  /// Set once the period has been written more than once; never cleared.
  pub is_revised:     bool,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRecord {
  pub period:      Period,
  pub capacity_gw: f64,
  #[serde(flatten)]
  pub metrics:     CapacityMetrics,
  pub data_source: DataSource,
  pub is_revised:  bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// A row from either series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "series", rename_all = "snake_case")]
pub enum Record {
  Generation(GenerationRecord),
  Capacity(CapacityRecord),
}

impl Record {
  pub fn series(&self) -> Series {
    match self {
      Self::Generation(_) => Series::Generation,
      Self::Capacity(_) => Series::Capacity,
    }
  }

  pub fn period(&self) -> Period {
    match self {
      Self::Generation(r) => r.period,
      Self::Capacity(r) => r.period,
    }
  }

  /// The raw series value: GWh for generation, GW for capacity.
  pub fn raw_value(&self) -> f64 {
    match self {
      Self::Generation(r) => r.generation_gwh,
      Self::Capacity(r) => r.capacity_gw,
    }
  }

  pub fn is_revised(&self) -> bool {
    match self {
      Self::Generation(r) => r.is_revised,
      Self::Capacity(r) => r.is_revised,
    }
  }

  pub fn data_source(&self) -> DataSource {
    match self {
      Self::Generation(r) => r.data_source,
      Self::Capacity(r) => r.data_source,
    }
  }

  pub fn into_generation(self) -> Option<GenerationRecord> {
    match self {
      Self::Generation(r) => Some(r),
      Self::Capacity(_) => None,
    }
  }

  pub fn into_capacity(self) -> Option<CapacityRecord> {
    match self {
      Self::Capacity(r) => Some(r),
      Self::Generation(_) => None,
    }
  }
}

// ─── Revision log ────────────────────────────────────────────────────────────

/// One append-only audit entry recording a changed field on a revised row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionEntry {
  pub revision_id: Uuid,
  pub series:      Series,
  pub period:      Period,
  pub field:       String,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub reason:      String,
  pub recorded_at: DateTime<Utc>,
}
