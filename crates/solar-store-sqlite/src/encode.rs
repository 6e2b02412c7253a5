//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, enums as their snake/kebab-case names. Each series lives in its own
//! table; [`table_for`] and [`series_for_table`] map between the two.

use chrono::{DateTime, Utc};
use solar_core::{
  Period,
  bulletin::BulletinDraft,
  record::{
    CapacityMetrics, CapacityRecord, DataSource, GenerationMetrics,
    GenerationRecord, Record, RevisionEntry, Series,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Period ──────────────────────────────────────────────────────────────────

pub fn decode_period(year: i64, month: i64) -> Result<Period> {
  let year = i32::try_from(year).map_err(|_| Error::Decode {
    column: "period_year",
    value:  year.to_string(),
  })?;
  let month = u32::try_from(month).map_err(|_| Error::Decode {
    column: "period_month",
    value:  month.to_string(),
  })?;
  Ok(Period::new(year, month)?)
}

// ─── Series tables ───────────────────────────────────────────────────────────

pub fn table_for(series: Series) -> &'static str {
  match series {
    Series::Generation => "solar_generation_data",
    Series::Capacity => "solar_capacity_data",
  }
}

pub fn series_for_table(table: &str) -> Result<Series> {
  match table {
    "solar_generation_data" => Ok(Series::Generation),
    "solar_capacity_data" => Ok(Series::Capacity),
    other => Err(Error::Decode { column: "table_name", value: other.to_owned() }),
  }
}

pub const GENERATION_COLUMNS: &str = "period_year, period_month, generation_gwh, \
   mom_pct, yoy_pct, rolling_12m_gwh, capacity_factor_pct, momentum_score, \
   data_source, is_revised, created_at, updated_at";

pub const CAPACITY_COLUMNS: &str = "period_year, period_month, capacity_gw, \
   monthly_addition_gw, rolling_12m_added_gw, build_pace_gw_yr, \
   data_source, is_revised, created_at, updated_at";

pub fn columns_for(series: Series) -> &'static str {
  match series {
    Series::Generation => GENERATION_COLUMNS,
    Series::Capacity => CAPACITY_COLUMNS,
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `solar_generation_data` row.
pub struct RawGenerationRow {
  pub period_year:         i64,
  pub period_month:        i64,
  pub generation_gwh:      f64,
  pub mom_pct:             Option<f64>,
  pub yoy_pct:             Option<f64>,
  pub rolling_12m_gwh:     Option<f64>,
  pub capacity_factor_pct: Option<f64>,
  pub momentum_score:      Option<i64>,
  pub data_source:         String,
  pub is_revised:          bool,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawGenerationRow {
  /// Column order must match [`GENERATION_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_year:         row.get(0)?,
      period_month:        row.get(1)?,
      generation_gwh:      row.get(2)?,
      mom_pct:             row.get(3)?,
      yoy_pct:             row.get(4)?,
      rolling_12m_gwh:     row.get(5)?,
      capacity_factor_pct: row.get(6)?,
      momentum_score:      row.get(7)?,
      data_source:         row.get(8)?,
      is_revised:          row.get(9)?,
      created_at:          row.get(10)?,
      updated_at:          row.get(11)?,
    })
  }

  pub fn into_record(self) -> Result<GenerationRecord> {
    let momentum_score = self
      .momentum_score
      .map(|m| {
        u8::try_from(m)
          .map_err(|_| Error::Decode { column: "momentum_score", value: m.to_string() })
      })
      .transpose()?;

    Ok(GenerationRecord {
      period:         decode_period(self.period_year, self.period_month)?,
      generation_gwh: self.generation_gwh,
      metrics:        GenerationMetrics {
        mom_pct: self.mom_pct,
        yoy_pct: self.yoy_pct,
        rolling_12m_gwh: self.rolling_12m_gwh,
        capacity_factor_pct: self.capacity_factor_pct,
        momentum_score,
      },
      data_source:    DataSource::parse(&self.data_source)?,
      is_revised:     self.is_revised,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from a `solar_capacity_data` row.
pub struct RawCapacityRow {
  pub period_year:          i64,
  pub period_month:         i64,
  pub capacity_gw:          f64,
  pub monthly_addition_gw:  Option<f64>,
  pub rolling_12m_added_gw: Option<f64>,
  pub build_pace_gw_yr:     Option<f64>,
  pub data_source:          String,
  pub is_revised:           bool,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawCapacityRow {
  /// Column order must match [`CAPACITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      period_year:          row.get(0)?,
      period_month:         row.get(1)?,
      capacity_gw:          row.get(2)?,
      monthly_addition_gw:  row.get(3)?,
      rolling_12m_added_gw: row.get(4)?,
      build_pace_gw_yr:     row.get(5)?,
      data_source:          row.get(6)?,
      is_revised:           row.get(7)?,
      created_at:           row.get(8)?,
      updated_at:           row.get(9)?,
    })
  }

  pub fn into_record(self) -> Result<CapacityRecord> {
    Ok(CapacityRecord {
      period:      decode_period(self.period_year, self.period_month)?,
      capacity_gw: self.capacity_gw,
      metrics:     CapacityMetrics {
        monthly_addition_gw:  self.monthly_addition_gw,
        rolling_12m_added_gw: self.rolling_12m_added_gw,
        build_pace_gw_yr:     self.build_pace_gw_yr,
      },
      data_source: DataSource::parse(&self.data_source)?,
      is_revised:  self.is_revised,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// A row of either series table.
pub enum RawRow {
  Generation(RawGenerationRow),
  Capacity(RawCapacityRow),
}

impl RawRow {
  pub fn read(series: Series, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(match series {
      Series::Generation => RawRow::Generation(RawGenerationRow::from_row(row)?),
      Series::Capacity => RawRow::Capacity(RawCapacityRow::from_row(row)?),
    })
  }

  pub fn into_record(self) -> Result<Record> {
    Ok(match self {
      RawRow::Generation(raw) => Record::Generation(raw.into_record()?),
      RawRow::Capacity(raw) => Record::Capacity(raw.into_record()?),
    })
  }
}

/// Raw strings read from a `solar_revision_log` row.
pub struct RawRevision {
  pub revision_id:  String,
  pub table_name:   String,
  pub period_year:  i64,
  pub period_month: i64,
  pub field_name:   String,
  pub old_value:    Option<String>,
  pub new_value:    Option<String>,
  pub reason:       String,
  pub created_at:   String,
}

impl RawRevision {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      revision_id:  row.get(0)?,
      table_name:   row.get(1)?,
      period_year:  row.get(2)?,
      period_month: row.get(3)?,
      field_name:   row.get(4)?,
      old_value:    row.get(5)?,
      new_value:    row.get(6)?,
      reason:       row.get(7)?,
      created_at:   row.get(8)?,
    })
  }

  pub fn into_entry(self) -> Result<RevisionEntry> {
    Ok(RevisionEntry {
      revision_id: decode_uuid(&self.revision_id)?,
      series:      series_for_table(&self.table_name)?,
      period:      decode_period(self.period_year, self.period_month)?,
      field:       self.field_name,
      old_value:   self.old_value,
      new_value:   self.new_value,
      reason:      self.reason,
      recorded_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `bulletin_drafts` row.
pub struct RawDraft {
  pub draft_id:     String,
  pub kind:         String,
  pub period_year:  i64,
  pub period_month: i64,
  pub title:        String,
  pub created_at:   String,
}

impl RawDraft {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      draft_id:     row.get(0)?,
      kind:         row.get(1)?,
      period_year:  row.get(2)?,
      period_month: row.get(3)?,
      title:        row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_draft(self) -> Result<BulletinDraft> {
    Ok(BulletinDraft {
      draft_id:   decode_uuid(&self.draft_id)?,
      kind:       Series::parse(&self.kind)?,
      period:     decode_period(self.period_year, self.period_month)?,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn table_names_round_trip() {
    for series in Series::ALL {
      assert_eq!(series_for_table(table_for(series)).unwrap(), series);
    }
    assert!(series_for_table("facts").is_err());
  }

  #[test]
  fn period_columns_are_validated() {
    assert!(decode_period(2024, 13).is_err());
    assert!(decode_period(2024, -1).is_err());
    assert_eq!(decode_period(2024, 2).unwrap(), Period::new(2024, 2).unwrap());
  }
}
