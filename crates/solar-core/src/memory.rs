//! [`MemoryStore`]: an in-process implementation of the store traits.
//!
//! Holds everything in ordered maps behind a mutex. Used by the test suites of
//! every crate above this one and for dry runs that must not touch disk.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Period,
  bulletin::{BulletinDraft, DraftStore, MetadataStore},
  record::{
    CapacityRecord, DerivedMetrics, GenerationRecord, NewReading, Record,
    RevisionEntry, Series,
  },
  store::{Direction, PeriodStore, format_revision_value},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("memory store lock poisoned")]
  Poisoned,
}

#[derive(Default)]
struct Tables {
  generation: BTreeMap<Period, GenerationRecord>,
  capacity:   BTreeMap<Period, CapacityRecord>,
  revisions:  Vec<RevisionEntry>,
  drafts:     BTreeMap<(Period, Series), BulletinDraft>,
  meta:       HashMap<(Uuid, String), String>,
}

impl Tables {
  fn rows(&self, series: Series) -> Vec<Record> {
    match series {
      Series::Generation => {
        self.generation.values().cloned().map(Record::Generation).collect()
      }
      Series::Capacity => self.capacity.values().cloned().map(Record::Capacity).collect(),
    }
  }
}

/// An in-memory period store. Cloning is cheap and clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> Result<MutexGuard<'_, Tables>, MemoryError> {
    self.inner.lock().map_err(|_| MemoryError::Poisoned)
  }
}

// ─── PeriodStore impl ────────────────────────────────────────────────────────

impl PeriodStore for MemoryStore {
  type Error = MemoryError;

  async fn get(&self, series: Series, period: Period) -> Result<Option<Record>, MemoryError> {
    let tables = self.lock()?;
    Ok(match series {
      Series::Generation => tables.generation.get(&period).cloned().map(Record::Generation),
      Series::Capacity => tables.capacity.get(&period).cloned().map(Record::Capacity),
    })
  }

  async fn get_ordered(
    &self,
    series: Series,
    limit: usize,
    direction: Direction,
  ) -> Result<Vec<Record>, MemoryError> {
    let mut rows = self.lock()?.rows(series);
    if direction == Direction::Descending {
      rows.reverse();
    }
    rows.truncate(limit);
    Ok(rows)
  }

  async fn get_all(&self, series: Series) -> Result<Vec<Record>, MemoryError> {
    Ok(self.lock()?.rows(series))
  }

  async fn get_before(
    &self,
    series: Series,
    period: Period,
    limit: Option<usize>,
  ) -> Result<Vec<Record>, MemoryError> {
    let mut rows: Vec<Record> = self
      .lock()?
      .rows(series)
      .into_iter()
      .filter(|r| r.period() < period)
      .collect();
    rows.reverse();
    if let Some(limit) = limit {
      rows.truncate(limit);
    }
    Ok(rows)
  }

  async fn upsert(&self, reading: NewReading) -> Result<Record, MemoryError> {
    let mut tables = self.lock()?;
    let now = Utc::now();
    let series = reading.series();

    let previous = match series {
      Series::Generation => tables
        .generation
        .get(&reading.period)
        .map(|r| (r.generation_gwh, r.created_at)),
      Series::Capacity => tables
        .capacity
        .get(&reading.period)
        .map(|r| (r.capacity_gw, r.created_at)),
    };
    let is_revised = previous.is_some();
    let created_at = previous.map_or(now, |(_, at)| at);

    if let Some((old, _)) = previous
      && old != reading.value
    {
      tables.revisions.push(RevisionEntry {
        revision_id: Uuid::new_v4(),
        series,
        period:      reading.period,
        field:       series.raw_field().to_owned(),
        old_value:   Some(format_revision_value(series, old)),
        new_value:   Some(format_revision_value(series, reading.value)),
        reason:      format!("upsert from {}", reading.source),
        recorded_at: now,
      });
    }

    let record = match reading.metrics {
      DerivedMetrics::Generation(metrics) => {
        let row = GenerationRecord {
          period: reading.period,
          generation_gwh: reading.value,
          metrics,
          data_source: reading.source,
          is_revised,
          created_at,
          updated_at: now,
        };
        tables.generation.insert(reading.period, row.clone());
        Record::Generation(row)
      }
      DerivedMetrics::Capacity(metrics) => {
        let row = CapacityRecord {
          period: reading.period,
          capacity_gw: reading.value,
          metrics,
          data_source: reading.source,
          is_revised,
          created_at,
          updated_at: now,
        };
        tables.capacity.insert(reading.period, row.clone());
        Record::Capacity(row)
      }
    };

    Ok(record)
  }

  async fn revisions(
    &self,
    series: Series,
    period: Period,
  ) -> Result<Vec<RevisionEntry>, MemoryError> {
    Ok(
      self
        .lock()?
        .revisions
        .iter()
        .filter(|e| e.series == series && e.period == period)
        .cloned()
        .collect(),
    )
  }
}

// ─── Drafts and metadata ─────────────────────────────────────────────────────

impl DraftStore for MemoryStore {
  type Error = MemoryError;

  async fn ensure_draft(
    &self,
    kind: Series,
    period: Period,
    title: String,
  ) -> Result<(BulletinDraft, bool), MemoryError> {
    let mut tables = self.lock()?;
    if let Some(existing) = tables.drafts.get(&(period, kind)) {
      return Ok((existing.clone(), false));
    }
    let draft = BulletinDraft {
      draft_id: Uuid::new_v4(),
      kind,
      period,
      title,
      created_at: Utc::now(),
    };
    tables.drafts.insert((period, kind), draft.clone());
    Ok((draft, true))
  }

  async fn get_draft(
    &self,
    kind: Series,
    period: Period,
  ) -> Result<Option<BulletinDraft>, MemoryError> {
    Ok(self.lock()?.drafts.get(&(period, kind)).cloned())
  }

  async fn list_drafts(&self) -> Result<Vec<BulletinDraft>, MemoryError> {
    Ok(self.lock()?.drafts.values().cloned().collect())
  }
}

impl MetadataStore for MemoryStore {
  type Error = MemoryError;

  async fn set_meta(&self, draft_id: Uuid, key: &str, value: String) -> Result<(), MemoryError> {
    self.lock()?.meta.insert((draft_id, key.to_owned()), value);
    Ok(())
  }

  async fn get_meta(&self, draft_id: Uuid, key: &str) -> Result<Option<String>, MemoryError> {
    Ok(self.lock()?.meta.get(&(draft_id, key.to_owned())).cloned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::record::{CapacityMetrics, DataSource, GenerationMetrics};

  fn p(year: i32, month: u32) -> Period { Period::new(year, month).unwrap() }

  fn gen_reading(period: Period, gwh: f64) -> NewReading {
    NewReading::generation(period, gwh, GenerationMetrics::default(), DataSource::Manual)
  }

  #[tokio::test]
  async fn upsert_sets_revision_flag_on_second_write() {
    let store = MemoryStore::new();
    let first = store.upsert(gen_reading(p(2024, 1), 2000.0)).await.unwrap();
    assert!(!first.is_revised());

    let second = store.upsert(gen_reading(p(2024, 1), 2100.0)).await.unwrap();
    assert!(second.is_revised());
    assert_eq!(second.raw_value(), 2100.0);

    let first = first.into_generation().unwrap();
    let second = second.into_generation().unwrap();
    assert_eq!(first.created_at, second.created_at);

    let log = store.revisions(Series::Generation, p(2024, 1)).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].old_value.as_deref(), Some("2000.00"));
    assert_eq!(log[0].new_value.as_deref(), Some("2100.00"));
  }

  #[tokio::test]
  async fn ordered_reads() {
    let store = MemoryStore::new();
    for (m, v) in [(3, 3.0), (1, 1.0), (2, 2.0)] {
      store
        .upsert(NewReading::capacity(p(2024, m), 20.0 + v, CapacityMetrics::default(), DataSource::Manual))
        .await
        .unwrap();
    }
    let desc = store.get_ordered(Series::Capacity, 2, Direction::Descending).await.unwrap();
    assert_eq!(desc.iter().map(Record::period).collect::<Vec<_>>(), vec![p(2024, 3), p(2024, 2)]);

    let all = store.get_all(Series::Capacity).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].period(), p(2024, 1));

    let before = store.get_before(Series::Capacity, p(2024, 3), None).await.unwrap();
    assert_eq!(before.iter().map(Record::period).collect::<Vec<_>>(), vec![p(2024, 2), p(2024, 1)]);

    assert!(store.get_all(Series::Generation).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn drafts_are_unique_per_kind_and_period() {
    let store = MemoryStore::new();
    let (a, created_a) = store.ensure_draft(Series::Generation, p(2024, 1), "a".into()).await.unwrap();
    let (b, created_b) = store.ensure_draft(Series::Generation, p(2024, 1), "b".into()).await.unwrap();
    assert!(created_a);
    assert!(!created_b);
    assert_eq!(a.draft_id, b.draft_id);
    assert_eq!(b.title, "a");

    store.set_meta(a.draft_id, "period_year", "2024".into()).await.unwrap();
    assert_eq!(store.get_meta(a.draft_id, "period_year").await.unwrap().as_deref(), Some("2024"));
    assert_eq!(store.get_meta(a.draft_id, "missing").await.unwrap(), None);
  }

  #[tokio::test]
  async fn drafts_for_both_kinds_share_a_period() {
    let store = MemoryStore::new();
    store.ensure_draft(Series::Capacity, p(2024, 2), "c2".into()).await.unwrap();
    store.ensure_draft(Series::Generation, p(2024, 1), "g1".into()).await.unwrap();
    store.ensure_draft(Series::Capacity, p(2024, 1), "c1".into()).await.unwrap();

    let drafts = store.list_drafts().await.unwrap();
    let periods: Vec<_> = drafts.iter().map(|d| d.period).collect();
    assert_eq!(periods, vec![p(2024, 1), p(2024, 1), p(2024, 2)]);

    let generation = store.get_draft(Series::Generation, p(2024, 1)).await.unwrap().unwrap();
    let capacity = store.get_draft(Series::Capacity, p(2024, 1)).await.unwrap().unwrap();
    assert_eq!(generation.title, "g1");
    assert_eq!(capacity.title, "c1");
    assert_ne!(generation.draft_id, capacity.draft_id);
  }
}
