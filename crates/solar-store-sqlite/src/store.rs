//! [`SqliteStore`]: the SQLite implementation of [`PeriodStore`],
//! [`DraftStore`] and [`MetadataStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use solar_core::{
  Period,
  bulletin::{BulletinDraft, DraftStore, MetadataStore},
  record::{DerivedMetrics, NewReading, Record, RevisionEntry, Series},
  store::{Direction, PeriodStore, format_revision_value},
};

use crate::{
  Result,
  encode::{
    RawDraft, RawRevision, RawRow, columns_for, encode_dt, encode_uuid,
    table_for,
  },
  schema::SCHEMA,
};

const DRAFT_COLUMNS: &str =
  "draft_id, kind, period_year, period_month, title, created_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A period store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `SELECT <columns> FROM <series table> <tail>` and decode every row.
  async fn select(
    &self,
    series: Series,
    tail: &'static str,
    params: Vec<i64>,
  ) -> Result<Vec<Record>> {
    let sql = format!(
      "SELECT {} FROM {} {tail}",
      columns_for(series),
      table_for(series)
    );

    let raws: Vec<RawRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            RawRow::read(series, row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRow::into_record).collect()
  }
}

/// `LIMIT` value for SQLite; a negative limit means "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
  limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

// ─── PeriodStore impl ────────────────────────────────────────────────────────

impl PeriodStore for SqliteStore {
  type Error = crate::Error;

  async fn get(&self, series: Series, period: Period) -> Result<Option<Record>> {
    let mut rows = self
      .select(
        series,
        "WHERE period_year = ?1 AND period_month = ?2",
        vec![i64::from(period.year()), i64::from(period.month())],
      )
      .await?;
    Ok(rows.pop())
  }

  async fn get_ordered(
    &self,
    series: Series,
    limit: usize,
    direction: Direction,
  ) -> Result<Vec<Record>> {
    let tail = match direction {
      Direction::Ascending => "ORDER BY period_year ASC, period_month ASC LIMIT ?1",
      Direction::Descending => {
        "ORDER BY period_year DESC, period_month DESC LIMIT ?1"
      }
    };
    self.select(series, tail, vec![sql_limit(Some(limit))]).await
  }

  async fn get_all(&self, series: Series) -> Result<Vec<Record>> {
    self
      .select(series, "ORDER BY period_year ASC, period_month ASC", vec![])
      .await
  }

  async fn get_before(
    &self,
    series: Series,
    period: Period,
    limit: Option<usize>,
  ) -> Result<Vec<Record>> {
    self
      .select(
        series,
        "WHERE (period_year * 100 + period_month) < ?1
         ORDER BY period_year DESC, period_month DESC
         LIMIT ?2",
        vec![period.key(), sql_limit(limit)],
      )
      .await
  }

  async fn upsert(&self, reading: NewReading) -> Result<Record> {
    let series = reading.series();
    let year = i64::from(reading.period.year());
    let month = i64::from(reading.period.month());
    let value = reading.value;
    let metrics = reading.metrics;
    let source = reading.source.to_string();
    let now = encode_dt(Utc::now());
    let revision_id = encode_uuid(Uuid::new_v4());

    let raw: RawRow = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let table = table_for(series);
        let field = series.raw_field();

        let old: Option<f64> = tx
          .query_row(
            &format!(
              "SELECT {field} FROM {table}
               WHERE period_year = ?1 AND period_month = ?2"
            ),
            rusqlite::params![year, month],
            |r| r.get(0),
          )
          .optional()?;

        match metrics {
          DerivedMetrics::Generation(m) => {
            tx.execute(
              "INSERT INTO solar_generation_data
                 (period_year, period_month, generation_gwh, mom_pct, yoy_pct,
                  rolling_12m_gwh, capacity_factor_pct, momentum_score,
                  data_source, is_revised, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?10)
               ON CONFLICT (period_year, period_month) DO UPDATE SET
                 generation_gwh      = excluded.generation_gwh,
                 mom_pct             = excluded.mom_pct,
                 yoy_pct             = excluded.yoy_pct,
                 rolling_12m_gwh     = excluded.rolling_12m_gwh,
                 capacity_factor_pct = excluded.capacity_factor_pct,
                 momentum_score      = excluded.momentum_score,
                 data_source         = excluded.data_source,
                 is_revised          = 1,
                 updated_at          = excluded.updated_at",
              rusqlite::params![
                year,
                month,
                value,
                m.mom_pct,
                m.yoy_pct,
                m.rolling_12m_gwh,
                m.capacity_factor_pct,
                m.momentum_score,
                source,
                now,
              ],
            )?;
          }
          DerivedMetrics::Capacity(m) => {
            tx.execute(
              "INSERT INTO solar_capacity_data
                 (period_year, period_month, capacity_gw, monthly_addition_gw,
                  rolling_12m_added_gw, build_pace_gw_yr,
                  data_source, is_revised, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
               ON CONFLICT (period_year, period_month) DO UPDATE SET
                 capacity_gw          = excluded.capacity_gw,
                 monthly_addition_gw  = excluded.monthly_addition_gw,
                 rolling_12m_added_gw = excluded.rolling_12m_added_gw,
                 build_pace_gw_yr     = excluded.build_pace_gw_yr,
                 data_source          = excluded.data_source,
                 is_revised           = 1,
                 updated_at           = excluded.updated_at",
              rusqlite::params![
                year,
                month,
                value,
                m.monthly_addition_gw,
                m.rolling_12m_added_gw,
                m.build_pace_gw_yr,
                source,
                now,
              ],
            )?;
          }
        }

        if let Some(old) = old
          && old != value
        {
          tx.execute(
            "INSERT INTO solar_revision_log
               (revision_id, table_name, period_year, period_month, field_name,
                old_value, new_value, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
              revision_id,
              table,
              year,
              month,
              field,
              format_revision_value(series, old),
              format_revision_value(series, value),
              format!("upsert from {source}"),
              now,
            ],
          )?;
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM {table} WHERE period_year = ?1 AND period_month = ?2",
            columns_for(series)
          ),
          rusqlite::params![year, month],
          |row| RawRow::read(series, row),
        )?;

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let record = raw.into_record()?;
    tracing::debug!(
      %series,
      period = %record.period(),
      revised = record.is_revised(),
      "upserted row"
    );
    Ok(record)
  }

  async fn revisions(
    &self,
    series: Series,
    period: Period,
  ) -> Result<Vec<RevisionEntry>> {
    let table = table_for(series);
    let year = i64::from(period.year());
    let month = i64::from(period.month());

    let raws: Vec<RawRevision> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT revision_id, table_name, period_year, period_month, field_name,
                  old_value, new_value, reason, created_at
           FROM solar_revision_log
           WHERE table_name = ?1 AND period_year = ?2 AND period_month = ?3
           ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![table, year, month], RawRevision::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRevision::into_entry).collect()
  }
}

// ─── Drafts and metadata ─────────────────────────────────────────────────────

impl DraftStore for SqliteStore {
  type Error = crate::Error;

  async fn ensure_draft(
    &self,
    kind: Series,
    period: Period,
    title: String,
  ) -> Result<(BulletinDraft, bool)> {
    let kind_str = kind.to_string();
    let year = i64::from(period.year());
    let month = i64::from(period.month());
    let draft_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let (raw, inserted): (RawDraft, usize) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO bulletin_drafts
             (draft_id, kind, period_year, period_month, title, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (kind, period_year, period_month) DO NOTHING",
          rusqlite::params![draft_id, kind_str, year, month, title, now],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {DRAFT_COLUMNS} FROM bulletin_drafts
             WHERE kind = ?1 AND period_year = ?2 AND period_month = ?3"
          ),
          rusqlite::params![kind_str, year, month],
          RawDraft::from_row,
        )?;
        tx.commit()?;
        Ok((raw, inserted))
      })
      .await?;

    Ok((raw.into_draft()?, inserted > 0))
  }

  async fn get_draft(
    &self,
    kind: Series,
    period: Period,
  ) -> Result<Option<BulletinDraft>> {
    let kind_str = kind.to_string();
    let year = i64::from(period.year());
    let month = i64::from(period.month());

    let raw: Option<RawDraft> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {DRAFT_COLUMNS} FROM bulletin_drafts
                 WHERE kind = ?1 AND period_year = ?2 AND period_month = ?3"
              ),
              rusqlite::params![kind_str, year, month],
              RawDraft::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDraft::into_draft).transpose()
  }

  async fn list_drafts(&self) -> Result<Vec<BulletinDraft>> {
    let raws: Vec<RawDraft> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DRAFT_COLUMNS} FROM bulletin_drafts
           ORDER BY period_year ASC, period_month ASC, kind ASC"
        ))?;
        let rows = stmt
          .query_map([], RawDraft::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDraft::into_draft).collect()
  }
}

impl MetadataStore for SqliteStore {
  type Error = crate::Error;

  async fn set_meta(&self, draft_id: Uuid, key: &str, value: String) -> Result<()> {
    let id_str = encode_uuid(draft_id);
    let key = key.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO bulletin_meta (draft_id, meta_key, meta_value)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (draft_id, meta_key) DO UPDATE SET
             meta_value = excluded.meta_value",
          rusqlite::params![id_str, key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_meta(&self, draft_id: Uuid, key: &str) -> Result<Option<String>> {
    let id_str = encode_uuid(draft_id);
    let key = key.to_owned();

    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT meta_value FROM bulletin_meta
               WHERE draft_id = ?1 AND meta_key = ?2",
              rusqlite::params![id_str, key],
              |r| r.get::<_, String>(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }
}
