//! Read-only handlers for the series and the revision log.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/generation` | `?limit=N&order=asc\|desc`, default 24 most recent |
//! | `GET`  | `/generation/{year}/{month}` | 404 if absent |
//! | `GET`  | `/capacity` | as above |
//! | `GET`  | `/capacity/{year}/{month}` | 404 if absent |
//! | `GET`  | `/revisions/{series}/{year}/{month}` | oldest first |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use solar_core::{
  Period,
  record::{CapacityRecord, GenerationRecord, Record, RevisionEntry, Series},
  store::{Direction, PeriodStore},
};
use solar_ingest::{drafts::DraftSink, export::Exporter};

use crate::{AppState, error::ApiError};

pub const DEFAULT_LIMIT: usize = 24;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
  Asc,
  #[default]
  Desc,
}

impl From<Order> for Direction {
  fn from(order: Order) -> Self {
    match order {
      Order::Asc => Direction::Ascending,
      Order::Desc => Direction::Descending,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
  #[serde(default)]
  pub order: Order,
}

async fn list<S: PeriodStore>(
  store: &S,
  series: Series,
  params: ListParams,
) -> Result<Vec<Record>, ApiError> {
  store
    .get_ordered(series, params.limit.unwrap_or(DEFAULT_LIMIT), params.order.into())
    .await
    .map_err(ApiError::store)
}

async fn get_one<S: PeriodStore>(
  store: &S,
  series: Series,
  year: i32,
  month: u32,
) -> Result<Record, ApiError> {
  let period = Period::new(year, month)?;
  store
    .get(series, period)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no {series} data for {period}")))
}

// ─── Generation ──────────────────────────────────────────────────────────────

/// `GET /generation`
pub async fn list_generation<S: PeriodStore, E: Exporter, D: DraftSink>(
  State(state): State<AppState<S, E, D>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<GenerationRecord>>, ApiError> {
  let rows = list(state.ingestor.store(), Series::Generation, params).await?;
  Ok(Json(rows.into_iter().filter_map(Record::into_generation).collect()))
}

/// `GET /generation/{year}/{month}`
pub async fn get_generation<S: PeriodStore, E: Exporter, D: DraftSink>(
  State(state): State<AppState<S, E, D>>,
  Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<GenerationRecord>, ApiError> {
  get_one(state.ingestor.store(), Series::Generation, year, month)
    .await?
    .into_generation()
    .map(Json)
    .ok_or_else(|| ApiError::Internal("store returned a capacity row".into()))
}

// ─── Capacity ────────────────────────────────────────────────────────────────

/// `GET /capacity`
pub async fn list_capacity<S: PeriodStore, E: Exporter, D: DraftSink>(
  State(state): State<AppState<S, E, D>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CapacityRecord>>, ApiError> {
  let rows = list(state.ingestor.store(), Series::Capacity, params).await?;
  Ok(Json(rows.into_iter().filter_map(Record::into_capacity).collect()))
}

/// `GET /capacity/{year}/{month}`
pub async fn get_capacity<S: PeriodStore, E: Exporter, D: DraftSink>(
  State(state): State<AppState<S, E, D>>,
  Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<CapacityRecord>, ApiError> {
  get_one(state.ingestor.store(), Series::Capacity, year, month)
    .await?
    .into_capacity()
    .map(Json)
    .ok_or_else(|| ApiError::Internal("store returned a generation row".into()))
}

// ─── Revisions ───────────────────────────────────────────────────────────────

/// `GET /revisions/{series}/{year}/{month}`
pub async fn revisions<S: PeriodStore, E: Exporter, D: DraftSink>(
  State(state): State<AppState<S, E, D>>,
  Path((series, year, month)): Path<(String, i32, u32)>,
) -> Result<Json<Vec<RevisionEntry>>, ApiError> {
  let series = Series::parse(&series)?;
  let period = Period::new(year, month)?;
  let entries = state
    .ingestor
    .store()
    .revisions(series, period)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entries))
}
