//! Operator endpoints. All require HTTP Basic auth.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/ingest` | Body: `{"year":2024,"month":3,"generation_gwh":…,"capacity_gw":…}`; 201 or 422 |
//! | `POST` | `/export` | Regenerate the master CSVs |
//! | `GET`  | `/log` | Activity log lines, oldest first |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use solar_core::{Period, record::DataSource, store::PeriodStore};
use solar_ingest::{FailureKind, drafts::DraftSink, export::Exporter};

use crate::{AppState, auth::Operator, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub year:           i32,
  pub month:          u32,
  pub generation_gwh: Option<f64>,
  pub capacity_gw:    Option<f64>,
  #[serde(default)]
  pub source:         DataSource,
}

/// `POST /ingest`
pub async fn ingest<S: PeriodStore, E: Exporter, D: DraftSink>(
  operator: Operator,
  State(state): State<AppState<S, E, D>>,
  Json(body): Json<IngestBody>,
) -> Result<impl IntoResponse, ApiError> {
  let period = Period::new(body.year, body.month)?;
  tracing::info!(operator = %operator.username, %period, source = %body.source, "manual ingest");

  let report = state
    .ingestor
    .ingest_period(period, body.generation_gwh, body.capacity_gw, body.source)
    .await
    .map_err(|err| match err.kind {
      FailureKind::Validation(e) => ApiError::Unprocessable(e.to_string()),
      other => ApiError::Internal(format!("{} stage failed: {other}", err.stage)),
    })?;

  Ok((StatusCode::CREATED, Json(report)))
}

/// `POST /export`
pub async fn export<S: PeriodStore, E: Exporter, D: DraftSink>(
  operator: Operator,
  State(state): State<AppState<S, E, D>>,
) -> Result<impl IntoResponse, ApiError> {
  tracing::info!(operator = %operator.username, "CSV regeneration requested");
  state
    .ingestor
    .regenerate_exports()
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;
  Ok(Json(json!({ "message": "Master CSVs regenerated." })))
}

/// `GET /log`
pub async fn activity_log<S: PeriodStore, E: Exporter, D: DraftSink>(
  _operator: Operator,
  State(state): State<AppState<S, E, D>>,
) -> Json<Vec<String>> {
  Json(state.ingestor.activity().lines())
}
