//! JSON API for the Solar Index Spain pipeline.
//!
//! Read endpoints expose both series and the revision log. Write endpoints
//! (ingest, CSV regeneration, activity log) sit behind HTTP Basic auth.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", solar_api::api_router(state))
//! ```

pub mod auth;
pub mod error;
pub mod ingest;
pub mod records;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use solar_core::store::PeriodStore;
use solar_ingest::{Ingestor, drafts::DraftSink, export::Exporter};

pub use auth::AuthConfig;
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, E, D> {
  pub ingestor: Arc<Ingestor<S, E, D>>,
  pub auth:     Arc<AuthConfig>,
}

impl<S, E, D> Clone for AppState<S, E, D> {
  fn clone(&self) -> Self {
    Self { ingestor: Arc::clone(&self.ingestor), auth: Arc::clone(&self.auth) }
  }
}

impl<S, E, D> AppState<S, E, D> {
  pub fn new(ingestor: Ingestor<S, E, D>, auth: AuthConfig) -> Self {
    Self { ingestor: Arc::new(ingestor), auth: Arc::new(auth) }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, E, D>(state: AppState<S, E, D>) -> Router<()>
where
  S: PeriodStore + 'static,
  E: Exporter + 'static,
  D: DraftSink + 'static,
{
  Router::new()
    // Series
    .route("/generation", get(records::list_generation::<S, E, D>))
    .route("/generation/{year}/{month}", get(records::get_generation::<S, E, D>))
    .route("/capacity", get(records::list_capacity::<S, E, D>))
    .route("/capacity/{year}/{month}", get(records::get_capacity::<S, E, D>))
    .route("/revisions/{series}/{year}/{month}", get(records::revisions::<S, E, D>))
    // Operator actions
    .route("/ingest", post(ingest::ingest::<S, E, D>))
    .route("/export", post(ingest::export::<S, E, D>))
    .route("/log", get(ingest::activity_log::<S, E, D>))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use solar_core::{
    Period,
    memory::MemoryStore,
    record::{CapacityMetrics, DataSource, GenerationMetrics, NewReading},
  };
  use solar_ingest::{ActivityLog, drafts::BulletinDrafts, export::CsvExporter};
  use tower::ServiceExt as _;

  use super::*;

  type TestState = AppState<MemoryStore, CsvExporter, BulletinDrafts<MemoryStore>>;

  fn make_state(store: &MemoryStore, csv_dir: &std::path::Path) -> TestState {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(b"secret", &salt)
      .unwrap()
      .to_string();

    AppState::new(
      Ingestor::new(
        store.clone(),
        CsvExporter::new(csv_dir),
        BulletinDrafts::new(store.clone()),
        ActivityLog::new(),
      ),
      AuthConfig { username: "admin".into(), password_hash: hash },
    )
  }

  fn auth_header() -> String { format!("Basic {}", B64.encode("admin:secret")) }

  async fn send(state: TestState, req: Request<Body>) -> (StatusCode, Value) {
    let resp = api_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
  }

  fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
  }

  fn post_json(uri: &str, body: Value, auth: bool) -> Request<Body> {
    let mut builder = Request::builder()
      .method("POST")
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if auth {
      builder = builder.header(header::AUTHORIZATION, auth_header());
    }
    builder.body(Body::from(body.to_string())).unwrap()
  }

  async fn seed(store: &MemoryStore) {
    for (month, gwh, gw) in [(1, 2000.0, 30.0), (2, 2300.0, 30.4), (3, 2900.0, 30.9)] {
      let period = Period::new(2024, month).unwrap();
      store
        .upsert(NewReading::generation(period, gwh, GenerationMetrics::default(), DataSource::Manual))
        .await
        .unwrap();
      store
        .upsert(NewReading::capacity(period, gw, CapacityMetrics::default(), DataSource::Manual))
        .await
        .unwrap();
    }
  }

  // ── Reads ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn list_defaults_to_most_recent_first() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    seed(&store).await;
    let (status, body) = send(make_state(&store, csv.path()), get("/generation")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["period"], json!({ "year": 2024, "month": 3 }));
    assert_eq!(rows[0]["generation_gwh"], json!(2900.0));
  }

  #[tokio::test]
  async fn list_honours_limit_and_order() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    seed(&store).await;
    let (status, body) =
      send(make_state(&store, csv.path()), get("/capacity?limit=2&order=asc")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["capacity_gw"], json!(30.0));
    assert_eq!(rows[1]["capacity_gw"], json!(30.4));
  }

  #[tokio::test]
  async fn get_one_and_missing() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    seed(&store).await;
    let (status, body) = send(make_state(&store, csv.path()), get("/capacity/2024/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity_gw"], json!(30.4));

    let (status, body) = send(make_state(&store, csv.path()), get("/generation/2024/7")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("2024-07"));

    let (status, _) = send(make_state(&store, csv.path()), get("/generation/2024/13")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn revisions_endpoint() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    seed(&store).await;
    let period = Period::new(2024, 2).unwrap();
    store
      .upsert(NewReading::generation(period, 2350.0, GenerationMetrics::default(), DataSource::Manual))
      .await
      .unwrap();

    let (status, body) = send(make_state(&store, csv.path()), get("/revisions/generation/2024/2")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["old_value"], json!("2300.00"));

    let (status, _) = send(make_state(&store, csv.path()), get("/revisions/wind/2024/2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Writes ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn ingest_requires_auth() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    let req = post_json(
      "/ingest",
      json!({ "year": 2024, "month": 1, "generation_gwh": 2000.0, "capacity_gw": 30.0 }),
      false,
    );
    let resp = api_router(make_state(&store, csv.path())).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    assert!(store.get_all(solar_core::record::Series::Generation).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn wrong_password_is_rejected() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    let req = Request::builder()
      .uri("/log")
      .header(header::AUTHORIZATION, format!("Basic {}", B64.encode("admin:nope")))
      .body(Body::empty())
      .unwrap();
    let (status, body) = send(make_state(&store, csv.path()), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn ingest_persists_and_returns_report() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    let state = make_state(&store, csv.path());
    let (status, body) = send(
      state.clone(),
      post_json(
        "/ingest",
        json!({ "year": 2024, "month": 1, "generation_gwh": 2000.0, "capacity_gw": 30.0 }),
        true,
      ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["generation"]["generation_gwh"], json!(2000.0));
    assert_eq!(body["generation"]["data_source"], json!("manual"));
    assert_eq!(body["warnings"], json!([]));

    let (status, body) = send(
      state,
      Request::builder()
        .uri("/log")
        .header(header::AUTHORIZATION, auth_header())
        .body(Body::empty())
        .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let lines = body.as_array().unwrap();
    assert!(lines.last().unwrap().as_str().unwrap().contains("[OK] [ingest]"));
  }

  #[tokio::test]
  async fn ingest_validation_failure_is_422() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    let (status, body) = send(
      make_state(&store, csv.path()),
      post_json(
        "/ingest",
        json!({ "year": 2024, "month": 1, "generation_gwh": 300.0, "capacity_gw": 30.0 }),
        true,
      ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("outside expected range"));
  }

  #[tokio::test]
  async fn missing_value_is_422() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    let (status, _) = send(
      make_state(&store, csv.path()),
      post_json("/ingest", json!({ "year": 2024, "month": 1, "capacity_gw": 30.0 }), true),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[tokio::test]
  async fn export_regenerates_master_files() {
    let store = MemoryStore::new();
    let csv = tempfile::tempdir().unwrap();
    seed(&store).await;
    let state = make_state(&store, csv.path());
    let (status, body) = send(state, post_json("/export", json!({}), true)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Master CSVs regenerated."));

    let master =
      std::fs::read_to_string(csv.path().join("solar-generation-spain-master.csv")).unwrap();
    assert_eq!(master.lines().count(), 4);
    assert!(csv.path().join("solar-capacity-spain-master.csv").exists());
  }
}
