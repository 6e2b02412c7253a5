//! Bulletin draft collaborator.

use std::future::Future;

use chrono::Utc;
use solar_core::{
  Period,
  bulletin::{
    BulletinDraft, DraftStore, META_BULLETIN_TYPE, META_DATA_THROUGH,
    META_PERIOD_MONTH, META_PERIOD_YEAR, META_PUBLISHED_DATE, MetadataStore,
    draft_title,
  },
  record::Series,
};

use crate::error::DraftError;

/// Receives a persisted period and makes sure its bulletin drafts exist.
pub trait DraftSink: Send + Sync {
  /// Ensure one draft per series for `period`. Idempotent per (kind, period).
  fn ensure_drafts(
    &self,
    period: Period,
  ) -> impl Future<Output = Result<Vec<BulletinDraft>, DraftError>> + Send + '_;
}

/// Draft sink backed by a [`DraftStore`] that also carries the key-value
/// metadata interface.
#[derive(Debug, Clone)]
pub struct BulletinDrafts<S> {
  store: S,
}

impl<S> BulletinDrafts<S> {
  pub fn new(store: S) -> Self { Self { store } }
}

impl<S> BulletinDrafts<S>
where
  S: DraftStore + MetadataStore,
{
  async fn set(&self, draft: &BulletinDraft, key: &str, value: String) -> Result<(), DraftError> {
    self
      .store
      .set_meta(draft.draft_id, key, value)
      .await
      .map_err(|e| DraftError::Store(e.to_string()))
  }
}

impl<S> DraftSink for BulletinDrafts<S>
where
  S: DraftStore + MetadataStore,
{
  async fn ensure_drafts(&self, period: Period) -> Result<Vec<BulletinDraft>, DraftError> {
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let mut drafts = Vec::with_capacity(Series::ALL.len());

    for kind in Series::ALL {
      let (draft, created) = self
        .store
        .ensure_draft(kind, period, draft_title(kind, period))
        .await
        .map_err(|e| DraftError::Store(e.to_string()))?;

      // Metadata is refreshed even on an existing draft.
      self.set(&draft, META_PERIOD_YEAR, period.year().to_string()).await?;
      self.set(&draft, META_PERIOD_MONTH, period.month().to_string()).await?;
      self.set(&draft, META_DATA_THROUGH, period.last_day()).await?;
      self.set(&draft, META_PUBLISHED_DATE, today.clone()).await?;
      self.set(&draft, META_BULLETIN_TYPE, kind.to_string()).await?;

      tracing::debug!(%kind, %period, created, draft_id = %draft.draft_id, "ensured bulletin draft");
      drafts.push(draft);
    }

    Ok(drafts)
  }
}

#[cfg(test)]
mod tests {
  use solar_core::memory::MemoryStore;

  use super::*;

  #[tokio::test]
  async fn creates_one_draft_per_series_with_metadata() {
    let store = MemoryStore::new();
    let sink = BulletinDrafts::new(store.clone());
    let period = Period::new(2024, 2).unwrap();

    let drafts = sink.ensure_drafts(period).await.unwrap();
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0].title, "Solar Generation Monthly Index — February 2024");
    assert_eq!(drafts[1].kind, Series::Capacity);

    let cap = &drafts[1];
    let meta = |key: &'static str| {
      let store = store.clone();
      let id = cap.draft_id;
      async move { store.get_meta(id, key).await.unwrap() }
    };
    assert_eq!(meta(META_PERIOD_YEAR).await.as_deref(), Some("2024"));
    assert_eq!(meta(META_PERIOD_MONTH).await.as_deref(), Some("2"));
    assert_eq!(meta(META_DATA_THROUGH).await.as_deref(), Some("2024-02-29"));
    assert_eq!(meta(META_BULLETIN_TYPE).await.as_deref(), Some("capacity"));
    assert!(meta(META_PUBLISHED_DATE).await.is_some());
  }

  #[tokio::test]
  async fn second_call_reuses_existing_drafts() {
    let store = MemoryStore::new();
    let sink = BulletinDrafts::new(store.clone());
    let period = Period::new(2024, 5).unwrap();

    let first = sink.ensure_drafts(period).await.unwrap();
    let second = sink.ensure_drafts(period).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.list_drafts().await.unwrap().len(), 2);
  }
}
