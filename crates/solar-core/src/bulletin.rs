//! Bulletin drafts and their key-value metadata.
//!
//! After a period is persisted, one draft bulletin per series is ensured for
//! it. Drafts are unique per (kind, period), so ensuring twice is a no-op.
//! Descriptive fields live in a single key-value metadata interface rather
//! than in columns.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Period, record::Series};

// ─── Metadata keys ───────────────────────────────────────────────────────────

pub const META_PERIOD_YEAR: &str = "period_year";
pub const META_PERIOD_MONTH: &str = "period_month";
/// Last calendar day covered by the bulletin, `YYYY-MM-DD`.
pub const META_DATA_THROUGH: &str = "data_through";
pub const META_PUBLISHED_DATE: &str = "published_date";
/// `"generation"` or `"capacity"`.
pub const META_BULLETIN_TYPE: &str = "bulletin_type";

// ─── Draft ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinDraft {
  pub draft_id:   Uuid,
  pub kind:       Series,
  pub period:     Period,
  pub title:      String,
  pub created_at: DateTime<Utc>,
}

/// Title used for a freshly created draft.
pub fn draft_title(kind: Series, period: Period) -> String {
  match kind {
    Series::Generation => {
      format!("Solar Generation Monthly Index — {}", period.label())
    }
    Series::Capacity => {
      format!("Installed Solar Capacity Monthly Index — {}", period.label())
    }
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Storage for bulletin drafts.
pub trait DraftStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Return the draft for `(kind, period)`, creating it with `title` if none
  /// exists. The flag is `true` when a new draft was created.
  fn ensure_draft(
    &self,
    kind: Series,
    period: Period,
    title: String,
  ) -> impl Future<Output = Result<(BulletinDraft, bool), Self::Error>> + Send + '_;

  fn get_draft(
    &self,
    kind: Series,
    period: Period,
  ) -> impl Future<Output = Result<Option<BulletinDraft>, Self::Error>> + Send + '_;

  /// All drafts, ordered by period then kind.
  fn list_drafts(
    &self,
  ) -> impl Future<Output = Result<Vec<BulletinDraft>, Self::Error>> + Send + '_;
}

/// Key-value metadata attached to a draft.
pub trait MetadataStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Set (or overwrite) one key.
  fn set_meta<'a>(
    &'a self,
    draft_id: Uuid,
    key: &'a str,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get_meta<'a>(
    &'a self,
    draft_id: Uuid,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn titles_name_the_month() {
    let period = Period::new(2024, 3).unwrap();
    assert_eq!(
      draft_title(Series::Generation, period),
      "Solar Generation Monthly Index — March 2024"
    );
    assert_eq!(
      draft_title(Series::Capacity, period),
      "Installed Solar Capacity Monthly Index — March 2024"
    );
  }
}
