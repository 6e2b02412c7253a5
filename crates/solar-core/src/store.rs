//! The `PeriodStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `solar-store-sqlite`,
//! or [`crate::memory::MemoryStore`]). The validator, the metrics engine and
//! the orchestrator depend on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  Period,
  record::{NewReading, Record, RevisionEntry, Series},
};

/// Sort order for [`PeriodStore::get_ordered`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
  Ascending,
  /// Most recent period first.
  #[default]
  Descending,
}

/// Abstraction over a keyed time-series table holding the generation and
/// capacity series.
///
/// The store assumes a single logical writer: one orchestrator instance at a
/// time. Upserts are last-writer-wins and carry no revision counter. Running
/// several orchestrators against one store would need a per-period advisory
/// lock or a conditional write on top of this contract.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PeriodStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Point lookup. Returns `None` if the series has no row for `period`.
  fn get(
    &self,
    series: Series,
    period: Period,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// Up to `limit` rows ordered by period in `direction`.
  fn get_ordered(
    &self,
    series: Series,
    limit: usize,
    direction: Direction,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Every row of the series, ascending by period.
  fn get_all(
    &self,
    series: Series,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Rows strictly before `period`, most recent first, optionally limited.
  fn get_before(
    &self,
    series: Series,
    period: Period,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// Insert or update the row for `reading.period` in the series implied by
  /// `reading.metrics`.
  ///
  /// A fresh row gets `is_revised = false`. An existing row is updated in
  /// place: `is_revised` is forced to `true`, `created_at` is preserved, and
  /// a [`RevisionEntry`] is appended for a changed raw value.
  fn upsert(
    &self,
    reading: NewReading,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// The append-only revision log for one row, oldest first.
  fn revisions(
    &self,
    series: Series,
    period: Period,
  ) -> impl Future<Output = Result<Vec<RevisionEntry>, Self::Error>> + Send + '_;
}

/// Render a raw value for the revision log.
pub fn format_revision_value(series: Series, value: f64) -> String {
  match series {
    Series::Generation => format!("{value:.2}"),
    Series::Capacity => format!("{value:.3}"),
  }
}
