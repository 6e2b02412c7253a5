//! Error types for `solar-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid period {year}-{month}: year must be >= 2021, month 1-12")]
  InvalidPeriod { year: i32, month: u32 },

  #[error("cannot parse period from {0:?} (expected YYYY-MM)")]
  ParsePeriod(String),

  #[error("unknown series: {0:?}")]
  UnknownSeries(String),

  #[error("unknown data source: {0:?}")]
  UnknownDataSource(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
