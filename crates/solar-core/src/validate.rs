//! Plausibility gate that must pass before any write.
//!
//! Each series is validated independently against its own history. Rules run
//! in a fixed order and the first violation is reported; nothing is ever
//! corrected silently.

use thiserror::Error;

use crate::{
  Period,
  record::Series,
  store::PeriodStore,
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A rejected raw value. Carries the offending value and the threshold so an
/// operator can review it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
  #[error("{series} value is missing or non-numeric for {period}")]
  MissingValue { series: Series, period: Period },

  #[error(
    "{series} value {value} is outside expected range [{min}, {max}] for {period}"
  )]
  OutOfRange {
    series: Series,
    period: Period,
    value:  f64,
    min:    f64,
    max:    f64,
  },

  #[error(
    "generation change of {change_pct:.1}% ({previous} -> {value} GWh) exceeds \
     threshold of {threshold_pct}% for {period}"
  )]
  ImplausibleChange {
    period:        Period,
    value:         f64,
    previous:      f64,
    change_pct:    f64,
    threshold_pct: f64,
  },

  #[error(
    "capacity dropped by more than {tolerance} GW ({previous} -> {value} GW) for {period}"
  )]
  ImplausibleDecrease {
    period:    Period,
    value:     f64,
    previous:  f64,
    tolerance: f64,
  },
}

/// Either a rule violation or a failure reading history from the store.
#[derive(Debug, Error)]
pub enum ValidateFailure<E: std::error::Error + 'static> {
  #[error(transparent)]
  Invalid(#[from] ValidationError),

  #[error("store error: {0}")]
  Store(#[source] E),
}

// ─── Limits ──────────────────────────────────────────────────────────────────

/// Plausibility thresholds. `Default` holds the production bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
  pub generation_min_gwh:      f64,
  pub generation_max_gwh:      f64,
  /// Largest accepted absolute month-over-month change, percent.
  pub max_generation_change:   f64,
  pub capacity_min_gw:         f64,
  pub capacity_max_gw:         f64,
  /// Largest accepted drop versus the previous month, GW.
  pub max_capacity_decrease:   f64,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      generation_min_gwh:    500.0,
      generation_max_gwh:    8000.0,
      max_generation_change: 80.0,
      capacity_min_gw:       15.0,
      capacity_max_gw:       100.0,
      max_capacity_decrease: 0.5,
    }
  }
}

// ─── Validator ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
  limits: Limits,
}

impl Validator {
  pub fn new(limits: Limits) -> Self { Self { limits } }

  pub fn limits(&self) -> &Limits { &self.limits }

  /// Validate `raw` for `(series, period)` against the store's record for the
  /// immediately preceding period. Returns the accepted value.
  pub async fn validate<S: PeriodStore>(
    &self,
    store: &S,
    series: Series,
    period: Period,
    raw: Option<f64>,
  ) -> Result<f64, ValidateFailure<S::Error>> {
    // Range checks never need history; fail them before touching the store.
    let value = self.check_range(series, period, raw)?;

    let previous = match period.previous() {
      Some(prev) => store
        .get(series, prev)
        .await
        .map_err(ValidateFailure::Store)?
        .map(|r| r.raw_value()),
      None => None,
    };

    self.check_against_previous(series, period, value, previous)?;
    Ok(value)
  }

  /// Run every rule with an explicitly supplied previous value.
  pub fn check(
    &self,
    series: Series,
    period: Period,
    raw: Option<f64>,
    previous: Option<f64>,
  ) -> Result<f64, ValidationError> {
    let value = self.check_range(series, period, raw)?;
    self.check_against_previous(series, period, value, previous)?;
    Ok(value)
  }

  fn check_range(
    &self,
    series: Series,
    period: Period,
    raw: Option<f64>,
  ) -> Result<f64, ValidationError> {
    let value = match raw {
      Some(v) if v.is_finite() => v,
      _ => return Err(ValidationError::MissingValue { series, period }),
    };

    let (min, max) = match series {
      Series::Generation => (self.limits.generation_min_gwh, self.limits.generation_max_gwh),
      Series::Capacity => (self.limits.capacity_min_gw, self.limits.capacity_max_gw),
    };
    if value < min || value > max {
      return Err(ValidationError::OutOfRange { series, period, value, min, max });
    }
    Ok(value)
  }

  fn check_against_previous(
    &self,
    series: Series,
    period: Period,
    value: f64,
    previous: Option<f64>,
  ) -> Result<(), ValidationError> {
    let Some(previous) = previous else {
      return Ok(());
    };

    match series {
      Series::Generation => {
        // A zero previous value makes the ratio undefined; skip the rule.
        if previous == 0.0 {
          return Ok(());
        }
        let change_pct = ((value - previous) / previous * 100.0).abs();
        if change_pct > self.limits.max_generation_change {
          return Err(ValidationError::ImplausibleChange {
            period,
            value,
            previous,
            change_pct,
            threshold_pct: self.limits.max_generation_change,
          });
        }
      }
      Series::Capacity => {
        if value < previous - self.limits.max_capacity_decrease {
          return Err(ValidationError::ImplausibleDecrease {
            period,
            value,
            previous,
            tolerance: self.limits.max_capacity_decrease,
          });
        }
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    memory::MemoryStore,
    record::{CapacityMetrics, DataSource, GenerationMetrics, NewReading},
  };

  fn p(year: i32, month: u32) -> Period { Period::new(year, month).unwrap() }

  fn check(series: Series, raw: Option<f64>, previous: Option<f64>) -> Result<f64, ValidationError> {
    Validator::default().check(series, p(2024, 2), raw, previous)
  }

  // ─── Generation ────────────────────────────────────────────────────────────

  #[test]
  fn generation_missing_or_nan_is_missing_value() {
    assert!(matches!(
      check(Series::Generation, None, None),
      Err(ValidationError::MissingValue { series: Series::Generation, .. })
    ));
    assert!(matches!(
      check(Series::Generation, Some(f64::NAN), None),
      Err(ValidationError::MissingValue { .. })
    ));
  }

  #[test]
  fn generation_below_range_is_rejected() {
    let err = check(Series::Generation, Some(300.0), None).unwrap_err();
    assert_eq!(
      err,
      ValidationError::OutOfRange {
        series: Series::Generation,
        period: p(2024, 2),
        value:  300.0,
        min:    500.0,
        max:    8000.0,
      }
    );
  }

  #[test]
  fn generation_bounds_are_inclusive() {
    assert_eq!(check(Series::Generation, Some(500.0), None).unwrap(), 500.0);
    assert_eq!(check(Series::Generation, Some(8000.0), None).unwrap(), 8000.0);
    assert!(check(Series::Generation, Some(8000.01), None).is_err());
  }

  #[test]
  fn generation_large_swing_is_implausible() {
    let err = check(Series::Generation, Some(4000.0), Some(2000.0)).unwrap_err();
    assert!(matches!(
      err,
      ValidationError::ImplausibleChange { change_pct, threshold_pct, .. }
        if change_pct == 100.0 && threshold_pct == 80.0
    ));
    // Exactly 80% is still accepted.
    assert!(check(Series::Generation, Some(3600.0), Some(2000.0)).is_ok());
    // Drops count too.
    assert!(check(Series::Generation, Some(1000.0), Some(6000.0)).is_err());
  }

  #[test]
  fn generation_zero_previous_skips_change_rule() {
    assert!(check(Series::Generation, Some(4000.0), Some(0.0)).is_ok());
  }

  // ─── Capacity ──────────────────────────────────────────────────────────────

  #[test]
  fn capacity_out_of_range() {
    assert!(matches!(
      check(Series::Capacity, Some(14.9), None),
      Err(ValidationError::OutOfRange { series: Series::Capacity, .. })
    ));
    assert!(matches!(
      check(Series::Capacity, Some(100.5), None),
      Err(ValidationError::OutOfRange { .. })
    ));
  }

  #[test]
  fn capacity_drop_beyond_tolerance_is_rejected() {
    let err = check(Series::Capacity, Some(31.2), Some(32.0)).unwrap_err();
    assert!(matches!(
      err,
      ValidationError::ImplausibleDecrease { previous, value, tolerance, .. }
        if previous == 32.0 && value == 31.2 && tolerance == 0.5
    ));
    // A small dip within tolerance passes.
    assert!(check(Series::Capacity, Some(31.7), Some(32.0)).is_ok());
  }

  #[test]
  fn range_is_reported_before_history() {
    // Both rules are violated; the range rule comes first.
    assert!(matches!(
      check(Series::Capacity, Some(10.0), Some(32.0)),
      Err(ValidationError::OutOfRange { .. })
    ));
  }

  // ─── Against a store ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn validate_reads_previous_period_from_store() {
    let store = MemoryStore::new();
    store
      .upsert(NewReading::capacity(
        p(2024, 1),
        32.0,
        CapacityMetrics::default(),
        DataSource::Manual,
      ))
      .await
      .unwrap();
    store
      .upsert(NewReading::generation(
        p(2024, 1),
        2000.0,
        GenerationMetrics::default(),
        DataSource::Manual,
      ))
      .await
      .unwrap();

    let v = Validator::default();
    let err = v
      .validate(&store, Series::Capacity, p(2024, 2), Some(31.2))
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      ValidateFailure::Invalid(ValidationError::ImplausibleDecrease { .. })
    ));

    assert_eq!(
      v.validate(&store, Series::Generation, p(2024, 2), Some(2500.0))
        .await
        .unwrap(),
      2500.0
    );

    // No record for the preceding month: history rules are skipped.
    assert!(
      v.validate(&store, Series::Capacity, p(2024, 6), Some(20.0))
        .await
        .is_ok()
    );
  }
}
