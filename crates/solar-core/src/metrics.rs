//! Derived-metrics engine.
//!
//! [`compute`] reads whatever history the store holds strictly before the
//! target period and hands it to the pure functions [`generation_metrics`]
//! and [`capacity_metrics`]. The target period itself must not be upserted
//! yet; re-ingesting an old period never sees later periods.
//!
//! Every ratio treats a zero or absent denominator as "metric unavailable"
//! (`None`), and `None` propagates into the fields derived from it.

use std::collections::HashMap;

use crate::{
  Period,
  record::{CapacityMetrics, GenerationMetrics, PeriodMetrics, Record, Series},
  store::PeriodStore,
};

/// Number of prior periods summed into a rolling 12-month window; the current
/// period makes twelve.
pub const PRIOR_WINDOW: usize = 11;

/// Round half away from zero to `places` decimals.
///
/// The scaled value is first pre-rounded to 15 significant digits, so a
/// half-way case such as `1.275` (stored as `1.27499999…`) rounds up to
/// `1.28` the way the historical exports do.
pub fn round_to(value: f64, places: i32) -> f64 {
  let factor = 10f64.powi(places);
  let scaled = value * factor;
  let pre: f64 = format!("{scaled:.14e}").parse().unwrap_or(scaled);
  pre.round() / factor
}

fn pct_change(current: f64, base: Option<f64>) -> Option<f64> {
  match base {
    Some(b) if b > 0.0 => Some(round_to((current - b) / b * 100.0, 1)),
    _ => None,
  }
}

// ─── Generation ──────────────────────────────────────────────────────────────

/// Raw generation history relevant to one target period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationHistory {
  /// Raw GWh of the immediately preceding month, if stored.
  pub previous: Option<f64>,
  /// Raw GWh of the same month one year earlier, if stored.
  pub year_ago: Option<f64>,
  /// Raw GWh of up to [`PRIOR_WINDOW`] most recent stored periods strictly
  /// before the target, most recent first.
  pub window:   Vec<f64>,
}

pub fn generation_metrics(
  period: Period,
  generation_gwh: f64,
  capacity_gw: f64,
  history: &GenerationHistory,
) -> GenerationMetrics {
  let mom_pct = pct_change(generation_gwh, history.previous);
  let yoy_pct = pct_change(generation_gwh, history.year_ago);

  let prior: f64 = history.window.iter().take(PRIOR_WINDOW).sum();
  let rolling_12m_gwh = Some(round_to(prior + generation_gwh, 0));

  // GW x hours = GWh of theoretical maximum output.
  let capacity_factor_pct = (capacity_gw > 0.0).then(|| {
    let max_gwh = capacity_gw * f64::from(period.hours_in_month());
    round_to(generation_gwh / max_gwh * 100.0, 1)
  });

  let momentum_score = match (yoy_pct, mom_pct) {
    (Some(yoy), Some(mom)) => Some(momentum(yoy, mom)),
    _ => None,
  };

  GenerationMetrics {
    mom_pct,
    yoy_pct,
    rolling_12m_gwh,
    capacity_factor_pct,
    momentum_score,
  }
}

/// `clamp(round(50 + 0.5·yoy + 0.3·mom), 0, 100)`.
pub fn momentum(yoy_pct: f64, mom_pct: f64) -> u8 {
  round_to(50.0 + 0.5 * yoy_pct + 0.3 * mom_pct, 0).clamp(0.0, 100.0) as u8
}

// ─── Capacity ────────────────────────────────────────────────────────────────

/// Raw capacity history relevant to one target period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityHistory {
  /// Raw GW of the immediately preceding month, if stored.
  pub previous:        Option<f64>,
  /// Monthly additions of up to [`PRIOR_WINDOW`] most recent prior periods
  /// that have one, most recent first.
  pub prior_additions: Vec<f64>,
}

pub fn capacity_metrics(capacity_gw: f64, history: &CapacityHistory) -> CapacityMetrics {
  let monthly_addition_gw = history.previous.map(|prev| round_to(capacity_gw - prev, 3));

  let rolling_12m_added_gw = monthly_addition_gw.map(|addition| {
    if history.prior_additions.is_empty() {
      addition
    } else {
      let prior: f64 = history.prior_additions.iter().take(PRIOR_WINDOW).sum();
      round_to(prior + addition, 2)
    }
  });

  // Build pace is the rolling addition total itself, shown at one decimal.
  let build_pace_gw_yr = rolling_12m_added_gw.map(|v| round_to(v, 1));

  CapacityMetrics { monthly_addition_gw, rolling_12m_added_gw, build_pace_gw_yr }
}

/// Re-derive monthly additions from raw capacity rows.
///
/// `rows` must be ordered most recent first. A row gets an addition only when
/// the row for its immediately preceding month is also present. The result
/// keeps the input order.
pub fn monthly_additions(rows: &[(Period, f64)]) -> Vec<(Period, f64)> {
  let by_period: HashMap<Period, f64> = rows.iter().copied().collect();
  rows
    .iter()
    .filter_map(|&(period, gw)| {
      let prev = by_period.get(&period.previous()?)?;
      Some((period, round_to(gw - prev, 3)))
    })
    .collect()
}

// ─── Store-backed engine ─────────────────────────────────────────────────────

async fn raw_at<S: PeriodStore>(
  store: &S,
  series: Series,
  period: Option<Period>,
) -> Result<Option<f64>, S::Error> {
  match period {
    Some(p) => Ok(store.get(series, p).await?.as_ref().map(Record::raw_value)),
    None => Ok(None),
  }
}

pub async fn generation_history<S: PeriodStore>(
  store: &S,
  period: Period,
) -> Result<GenerationHistory, S::Error> {
  let previous = raw_at(store, Series::Generation, period.previous()).await?;
  let year_ago = raw_at(store, Series::Generation, period.year_ago()).await?;
  let window = store
    .get_before(Series::Generation, period, Some(PRIOR_WINDOW))
    .await?
    .iter()
    .map(Record::raw_value)
    .collect();
  Ok(GenerationHistory { previous, year_ago, window })
}

pub async fn capacity_history<S: PeriodStore>(
  store: &S,
  period: Period,
) -> Result<CapacityHistory, S::Error> {
  let rows: Vec<(Period, f64)> = store
    .get_before(Series::Capacity, period, None)
    .await?
    .iter()
    .map(|r| (r.period(), r.raw_value()))
    .collect();

  let previous = period
    .previous()
    .and_then(|prev| rows.iter().find(|(p, _)| *p == prev).map(|&(_, gw)| gw));

  let prior_additions = monthly_additions(&rows)
    .into_iter()
    .take(PRIOR_WINDOW)
    .map(|(_, addition)| addition)
    .collect();

  Ok(CapacityHistory { previous, prior_additions })
}

/// Compute both derived bundles for `period` from the stored history plus the
/// new (already validated) raw values.
pub async fn compute<S: PeriodStore>(
  store: &S,
  period: Period,
  generation_gwh: f64,
  capacity_gw: f64,
) -> Result<PeriodMetrics, S::Error> {
  let gen_history = generation_history(store, period).await?;
  let cap_history = capacity_history(store, period).await?;

  let metrics = PeriodMetrics {
    generation: generation_metrics(period, generation_gwh, capacity_gw, &gen_history),
    capacity:   capacity_metrics(capacity_gw, &cap_history),
  };

  tracing::debug!(
    %period,
    prior_generation_rows = gen_history.window.len(),
    prior_additions = cap_history.prior_additions.len(),
    ?metrics,
    "computed derived metrics"
  );

  Ok(metrics)
}
