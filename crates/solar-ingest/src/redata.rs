//! Upstream data sources.
//!
//! [`PeriodDataSource`] yields the raw generation and capacity values for one
//! month. [`RedataSource`] reads them from the public REData API of Red
//! Eléctrica, which needs no authentication.

use std::{future::Future, time::Duration};

use reqwest::Client;
use serde::Deserialize;
use solar_core::{Period, metrics::round_to, record::{DataSource, Series}};

use crate::{
  error::FetchError,
  retry::{RetryPolicy, with_retry},
};

pub const GENERATION_URL: &str =
  "https://apidatos.ree.es/es/datos/generacion/estructura-generacion";
pub const CAPACITY_URL: &str =
  "https://apidatos.ree.es/es/datos/generacion/potencia-instalada";

/// Solar photovoltaic series in the generation-structure widget.
pub const GENERATION_SERIES_ID: &str = "1739";
/// Solar photovoltaic series in the installed-capacity widget. Solar thermal
/// sits next to it as 1487, so matching is by exact id.
pub const CAPACITY_SERIES_ID: &str = "1486";

/// Raw values for one period, already converted to GWh and GW.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
  pub generation_gwh: f64,
  pub capacity_gw:    f64,
  pub source:         DataSource,
}

/// Anything that can produce the raw values for a period.
pub trait PeriodDataSource: Send + Sync {
  fn fetch(
    &self,
    period: Period,
  ) -> impl Future<Output = Result<RawReading, FetchError>> + Send + '_;
}

// ─── REData ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RedataConfig {
  pub generation_url: String,
  pub capacity_url:   String,
  pub timeout:        Duration,
  pub retry:          RetryPolicy,
}

impl Default for RedataConfig {
  fn default() -> Self {
    Self {
      generation_url: GENERATION_URL.to_owned(),
      capacity_url:   CAPACITY_URL.to_owned(),
      timeout:        Duration::from_secs(30),
      retry:          RetryPolicy::default(),
    }
  }
}

/// REData client. Cheap to clone; the inner [`reqwest::Client`] is
/// `Arc`-based.
#[derive(Clone)]
pub struct RedataSource {
  client: Client,
  config: RedataConfig,
}

impl RedataSource {
  pub fn new(config: RedataConfig) -> Result<Self, FetchError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| FetchError::Transport {
        label:  "REData client".into(),
        reason: e.to_string(),
      })?;
    Ok(Self { client, config })
  }

  /// One month, truncated to a single monthly value.
  fn query(period: Period) -> [(&'static str, String); 3] {
    [
      (
        "start_date",
        format!("{:04}-{:02}-01T00:00", period.year(), period.month()),
      ),
      (
        "end_date",
        format!(
          "{:04}-{:02}-{:02}T23:59",
          period.year(),
          period.month(),
          period.days_in_month()
        ),
      ),
      ("time_trunc", "month".to_owned()),
    ]
  }

  async fn get_once(&self, url: &str, period: Period, label: &str) -> Result<Envelope, FetchError> {
    let resp = self
      .client
      .get(url)
      .header(reqwest::header::ACCEPT, "application/json")
      .query(&Self::query(period))
      .send()
      .await
      .map_err(|e| FetchError::Transport { label: label.to_owned(), reason: e.to_string() })?;

    let status = resp.status();
    if !status.is_success() {
      return Err(FetchError::Status { label: label.to_owned(), status: status.as_u16() });
    }

    resp
      .json()
      .await
      .map_err(|e| FetchError::Decode { label: label.to_owned(), reason: e.to_string() })
  }

  async fn fetch_series(&self, series: Series, period: Period) -> Result<f64, FetchError> {
    let (url, id) = match series {
      Series::Generation => (&self.config.generation_url, GENERATION_SERIES_ID),
      Series::Capacity => (&self.config.capacity_url, CAPACITY_SERIES_ID),
    };
    let label = format!("REData {series} ({period})");

    let body =
      with_retry(&self.config.retry, &label, || self.get_once(url, period, &label)).await?;
    let value = series_value(&body, series, id)?;

    tracing::debug!(%series, %period, value, "fetched REData series");
    Ok(value)
  }
}

impl PeriodDataSource for RedataSource {
  async fn fetch(&self, period: Period) -> Result<RawReading, FetchError> {
    let generation_gwh = self.fetch_series(Series::Generation, period).await?;
    let capacity_gw = self.fetch_series(Series::Capacity, period).await?;
    Ok(RawReading { generation_gwh, capacity_gw, source: DataSource::ApiPrimary })
  }
}

// ─── Response parsing ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Envelope {
  #[serde(default)]
  included: Vec<Included>,
}

#[derive(Debug, Deserialize)]
struct Included {
  #[serde(default)]
  id:         serde_json::Value,
  #[serde(default)]
  attributes: Option<Attributes>,
}

#[derive(Debug, Deserialize)]
struct Attributes {
  #[serde(default)]
  values: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
  #[serde(default)]
  value: Option<f64>,
}

impl Included {
  fn has_id(&self, want: &str) -> bool {
    match &self.id {
      serde_json::Value::String(s) => s == want,
      serde_json::Value::Number(n) => n.to_string() == want,
      _ => false,
    }
  }
}

/// Pick the first monthly value of series `id` and convert it from MWh/MW to
/// GWh (2 dp) or GW (3 dp).
pub fn series_value(body: &Envelope, series: Series, id: &str) -> Result<f64, FetchError> {
  let included = body
    .included
    .iter()
    .find(|s| s.has_id(id))
    .ok_or_else(|| FetchError::SeriesNotFound { series, id: id.to_owned() })?;

  let raw = included
    .attributes
    .as_ref()
    .and_then(|a| a.values.first())
    .and_then(|p| p.value)
    .ok_or(FetchError::NullValue { series })?;

  Ok(match series {
    Series::Generation => round_to(raw / 1000.0, 2),
    Series::Capacity => round_to(raw / 1000.0, 3),
  })
}

/// Parse a raw response body; exposed for callers holding the bytes.
pub fn parse_envelope(body: &str) -> Result<Envelope, FetchError> {
  serde_json::from_str(body).map_err(|e| FetchError::Decode {
    label:  "REData".into(),
    reason: e.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  const GENERATION_BODY: &str = r#"{
    "data": { "type": "Generación por tecnología" },
    "included": [
      { "type": "Eólica", "id": "1457",
        "attributes": { "values": [ { "value": 4861234.5, "datetime": "2024-03-01T00:00:00.000+01:00" } ] } },
      { "type": "Solar fotovoltaica", "id": "1739",
        "attributes": { "values": [ { "value": 3123456.789, "datetime": "2024-03-01T00:00:00.000+01:00" } ] } }
    ]
  }"#;

  const CAPACITY_BODY: &str = r#"{
    "included": [
      { "id": "1487", "attributes": { "values": [ { "value": 2304.0 } ] } },
      { "id": 1486, "attributes": { "values": [ { "value": 31754.4 } ] } }
    ]
  }"#;

  #[test]
  fn generation_is_converted_to_gwh() {
    let body = parse_envelope(GENERATION_BODY).unwrap();
    let gwh = series_value(&body, Series::Generation, GENERATION_SERIES_ID).unwrap();
    assert_eq!(gwh, 3123.46);
  }

  #[test]
  fn capacity_matches_exact_id_and_converts_to_gw() {
    let body = parse_envelope(CAPACITY_BODY).unwrap();
    let gw = series_value(&body, Series::Capacity, CAPACITY_SERIES_ID).unwrap();
    assert_eq!(gw, 31.754);
  }

  #[test]
  fn missing_series_is_reported() {
    let body = parse_envelope(CAPACITY_BODY).unwrap();
    let err = series_value(&body, Series::Generation, GENERATION_SERIES_ID).unwrap_err();
    assert_eq!(
      err,
      FetchError::SeriesNotFound { series: Series::Generation, id: "1739".into() }
    );
    assert!(!err.is_transient());
  }

  #[test]
  fn null_value_is_reported() {
    let body =
      parse_envelope(r#"{ "included": [ { "id": "1486", "attributes": { "values": [ { "value": null } ] } } ] }"#)
        .unwrap();
    assert_eq!(
      series_value(&body, Series::Capacity, CAPACITY_SERIES_ID),
      Err(FetchError::NullValue { series: Series::Capacity })
    );
  }

  #[test]
  fn query_spans_the_whole_month() {
    let q = RedataSource::query(Period::new(2024, 2).unwrap());
    assert_eq!(q[0].1, "2024-02-01T00:00");
    assert_eq!(q[1].1, "2024-02-29T23:59");
    assert_eq!(q[2].1, "month");
  }

  #[test]
  fn garbage_body_is_a_decode_error() {
    assert!(matches!(parse_envelope("<html>"), Err(FetchError::Decode { .. })));
  }
}
