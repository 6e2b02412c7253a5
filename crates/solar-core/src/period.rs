//! Calendar periods: the natural key of every series.
//!
//! A [`Period`] is a `(year, month)` pair. Construction is validated, so any
//! `Period` value in the program is a month the pipeline can hold data for.
//! The ordering derived on the struct is chronological.

use std::{fmt, str::FromStr};

use chrono::{Month, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The first year the pipeline holds data for.
pub const FIRST_YEAR: i32 = 2021;

/// One calendar month.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
  year:  i32,
  month: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
  year:  i32,
  month: u32,
}

impl TryFrom<RawPeriod> for Period {
  type Error = Error;

  fn try_from(raw: RawPeriod) -> Result<Self> { Period::new(raw.year, raw.month) }
}

impl Period {
  pub fn new(year: i32, month: u32) -> Result<Self> {
    if year < FIRST_YEAR || !(1..=12).contains(&month) {
      return Err(Error::InvalidPeriod { year, month });
    }
    Ok(Self { year, month })
  }

  pub fn year(self) -> i32 { self.year }

  pub fn month(self) -> u32 { self.month }

  /// `year * 100 + month`; sorts the same way as the period itself and is
  /// what the SQL backends order by.
  pub fn key(self) -> i64 { i64::from(self.year) * 100 + i64::from(self.month) }

  /// The immediately preceding month, or `None` before the first storable
  /// period.
  pub fn previous(self) -> Option<Self> {
    if self.month == 1 {
      Self::new(self.year - 1, 12).ok()
    } else {
      Self::new(self.year, self.month - 1).ok()
    }
  }

  /// The immediately following month.
  pub fn next(self) -> Self {
    if self.month == 12 {
      Self { year: self.year + 1, month: 1 }
    } else {
      Self { year: self.year, month: self.month + 1 }
    }
  }

  /// The same month one year earlier, or `None` before the first storable
  /// period.
  pub fn year_ago(self) -> Option<Self> { Self::new(self.year - 1, self.month).ok() }

  pub fn is_leap_year(self) -> bool {
    NaiveDate::from_ymd_opt(self.year, 2, 29).is_some()
  }

  pub fn days_in_month(self) -> u32 {
    match self.month {
      4 | 6 | 9 | 11 => 30,
      2 if self.is_leap_year() => 29,
      2 => 28,
      _ => 31,
    }
  }

  pub fn hours_in_month(self) -> u32 { self.days_in_month() * 24 }

  /// The last calendar day of the month as `YYYY-MM-DD`.
  pub fn last_day(self) -> String {
    format!("{:04}-{:02}-{:02}", self.year, self.month, self.days_in_month())
  }

  /// English label such as `"January 2024"`, used in bulletin titles.
  pub fn label(self) -> String {
    let name = u8::try_from(self.month)
      .ok()
      .and_then(|m| Month::try_from(m).ok())
      .map_or("", |m| m.name());
    format!("{name} {}", self.year)
  }
}

impl fmt::Display for Period {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

impl FromStr for Period {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let (y, m) = s
      .trim()
      .split_once('-')
      .ok_or_else(|| Error::ParsePeriod(s.to_owned()))?;
    let year = y.parse().map_err(|_| Error::ParsePeriod(s.to_owned()))?;
    let month = m.parse().map_err(|_| Error::ParsePeriod(s.to_owned()))?;
    Self::new(year, month)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn p(year: i32, month: u32) -> Period { Period::new(year, month).unwrap() }

  #[test]
  fn rejects_out_of_range() {
    assert!(Period::new(2020, 12).is_err());
    assert!(Period::new(2024, 0).is_err());
    assert!(Period::new(2024, 13).is_err());
    assert!(Period::new(2021, 1).is_ok());
  }

  #[test]
  fn previous_wraps_year() {
    assert_eq!(p(2024, 1).previous(), Some(p(2023, 12)));
    assert_eq!(p(2024, 7).previous(), Some(p(2024, 6)));
    assert_eq!(p(2021, 1).previous(), None);
  }

  #[test]
  fn next_wraps_year() {
    assert_eq!(p(2023, 12).next(), p(2024, 1));
    assert_eq!(p(2023, 3).next(), p(2023, 4));
  }

  #[test]
  fn year_ago_stops_at_first_year() {
    assert_eq!(p(2023, 5).year_ago(), Some(p(2022, 5)));
    assert_eq!(p(2021, 5).year_ago(), None);
  }

  #[test]
  fn hours_account_for_leap_years() {
    assert_eq!(p(2024, 1).hours_in_month(), 744);
    assert_eq!(p(2024, 2).hours_in_month(), 29 * 24);
    assert_eq!(p(2023, 2).hours_in_month(), 28 * 24);
    assert_eq!(p(2023, 4).hours_in_month(), 720);
    assert_eq!(p(2100, 2).days_in_month(), 28);
  }

  #[test]
  fn ordering_is_chronological() {
    let mut periods = vec![p(2024, 1), p(2023, 12), p(2023, 2), p(2024, 11)];
    periods.sort();
    assert_eq!(periods, vec![p(2023, 2), p(2023, 12), p(2024, 1), p(2024, 11)]);
    assert!(p(2023, 12).key() < p(2024, 1).key());
  }

  #[test]
  fn display_and_parse() {
    assert_eq!(p(2024, 3).to_string(), "2024-03");
    assert_eq!("2024-03".parse::<Period>().unwrap(), p(2024, 3));
    assert!("2024".parse::<Period>().is_err());
    assert!("2019-03".parse::<Period>().is_err());
  }

  #[test]
  fn labels_and_last_day() {
    assert_eq!(p(2024, 2).label(), "February 2024");
    assert_eq!(p(2021, 1).label(), "January 2021");
    assert_eq!(p(2023, 12).label(), "December 2023");
    assert_eq!(p(2024, 2).last_day(), "2024-02-29");
    assert_eq!(p(2023, 12).last_day(), "2023-12-31");
  }

  #[test]
  fn deserialize_validates() {
    let ok: Period = serde_json::from_str(r#"{"year":2024,"month":6}"#).unwrap();
    assert_eq!(ok, p(2024, 6));
    assert!(serde_json::from_str::<Period>(r#"{"year":2024,"month":13}"#).is_err());
  }
}
