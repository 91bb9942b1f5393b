//! In-process trigger for the yearly points check.
//!
//! The job fires once a year at a fixed UTC slot (January 1st, 00:00 by
//! default). A failed run is logged and not retried until the next slot;
//! `reef-server check` or `POST /api/maintenance/yearly-check` can rerun it
//! by hand.

use std::sync::Arc;

use chrono::{DateTime, Datelike as _, NaiveDate, Utc};
use reef_core::{job::YearlyCheck, store::ProfileStore};
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// How far ahead to look for the next slot. A February 29th slot can be
/// up to eight years away across a skipped century leap day.
const SEARCH_YEARS: i32 = 9;

/// When in the year the check runs, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct YearlySchedule {
  pub month: u32,
  pub day:   u32,
  pub hour:  u32,
}

impl Default for YearlySchedule {
  fn default() -> Self { Self { month: 1, day: 1, hour: 0 } }
}

impl YearlySchedule {
  /// Reject slots that can never occur, e.g. `2-30` or hour 24.
  pub fn validate(&self) -> Result<()> {
    if self.hour > 23 {
      return Err(Error::Config(format!("schedule hour {} out of range", self.hour)));
    }
    // 2024 is a leap year, so Feb 29 passes here.
    if NaiveDate::from_ymd_opt(2024, self.month, self.day).is_none() {
      return Err(Error::Config(format!(
        "schedule date {}-{} does not exist",
        self.month, self.day
      )));
    }
    Ok(())
  }

  fn slot_in(&self, year: i32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, self.month, self.day)?
      .and_hms_opt(self.hour, 0, 0)
      .map(|dt| dt.and_utc())
  }

  /// The first slot strictly after `now`.
  pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (now.year()..now.year() + SEARCH_YEARS)
      .filter_map(|year| self.slot_in(year))
      .find(|slot| *slot > now)
  }
}

/// Sleep until each slot and run the check, forever.
pub async fn run_yearly<S>(store: Arc<S>, schedule: YearlySchedule)
where
  S: ProfileStore + 'static,
{
  let job = YearlyCheck::new(store);

  loop {
    let now = Utc::now();
    let Some(next) = schedule.next_run_after(now) else {
      tracing::error!(?schedule, "no upcoming slot for yearly check, scheduler stopped");
      return;
    };
    tracing::info!(next = %next, "yearly check scheduled");

    tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

    if let Err(e) = job.run(next.year(), Utc::now()).await {
      tracing::error!(error = %e, "scheduled yearly check failed");
    }
  }
}

/// Spawn [`run_yearly`] onto the current runtime.
pub fn spawn<S>(store: Arc<S>, schedule: YearlySchedule) -> JoinHandle<()>
where
  S: ProfileStore + 'static,
{
  tokio::spawn(run_yearly(store, schedule))
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
  }

  #[test]
  fn default_is_new_year_midnight() {
    let next = YearlySchedule::default().next_run_after(at(2026, 10, 19, 9));
    assert_eq!(next, Some(at(2027, 1, 1, 0)));
  }

  #[test]
  fn slot_itself_is_not_next() {
    let next = YearlySchedule::default().next_run_after(at(2027, 1, 1, 0));
    assert_eq!(next, Some(at(2028, 1, 1, 0)));
  }

  #[test]
  fn later_slot_in_same_year() {
    let schedule = YearlySchedule { month: 12, day: 31, hour: 23 };
    assert_eq!(
      schedule.next_run_after(at(2026, 10, 19, 9)),
      Some(at(2026, 12, 31, 23))
    );
  }

  #[test]
  fn leap_day_skips_common_years() {
    let schedule = YearlySchedule { month: 2, day: 29, hour: 6 };
    assert!(schedule.validate().is_ok());
    assert_eq!(
      schedule.next_run_after(at(2025, 3, 1, 0)),
      Some(at(2028, 2, 29, 6))
    );
  }

  #[test]
  fn impossible_slots_are_rejected() {
    assert!(YearlySchedule { month: 13, day: 1, hour: 0 }.validate().is_err());
    assert!(YearlySchedule { month: 2, day: 30, hour: 0 }.validate().is_err());
    assert!(YearlySchedule { month: 1, day: 1, hour: 24 }.validate().is_err());
  }
}
