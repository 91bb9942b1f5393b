//! [`YearlyCheck`]: the I/O shell around [`crate::maintenance::plan`].
//!
//! A run is `fetch → compute → commit`: list enrolled profiles, assess them in
//! memory, then submit every write as one atomic batch. Any failure aborts the
//! run before anything is persisted; the next scheduled run starts over.

use std::sync::Arc;

use chrono::{DateTime, Datelike as _, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  maintenance::{self, CheckTally},
  store::ProfileStore,
};

#[derive(Debug, Error)]
pub enum JobError<E> {
  #[error("failed to list enrolled profiles: {0}")]
  Query(#[source] E),

  #[error("failed to commit yearly batch: {0}")]
  Commit(#[source] E),
}

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyReport {
  pub year:   i32,
  pub ran_at: DateTime<Utc>,
  #[serde(flatten)]
  pub tally:  CheckTally,
}

/// The yearly minimum-activity check, bound to a store.
pub struct YearlyCheck<S> {
  store: Arc<S>,
}

impl<S: ProfileStore> YearlyCheck<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Run the check for the calendar year of `now`.
  pub async fn run_at(
    &self,
    now: DateTime<Utc>,
  ) -> Result<YearlyReport, JobError<S::Error>> {
    self.run(now.year(), now).await
  }

  /// Run the check for `year`, stamping writes with `now`.
  pub async fn run(
    &self,
    year: i32,
    now: DateTime<Utc>,
  ) -> Result<YearlyReport, JobError<S::Error>> {
    tracing::info!(year, "starting yearly points check");

    let profiles = self.store.list_enrolled().await.map_err(|e| {
      tracing::error!(year, error = %e, "yearly check aborted: query failed");
      JobError::Query(e)
    })?;

    let plan = maintenance::plan(&profiles, year, now);

    if !plan.updates.is_empty() {
      self
        .store
        .commit_yearly_batch(plan.updates)
        .await
        .map_err(|e| {
          tracing::error!(
            year,
            pending = plan.tally.reduced,
            error = %e,
            "yearly check aborted: batch commit failed, nothing applied"
          );
          JobError::Commit(e)
        })?;
    }

    let tally = plan.tally;
    tracing::info!(
      year,
      scanned = tally.scanned,
      reduced = tally.reduced,
      met = tally.met,
      exempt = tally.exempt,
      joined_this_year = tally.joined_this_year,
      already_reduced = tally.already_reduced,
      points_reduced = tally.points_reduced,
      "yearly points check complete"
    );

    Ok(YearlyReport { year, ran_at: now, tally })
  }
}
