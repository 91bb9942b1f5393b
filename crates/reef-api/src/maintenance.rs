//! `POST /maintenance/yearly-check`: run the yearly minimum-activity check
//! on demand.
//!
//! Optional `?year=<year>` overrides the calendar year; writes are stamped
//! with the current time either way. Running it twice for the same year is
//! harmless: profiles already reduced are skipped.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{Datelike as _, Utc};
use reef_core::{
  job::{YearlyCheck, YearlyReport},
  store::ProfileStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CheckParams {
  pub year: Option<i32>,
}

/// `POST /maintenance/yearly-check[?year=<year>]`
pub async fn yearly_check<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<CheckParams>,
) -> Result<Json<YearlyReport>, ApiError>
where
  S: ProfileStore,
{
  let now = Utc::now();
  let year = params.year.unwrap_or_else(|| now.year());
  let report = YearlyCheck::new(store)
    .run(year, now)
    .await
    .map_err(ApiError::from_job)?;
  Ok(Json(report))
}
