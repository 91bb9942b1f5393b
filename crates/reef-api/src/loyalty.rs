//! Handlers for the loyalty side of a profile.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/profiles/{uid}/loyalty` | Optional `?year=<year>`, defaults to the current year |
//! | `POST` | `/profiles/{uid}/points` | Body: `{"basePoints":500}`; tier multiplier applied |
//! | `POST` | `/profiles/{uid}/redeem` | Body: `{"points":1000}` |
//!
//! All three answer 409 for a profile that has not joined the program.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{Datelike as _, Utc};
use reef_core::{
  display::{LoyaltySummary, format_points},
  profile::Profile,
  store::ProfileStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::ApiError,
  extract::{JsonBody, PathParams},
};

async fn load<S: ProfileStore>(store: &S, uid: Uuid) -> Result<Profile, ApiError> {
  let profile = store
    .get_profile(uid)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("profile {uid} not found")))?;
  if !profile.is_enrolled() {
    return Err(ApiError::Conflict(format!(
      "profile {uid} is not enrolled in the loyalty program"
    )));
  }
  Ok(profile)
}

// ─── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
  pub year: Option<i32>,
}

/// Point totals pre-formatted for display, e.g. `"15,000"`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedPoints {
  pub lifetime_points:   String,
  pub redeemable_points: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
  pub uid:       Uuid,
  #[serde(flatten)]
  pub summary:   LoyaltySummary,
  pub formatted: FormattedPoints,
}

/// `GET /profiles/{uid}/loyalty[?year=<year>]`
pub async fn summary<S>(
  State(store): State<Arc<S>>,
  PathParams(uid): PathParams<Uuid>,
  Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResponse>, ApiError>
where
  S: ProfileStore,
{
  let profile = load(store.as_ref(), uid).await?;
  let year = params.year.unwrap_or_else(|| Utc::now().year());
  let summary = LoyaltySummary::for_profile(&profile, year);

  Ok(Json(SummaryResponse {
    uid,
    formatted: FormattedPoints {
      lifetime_points:   format_points(summary.lifetime_points),
      redeemable_points: format_points(summary.redeemable_points),
    },
    summary,
  }))
}

// ─── Credit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBody {
  pub base_points: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditResponse {
  pub base_points:   u64,
  pub multiplier:    f64,
  pub earned_points: u64,
  pub year:          i32,
  pub profile:       Profile,
}

/// `POST /profiles/{uid}/points`
///
/// The multiplier is taken from the tier the member holds before the credit.
pub async fn credit<S>(
  State(store): State<Arc<S>>,
  PathParams(uid): PathParams<Uuid>,
  JsonBody(body): JsonBody<CreditBody>,
) -> Result<Json<CreditResponse>, ApiError>
where
  S: ProfileStore,
{
  if body.base_points == 0 {
    return Err(ApiError::BadRequest("basePoints must be positive".into()));
  }

  let tier = load(store.as_ref(), uid).await?.tier();
  let earned = tier.apply_multiplier(body.base_points);
  let year = Utc::now().year();

  let profile = store
    .credit_points(uid, year, earned)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(%uid, base = body.base_points, earned, %tier, "points credited");

  Ok(Json(CreditResponse {
    base_points: body.base_points,
    multiplier: tier.multiplier(),
    earned_points: earned,
    year,
    profile,
  }))
}

// ─── Redeem ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RedeemBody {
  pub points: u64,
}

/// `POST /profiles/{uid}/redeem`
pub async fn redeem<S>(
  State(store): State<Arc<S>>,
  PathParams(uid): PathParams<Uuid>,
  JsonBody(body): JsonBody<RedeemBody>,
) -> Result<Json<Profile>, ApiError>
where
  S: ProfileStore,
{
  if body.points == 0 {
    return Err(ApiError::BadRequest("points must be positive".into()));
  }

  let profile = store
    .redeem_points(uid, body.points)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(%uid, points = body.points, "points redeemed");
  Ok(Json(profile))
}
