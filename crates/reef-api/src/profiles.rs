//! Handlers for `/profiles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/profiles` | Optional `?enrolled=true` |
//! | `POST`   | `/profiles` | Body: `{"displayName":"…","email":"…"}` |
//! | `GET`    | `/profiles/{uid}` | 404 if not found |
//! | `POST`   | `/profiles/{uid}/access/{capability}` | Body: `{"grantedBy":"…"}`; 409 if already held |
//! | `DELETE` | `/profiles/{uid}/access/{capability}` | |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use reef_core::{
  profile::{Capability, NewProfile, Profile},
  store::ProfileStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  error::ApiError,
  extract::{JsonBody, PathParams},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub enrolled: bool,
}

/// `GET /profiles[?enrolled=true]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Profile>>, ApiError>
where
  S: ProfileStore,
{
  let profiles = if params.enrolled {
    store.list_enrolled().await
  } else {
    store.list_profiles().await
  }
  .map_err(ApiError::from_store)?;
  Ok(Json(profiles))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /profiles`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  JsonBody(body): JsonBody<NewProfile>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProfileStore,
{
  let profile = store
    .create_profile(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(profile)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /profiles/{uid}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  PathParams(uid): PathParams<Uuid>,
) -> Result<Json<Profile>, ApiError>
where
  S: ProfileStore,
{
  let profile = store
    .get_profile(uid)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("profile {uid} not found")))?;
  Ok(Json(profile))
}

// ─── Access ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBody {
  pub granted_by: String,
}

/// `POST /profiles/{uid}/access/{capability}`
pub async fn grant<S>(
  State(store): State<Arc<S>>,
  PathParams((uid, capability)): PathParams<(Uuid, Capability)>,
  JsonBody(body): JsonBody<GrantBody>,
) -> Result<Json<Profile>, ApiError>
where
  S: ProfileStore,
{
  let granted_by = body.granted_by.trim();
  if granted_by.is_empty() {
    return Err(ApiError::BadRequest("grantedBy must not be empty".into()));
  }

  let profile = store
    .grant_access(uid, capability, granted_by.to_owned(), Utc::now())
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(%uid, %capability, granted_by, "capability granted");
  Ok(Json(profile))
}

/// `DELETE /profiles/{uid}/access/{capability}`
pub async fn revoke<S>(
  State(store): State<Arc<S>>,
  PathParams((uid, capability)): PathParams<(Uuid, Capability)>,
) -> Result<Json<Profile>, ApiError>
where
  S: ProfileStore,
{
  let profile = store
    .revoke_access(uid, capability)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(%uid, %capability, "capability revoked");
  Ok(Json(profile))
}
