use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::{Datelike as _, TimeZone as _, Utc};
use reef_core::{
  memory::MemoryStore,
  profile::{Capability, NewProfile},
  store::ProfileStore,
};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::api_router;

async fn send(
  store: &Arc<MemoryStore>,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = api_router(store.clone())
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();

  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, value)
}

/// A member who joined in 2023 with `lifetime` points earned in 2024.
async fn member(store: &MemoryStore, lifetime: u64) -> Uuid {
  let p = store.create_profile(NewProfile::default()).await.unwrap();
  let joined = Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap();
  store
    .grant_access(p.uid, Capability::Loyalty, "admin".into(), joined)
    .await
    .unwrap();
  if lifetime > 0 {
    store.credit_points(p.uid, 2024, lifetime).await.unwrap();
  }
  p.uid
}

// ─── Tiers ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn tiers_lists_all_bands() {
  let store = Arc::new(MemoryStore::new());
  let (status, body) = send(&store, "GET", "/tiers", None).await;
  assert_eq!(status, StatusCode::OK);

  let tiers = body.as_array().unwrap();
  assert_eq!(tiers.len(), 5);
  assert_eq!(tiers[1]["name"], "Mariner Gold");
  assert_eq!(tiers[1]["minPoints"], 10_000);
  assert_eq!(tiers[1]["maxPoints"], 19_999);
  assert_eq!(tiers[4]["maxPoints"], Value::Null);
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_get_profile() {
  let store = Arc::new(MemoryStore::new());
  let (status, created) = send(
    &store,
    "POST",
    "/profiles",
    Some(json!({ "displayName": "Ama", "email": "ama@example.com" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["joinDate"], Value::Null);

  let uid = created["uid"].as_str().unwrap();
  let (status, fetched) =
    send(&store, "GET", &format!("/profiles/{uid}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched["displayName"], "Ama");
}

#[tokio::test]
async fn missing_profile_is_404() {
  let store = Arc::new(MemoryStore::new());
  let uri = format!("/profiles/{}", Uuid::new_v4());
  let (status, body) = send(&store, "GET", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn list_can_filter_to_members() {
  let store = Arc::new(MemoryStore::new());
  member(&store, 0).await;
  store.create_profile(NewProfile::default()).await.unwrap();

  let (_, all) = send(&store, "GET", "/profiles", None).await;
  assert_eq!(all.as_array().unwrap().len(), 2);
  let (_, enrolled) = send(&store, "GET", "/profiles?enrolled=true", None).await;
  assert_eq!(enrolled.as_array().unwrap().len(), 1);
}

// ─── Access ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn grant_twice_is_conflict() {
  let store = Arc::new(MemoryStore::new());
  let p = store.create_profile(NewProfile::default()).await.unwrap();
  let uri = format!("/profiles/{}/access/loyalty", p.uid);

  let (status, body) =
    send(&store, "POST", &uri, Some(json!({ "grantedBy": "front-desk" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["loyaltyAccess"]["grantedBy"], "front-desk");
  assert!(body["joinDate"].is_string());

  let (status, _) =
    send(&store, "POST", &uri, Some(json!({ "grantedBy": "front-desk" }))).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn revoke_clears_grant() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 0).await;
  store
    .grant_access(uid, Capability::Team, "admin".into(), Utc::now())
    .await
    .unwrap();

  let uri = format!("/profiles/{uid}/access/team");
  let (status, body) = send(&store, "DELETE", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["teamAccess"], Value::Null);
  assert!(body["loyaltyAccess"].is_object());
}

#[tokio::test]
async fn unknown_capability_is_rejected() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 0).await;
  let uri = format!("/profiles/{uid}/access/captain");
  let (status, body) =
    send(&store, "POST", &uri, Some(json!({ "grantedBy": "admin" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_uid_is_bad_request() {
  let store = Arc::new(MemoryStore::new());
  let (status, body) = send(&store, "GET", "/profiles/not-a-uuid", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn blank_granter_is_bad_request() {
  let store = Arc::new(MemoryStore::new());
  let p = store.create_profile(NewProfile::default()).await.unwrap();
  let uri = format!("/profiles/{}/access/instructor", p.uid);
  let (status, _) =
    send(&store, "POST", &uri, Some(json!({ "grantedBy": "  " }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Loyalty ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn credit_applies_tier_multiplier() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 15_000).await;

  let (status, body) = send(
    &store,
    "POST",
    &format!("/profiles/{uid}/points"),
    Some(json!({ "basePoints": 500 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["multiplier"], 1.2);
  assert_eq!(body["earnedPoints"], 600);
  assert_eq!(body["year"], Utc::now().year());
  assert_eq!(body["profile"]["lifetimePoints"], 15_600);
}

#[tokio::test]
async fn negative_base_points_are_bad_request() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 1_000).await;
  let (status, body) = send(
    &store,
    "POST",
    &format!("/profiles/{uid}/points"),
    Some(json!({ "basePoints": -5 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());

  let p = store.get_profile(uid).await.unwrap().unwrap();
  assert_eq!(p.lifetime_points, 1_000);
}

#[tokio::test]
async fn credit_for_non_member_is_conflict() {
  let store = Arc::new(MemoryStore::new());
  let p = store.create_profile(NewProfile::default()).await.unwrap();
  let (status, _) = send(
    &store,
    "POST",
    &format!("/profiles/{}/points", p.uid),
    Some(json!({ "basePoints": 100 })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn overdraw_is_conflict() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 300).await;
  let (status, body) = send(
    &store,
    "POST",
    &format!("/profiles/{uid}/redeem"),
    Some(json!({ "points": 301 })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());

  let (status, body) = send(
    &store,
    "POST",
    &format!("/profiles/{uid}/redeem"),
    Some(json!({ "points": 300 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["redeemablePoints"], 0);
  assert_eq!(body["lifetimePoints"], 300);
}

#[tokio::test]
async fn loyalty_summary_for_year() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 25_000).await;

  let (status, body) = send(
    &store,
    "GET",
    &format!("/profiles/{uid}/loyalty?year=2024"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["tierName"], "Nautilus Platinum");
  assert_eq!(body["pointsEarnedThisYear"], 25_000);
  assert_eq!(body["yearlyRequirement"], 2_000);
  assert_eq!(body["tierLocked"], true);
  assert_eq!(body["formatted"]["lifetimePoints"], "25,000");
}

// ─── Maintenance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn yearly_check_reports_and_is_idempotent() {
  let store = Arc::new(MemoryStore::new());
  let uid = member(&store, 15_000).await;

  let (status, report) =
    send(&store, "POST", "/maintenance/yearly-check?year=2026", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["year"], 2026);
  assert_eq!(report["reduced"], 1);
  assert_eq!(report["pointsReduced"], 1_500);

  let (_, again) =
    send(&store, "POST", "/maintenance/yearly-check?year=2026", None).await;
  assert_eq!(again["reduced"], 0);
  assert_eq!(again["alreadyReduced"], 1);

  let p = store.get_profile(uid).await.unwrap().unwrap();
  assert_eq!(p.lifetime_points, 13_500);
}

#[tokio::test]
async fn failed_yearly_commit_is_500() {
  let store = Arc::new(MemoryStore::new());
  member(&store, 15_000).await;
  store.reject_batches(true);

  let (status, body) =
    send(&store, "POST", "/maintenance/yearly-check?year=2026", None).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert!(body["error"].as_str().unwrap().contains("commit"));
}
