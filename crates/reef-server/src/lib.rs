//! HTTP server for Reef rewards.
//!
//! Mounts the JSON API under `/api`, guards its mutating routes with Basic
//! auth, and owns the in-process yearly scheduler.

pub mod auth;
pub mod error;
pub mod scheduler;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use reef_core::store::ProfileStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};
use scheduler::YearlySchedule;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `REEF_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  pub auth_username:      Option<String>,
  pub auth_password_hash: Option<String>,
  #[serde(default)]
  pub schedule:           YearlySchedule,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8340 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/reef/reef.db") }

impl ServerConfig {
  /// Admin credentials; `serve` refuses to start without them.
  pub fn auth(&self) -> Result<AuthConfig> {
    match (&self.auth_username, &self.auth_password_hash) {
      (Some(username), Some(hash)) => Ok(AuthConfig {
        username:      username.clone(),
        password_hash: hash.clone(),
      }),
      _ => Err(Error::Config(
        "auth_username and auth_password_hash must both be set".into(),
      )),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs.
#[derive(Clone)]
pub struct AppState<S: ProfileStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the top-level axum [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ProfileStore + 'static,
{
  let api = reef_api::api_router(state.store.clone())
    .layer(middleware::from_fn_with_state(state.auth.clone(), require_admin));

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use reef_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState {
      store: Arc::new(store),
      auth:  Arc::new(AuthConfig {
        username:      "admin".to_string(),
        password_hash: hash,
      }),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    state:   AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    auth:    Option<&str>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
      builder = builder.header(header::AUTHORIZATION, auth);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state).oneshot(req).await.unwrap()
  }

  async fn json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn reads_need_no_credentials() {
    let state = make_state("secret").await;
    let resp  = oneshot_raw(state, "GET", "/api/tiers", None, "").await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn writes_without_credentials_are_401() {
    let state = make_state("secret").await;
    let resp  = oneshot_raw(state, "POST", "/api/profiles", None, "{}").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn writes_with_wrong_password_are_401() {
    let state = make_state("secret").await;
    let auth  = auth_header("admin", "nope");
    let resp  = oneshot_raw(state, "POST", "/api/profiles", Some(&auth), "{}").await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn enroll_earn_and_check_over_http() {
    let state = make_state("secret").await;
    let auth  = auth_header("admin", "secret");

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      "/api/profiles",
      Some(&auth),
      r#"{"displayName":"Kai"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let uid = json(resp).await["uid"].as_str().unwrap().to_string();

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      &format!("/api/profiles/{uid}/access/loyalty"),
      Some(&auth),
      r#"{"grantedBy":"front-desk"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = oneshot_raw(
      state.clone(),
      "POST",
      &format!("/api/profiles/{uid}/points"),
      Some(&auth),
      r#"{"basePoints":250}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["earnedPoints"], 250);

    let resp = oneshot_raw(
      state.clone(),
      "GET",
      &format!("/api/profiles/{uid}/loyalty"),
      None,
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let summary = json(resp).await;
    assert_eq!(summary["tierName"], "Oceanic Silver");
    assert_eq!(summary["lifetimePoints"], 250);

    // Joined this year, so the check leaves the new member alone.
    let resp = oneshot_raw(
      state,
      "POST",
      "/api/maintenance/yearly-check",
      Some(&auth),
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = json(resp).await;
    assert_eq!(report["joinedThisYear"], 1);
    assert_eq!(report["reduced"], 0);
  }

  #[test]
  fn config_defaults_fill_missing_fields() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
      "auth_username": "admin",
      "auth_password_hash": "$argon2id$stub"
    }))
    .unwrap();
    assert_eq!(cfg.port, 8340);
    assert_eq!(cfg.schedule, YearlySchedule::default());
    assert!(cfg.auth().is_ok());
  }

  #[test]
  fn missing_credentials_are_a_config_error() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({})).unwrap();
    assert!(matches!(cfg.auth(), Err(Error::Config(_))));
  }
}
