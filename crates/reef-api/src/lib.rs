//! JSON REST API for Reef rewards.
//!
//! Exposes an axum [`Router`] backed by any [`reef_core::store::ProfileStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", reef_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod extract;
pub mod loyalty;
pub mod maintenance;
pub mod profiles;
pub mod tiers;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use reef_core::store::ProfileStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ProfileStore + 'static,
{
  Router::new()
    // Tiers
    .route("/tiers", get(tiers::list))
    // Profiles
    .route("/profiles", get(profiles::list::<S>).post(profiles::create::<S>))
    .route("/profiles/{uid}", get(profiles::get_one::<S>))
    .route(
      "/profiles/{uid}/access/{capability}",
      post(profiles::grant::<S>).delete(profiles::revoke::<S>),
    )
    // Loyalty
    .route("/profiles/{uid}/loyalty", get(loyalty::summary::<S>))
    .route("/profiles/{uid}/points", post(loyalty::credit::<S>))
    .route("/profiles/{uid}/redeem", post(loyalty::redeem::<S>))
    // Maintenance
    .route("/maintenance/yearly-check", post(maintenance::yearly_check::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
