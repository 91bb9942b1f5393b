//! `GET /tiers`: the tier table as shown on the rewards page.

use axum::Json;
use reef_core::tier::{Tier, TierDescriptor};

/// `GET /tiers`
pub async fn list() -> Json<Vec<TierDescriptor>> {
  Json(Tier::ALL.into_iter().map(TierDescriptor::from).collect())
}
