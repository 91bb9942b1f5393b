//! The `ProfileStore` trait.
//!
//! The trait is implemented by storage backends (`reef-store-sqlite`, and the
//! in-memory [`crate::memory::MemoryStore`]). The maintenance job and the API
//! are generic over it; no layer reaches for a global database handle.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  maintenance::ProfileUpdate,
  profile::{Capability, NewProfile, Profile},
};

// ─── Error contract ──────────────────────────────────────────────────────────

/// A backend error that may wrap a domain [`crate::Error`].
///
/// Callers use [`StoreError::domain`] to tell "profile not found" or
/// "insufficient points" apart from I/O failures.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn domain(&self) -> Option<&crate::Error>;
}

impl StoreError for crate::Error {
  fn domain(&self) -> Option<&crate::Error> { Some(self) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a profile store backend.
///
/// Every mutating method is atomic per call: a profile is read, changed via
/// its `apply_*` method, and written back as one unit.
/// [`ProfileStore::commit_yearly_batch`] extends that guarantee to a whole set
/// of profiles.
pub trait ProfileStore: Send + Sync {
  type Error: StoreError;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Create and persist a new, unenrolled profile.
  fn create_profile(
    &self,
    input: NewProfile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Insert or replace a complete profile. Used when migrating exported
  /// documents.
  fn import_profile(
    &self,
    profile: Profile,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Retrieve a profile by uid. Returns `None` if not found.
  fn get_profile(
    &self,
    uid: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn list_profiles(
    &self,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  /// Profiles with a `join_date`, i.e. enrolled in the loyalty program.
  fn list_enrolled(
    &self,
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + '_;

  // ── Capabilities ──────────────────────────────────────────────────────

  /// Grant a capability; see [`Profile::apply_grant`].
  fn grant_access(
    &self,
    uid: Uuid,
    capability: Capability,
    granted_by: String,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn revoke_access(
    &self,
    uid: Uuid,
    capability: Capability,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  // ── Points ────────────────────────────────────────────────────────────

  /// Credit earned points to `year`; see [`Profile::apply_credit`].
  fn credit_points(
    &self,
    uid: Uuid,
    year: i32,
    points: u64,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Spend redeemable points; fails rather than overdrawing.
  fn redeem_points(
    &self,
    uid: Uuid,
    points: u64,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  // ── Maintenance ───────────────────────────────────────────────────────

  /// Apply every update or none of them.
  fn commit_yearly_batch(
    &self,
    updates: Vec<ProfileUpdate>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
