//! Error types for `reef-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::profile::Capability;

#[derive(Debug, Error)]
pub enum Error {
  #[error("profile not found: {0}")]
  ProfileNotFound(Uuid),

  #[error("profile {0} is not enrolled in the loyalty program")]
  NotEnrolled(Uuid),

  #[error("profile {uid} already holds {capability} access")]
  AlreadyGranted { uid: Uuid, capability: Capability },

  #[error(
    "profile {uid} has {available} redeemable points, {requested} requested"
  )]
  InsufficientPoints {
    uid:       Uuid,
    requested: u64,
    available: u64,
  },

  /// Expiration records are append-only; a batch may not replace one.
  #[error("profile {uid} already has a points expiration for {year}")]
  ExpirationExists { uid: Uuid, year: i32 },

  #[error("malformed profile document: {0}")]
  MalformedDocument(String),

  /// The backing store refused or failed a write.
  #[error("backend error: {0}")]
  Backend(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
