//! Profile: one record per user, carrying the loyalty ledger and capability
//! grants.
//!
//! Loyalty fields are plain values with explicit defaults: a profile that has
//! never been enrolled has zero points, empty yearly maps, and no `join_date`.
//! All mutations go through the `apply_*` methods so every store backend
//! enforces the same rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike as _, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, maintenance::ProfileUpdate, tier::Tier};

// ─── Capabilities ────────────────────────────────────────────────────────────

/// An independently granted capability on a profile.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
  Loyalty,
  Instructor,
  Team,
  Management,
}

/// Who granted a capability, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
  pub has_access: bool,
  pub granted_at: DateTime<Utc>,
  pub granted_by: String,
}

// ─── Ledger entries ──────────────────────────────────────────────────────────

/// A yearly reduction, written once by the maintenance job and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsExpiration {
  pub points_reduced: u64,
  pub reason:         String,
  pub date:           DateTime<Utc>,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub uid:                   Uuid,
  pub display_name:          Option<String>,
  pub email:                 Option<String>,
  pub created_at:            DateTime<Utc>,
  pub lifetime_points:       u64,
  pub redeemable_points:     u64,
  /// Set once on first loyalty enrollment.
  pub join_date:             Option<DateTime<Utc>>,
  pub yearly_points_earned:  BTreeMap<i32, u64>,
  pub points_expirations:    BTreeMap<i32, PointsExpiration>,
  pub last_expiration_check: Option<DateTime<Utc>>,
  pub loyalty_access:        Option<AccessGrant>,
  pub instructor_access:     Option<AccessGrant>,
  pub team_access:           Option<AccessGrant>,
  pub management_rights:     Option<AccessGrant>,
}

/// Input to [`crate::store::ProfileStore::create_profile`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
  pub display_name: Option<String>,
  pub email:        Option<String>,
}

impl Profile {
  /// A freshly signed-up profile: no loyalty fields, no grants.
  pub fn new(input: NewProfile, now: DateTime<Utc>) -> Self {
    Self {
      uid:                   Uuid::new_v4(),
      display_name:          input.display_name,
      email:                 input.email,
      created_at:            now,
      lifetime_points:       0,
      redeemable_points:     0,
      join_date:             None,
      yearly_points_earned:  BTreeMap::new(),
      points_expirations:    BTreeMap::new(),
      last_expiration_check: None,
      loyalty_access:        None,
      instructor_access:     None,
      team_access:           None,
      management_rights:     None,
    }
  }

  pub fn is_enrolled(&self) -> bool { self.join_date.is_some() }

  pub fn join_year(&self) -> Option<i32> {
    self.join_date.map(|d| d.year())
  }

  pub fn tier(&self) -> Tier { Tier::for_points(self.lifetime_points) }

  pub fn points_earned_in(&self, year: i32) -> u64 {
    self.yearly_points_earned.get(&year).copied().unwrap_or(0)
  }

  pub fn grant(&self, capability: Capability) -> Option<&AccessGrant> {
    match capability {
      Capability::Loyalty => self.loyalty_access.as_ref(),
      Capability::Instructor => self.instructor_access.as_ref(),
      Capability::Team => self.team_access.as_ref(),
      Capability::Management => self.management_rights.as_ref(),
    }
  }

  fn grant_slot(&mut self, capability: Capability) -> &mut Option<AccessGrant> {
    match capability {
      Capability::Loyalty => &mut self.loyalty_access,
      Capability::Instructor => &mut self.instructor_access,
      Capability::Team => &mut self.team_access,
      Capability::Management => &mut self.management_rights,
    }
  }

  pub fn has_access(&self, capability: Capability) -> bool {
    self.grant(capability).is_some_and(|g| g.has_access)
  }

  // ── Mutations ───────────────────────────────────────────────────────────

  /// Grant `capability`. The first loyalty grant also enrolls the profile:
  /// it stamps `join_date`, zeroes both balances and opens a counter for the
  /// current year. Re-granting after a revoke keeps the existing ledger.
  pub fn apply_grant(
    &mut self,
    capability: Capability,
    granted_by: &str,
    now: DateTime<Utc>,
  ) -> Result<()> {
    if self.has_access(capability) {
      return Err(Error::AlreadyGranted { uid: self.uid, capability });
    }

    if capability == Capability::Loyalty && !self.is_enrolled() {
      self.join_date = Some(now);
      self.lifetime_points = 0;
      self.redeemable_points = 0;
      self.yearly_points_earned.insert(now.year(), 0);
    }

    *self.grant_slot(capability) = Some(AccessGrant {
      has_access: true,
      granted_at: now,
      granted_by: granted_by.to_owned(),
    });
    Ok(())
  }

  /// Remove a grant. Loyalty history is left in place.
  pub fn apply_revoke(&mut self, capability: Capability) {
    *self.grant_slot(capability) = None;
  }

  /// Credit already-multiplied `points` earned during `year`.
  pub fn apply_credit(&mut self, year: i32, points: u64) -> Result<()> {
    if !self.is_enrolled() {
      return Err(Error::NotEnrolled(self.uid));
    }
    self.lifetime_points = self.lifetime_points.saturating_add(points);
    self.redeemable_points = self.redeemable_points.saturating_add(points);
    let counter = self.yearly_points_earned.entry(year).or_insert(0);
    *counter = counter.saturating_add(points);
    Ok(())
  }

  /// Spend `points` from the redeemable balance.
  pub fn apply_redemption(&mut self, points: u64) -> Result<()> {
    if !self.is_enrolled() {
      return Err(Error::NotEnrolled(self.uid));
    }
    if points > self.redeemable_points {
      return Err(Error::InsufficientPoints {
        uid:       self.uid,
        requested: points,
        available: self.redeemable_points,
      });
    }
    self.redeemable_points -= points;
    Ok(())
  }

  /// Write back a yearly reduction computed by
  /// [`crate::maintenance::compute_reductions`].
  pub fn apply_update(&mut self, update: &ProfileUpdate) {
    self.lifetime_points = update.lifetime_points;
    self.redeemable_points = update.redeemable_points;
    self.last_expiration_check = Some(update.checked_at);
    self
      .points_expirations
      .insert(update.year, update.expiration.clone());
    self.yearly_points_earned.insert(update.year, 0);
  }

  /// Parse a profile exported from the hosted document database.
  ///
  /// Missing or `null` loyalty fields fall back to their defaults. Point
  /// values must be non-negative integers.
  pub fn from_document(document: serde_json::Value) -> Result<Self> {
    let doc: document::ProfileDocument = serde_json::from_value(document)
      .map_err(|e| Error::MalformedDocument(e.to_string()))?;
    doc.into_profile()
  }
}

// ─── Document migration ──────────────────────────────────────────────────────

mod document {
  use std::collections::BTreeMap;

  use chrono::{DateTime, TimeZone as _, Utc};
  use serde::{Deserialize, Deserializer};
  use uuid::Uuid;

  use super::{AccessGrant, PointsExpiration, Profile};
  use crate::{Error, Result};

  /// Timestamps arrive either as RFC 3339 strings or as exported
  /// `{seconds, nanoseconds}` objects (with or without leading underscores).
  #[derive(Deserialize)]
  #[serde(untagged)]
  pub(super) enum DocTimestamp {
    Rfc3339(DateTime<Utc>),
    Parts {
      #[serde(alias = "_seconds")]
      seconds:     i64,
      #[serde(default, alias = "_nanoseconds")]
      nanoseconds: u32,
    },
  }

  impl DocTimestamp {
    fn resolve(self) -> Result<DateTime<Utc>> {
      match self {
        DocTimestamp::Rfc3339(dt) => Ok(dt),
        DocTimestamp::Parts { seconds, nanoseconds } => Utc
          .timestamp_opt(seconds, nanoseconds)
          .single()
          .ok_or_else(|| {
            Error::MalformedDocument(format!("timestamp out of range: {seconds}"))
          }),
      }
    }
  }

  fn null_as_default<'de, D, T>(de: D) -> std::result::Result<T, D::Error>
  where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
  {
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
  }

  #[derive(Deserialize)]
  #[serde(rename_all = "camelCase")]
  pub(super) struct GrantDocument {
    #[serde(default)]
    has_access: bool,
    granted_at: Option<DocTimestamp>,
    #[serde(default, deserialize_with = "null_as_default")]
    granted_by: String,
  }

  #[derive(Deserialize)]
  #[serde(rename_all = "camelCase")]
  pub(super) struct ExpirationDocument {
    points_reduced: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    reason:         String,
    date:           DocTimestamp,
  }

  #[derive(Deserialize)]
  #[serde(rename_all = "camelCase")]
  pub(super) struct ProfileDocument {
    uid:                   Uuid,
    display_name:          Option<String>,
    email:                 Option<String>,
    created_at:            Option<DocTimestamp>,
    #[serde(default, deserialize_with = "null_as_default")]
    lifetime_points:       u64,
    #[serde(default, deserialize_with = "null_as_default")]
    redeemable_points:     u64,
    join_date:             Option<DocTimestamp>,
    #[serde(default, deserialize_with = "null_as_default")]
    yearly_points_earned:  BTreeMap<i32, u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    points_expirations:    BTreeMap<i32, ExpirationDocument>,
    last_expiration_check: Option<DocTimestamp>,
    loyalty_access:        Option<GrantDocument>,
    instructor_access:     Option<GrantDocument>,
    team_access:           Option<GrantDocument>,
    management_rights:     Option<GrantDocument>,
  }

  fn resolve_opt(ts: Option<DocTimestamp>) -> Result<Option<DateTime<Utc>>> {
    ts.map(DocTimestamp::resolve).transpose()
  }

  /// A grant without a timestamp predates auditing; stamp it with the
  /// profile's creation time so it stays representable.
  fn resolve_grant(
    grant: Option<GrantDocument>,
    fallback: DateTime<Utc>,
  ) -> Result<Option<AccessGrant>> {
    grant
      .map(|g| {
        Ok(AccessGrant {
          has_access: g.has_access,
          granted_at: resolve_opt(g.granted_at)?.unwrap_or(fallback),
          granted_by: g.granted_by,
        })
      })
      .transpose()
  }

  impl ProfileDocument {
    pub(super) fn into_profile(self) -> Result<Profile> {
      let join_date = resolve_opt(self.join_date)?;
      let created_at = resolve_opt(self.created_at)?
        .or(join_date)
        .unwrap_or_else(Utc::now);

      let points_expirations = self
        .points_expirations
        .into_iter()
        .map(|(year, e)| {
          Ok((year, PointsExpiration {
            points_reduced: e.points_reduced,
            reason:         e.reason,
            date:           e.date.resolve()?,
          }))
        })
        .collect::<Result<_>>()?;

      Ok(Profile {
        uid: self.uid,
        display_name: self.display_name,
        email: self.email,
        created_at,
        lifetime_points: self.lifetime_points,
        redeemable_points: self.redeemable_points,
        join_date,
        yearly_points_earned: self.yearly_points_earned,
        points_expirations,
        last_expiration_check: resolve_opt(self.last_expiration_check)?,
        loyalty_access: resolve_grant(self.loyalty_access, created_at)?,
        instructor_access: resolve_grant(self.instructor_access, created_at)?,
        team_access: resolve_grant(self.team_access, created_at)?,
        management_rights: resolve_grant(self.management_rights, created_at)?,
      })
    }
  }
}
