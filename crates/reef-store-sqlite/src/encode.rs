//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings. Point totals are `u64` in the domain and `INTEGER`
//! (`i64`) in SQLite; conversions are checked both ways.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reef_core::profile::{AccessGrant, Capability, PointsExpiration, Profile};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Points ───────────────────────────────────────────────────────────────────

pub fn encode_points(points: u64) -> Result<i64> {
  i64::try_from(points)
    .map_err(|_| Error::Decode(format!("point total too large: {points}")))
}

pub fn decode_points(raw: i64) -> Result<u64> {
  u64::try_from(raw)
    .map_err(|_| Error::Decode(format!("negative point total: {raw}")))
}

// ─── Capability ───────────────────────────────────────────────────────────────

pub fn encode_capability(c: Capability) -> String { c.to_string() }

pub fn decode_capability(s: &str) -> Result<Capability> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown capability: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `profiles` row.
pub struct RawProfile {
  pub uid:                   String,
  pub display_name:          Option<String>,
  pub email:                 Option<String>,
  pub created_at:            String,
  pub lifetime_points:       i64,
  pub redeemable_points:     i64,
  pub join_date:             Option<String>,
  pub last_expiration_check: Option<String>,
}

/// Raw values from a `points_expirations` row.
pub struct RawExpiration {
  pub year:           i32,
  pub points_reduced: i64,
  pub reason:         String,
  pub recorded_at:    String,
}

/// Raw values from an `access_grants` row.
pub struct RawGrant {
  pub capability: String,
  pub has_access: bool,
  pub granted_at: String,
  pub granted_by: String,
}

/// A profile row together with its child rows.
pub struct RawProfileBundle {
  pub profile:     RawProfile,
  /// `(year, points)` pairs from `yearly_points`.
  pub yearly:      Vec<(i32, i64)>,
  pub expirations: Vec<RawExpiration>,
  pub grants:      Vec<RawGrant>,
}

impl RawProfileBundle {
  pub fn into_profile(self) -> Result<Profile> {
    let raw = self.profile;

    let yearly_points_earned = self
      .yearly
      .into_iter()
      .map(|(year, points)| Ok((year, decode_points(points)?)))
      .collect::<Result<BTreeMap<_, _>>>()?;

    let points_expirations = self
      .expirations
      .into_iter()
      .map(|e| {
        Ok((e.year, PointsExpiration {
          points_reduced: decode_points(e.points_reduced)?,
          reason:         e.reason,
          date:           decode_dt(&e.recorded_at)?,
        }))
      })
      .collect::<Result<BTreeMap<_, _>>>()?;

    let mut profile = Profile {
      uid:                   decode_uuid(&raw.uid)?,
      display_name:          raw.display_name,
      email:                 raw.email,
      created_at:            decode_dt(&raw.created_at)?,
      lifetime_points:       decode_points(raw.lifetime_points)?,
      redeemable_points:     decode_points(raw.redeemable_points)?,
      join_date:             decode_opt_dt(raw.join_date.as_deref())?,
      yearly_points_earned,
      points_expirations,
      last_expiration_check: decode_opt_dt(
        raw.last_expiration_check.as_deref(),
      )?,
      loyalty_access:        None,
      instructor_access:     None,
      team_access:           None,
      management_rights:     None,
    };

    for g in self.grants {
      let grant = AccessGrant {
        has_access: g.has_access,
        granted_at: decode_dt(&g.granted_at)?,
        granted_by: g.granted_by,
      };
      match decode_capability(&g.capability)? {
        Capability::Loyalty => profile.loyalty_access = Some(grant),
        Capability::Instructor => profile.instructor_access = Some(grant),
        Capability::Team => profile.team_access = Some(grant),
        Capability::Management => profile.management_rights = Some(grant),
      }
    }

    Ok(profile)
  }
}

/// Column values ready to bind for a profile write.
pub struct ProfileRow {
  pub uid:                   String,
  pub display_name:          Option<String>,
  pub email:                 Option<String>,
  pub created_at:            String,
  pub lifetime_points:       i64,
  pub redeemable_points:     i64,
  pub join_date:             Option<String>,
  pub last_expiration_check: Option<String>,
  pub yearly:                Vec<(i32, i64)>,
  /// `(year, points_reduced, reason, recorded_at)`.
  pub expirations:           Vec<(i32, i64, String, String)>,
  /// `(capability, has_access, granted_at, granted_by)`.
  pub grants:                Vec<(String, bool, String, String)>,
}

impl ProfileRow {
  pub fn encode(profile: &Profile) -> Result<Self> {
    let yearly = profile
      .yearly_points_earned
      .iter()
      .map(|(&year, &points)| Ok((year, encode_points(points)?)))
      .collect::<Result<_>>()?;

    let expirations = profile
      .points_expirations
      .iter()
      .map(|(&year, e)| {
        Ok((
          year,
          encode_points(e.points_reduced)?,
          e.reason.clone(),
          encode_dt(e.date),
        ))
      })
      .collect::<Result<_>>()?;

    let grants = [
      (Capability::Loyalty, &profile.loyalty_access),
      (Capability::Instructor, &profile.instructor_access),
      (Capability::Team, &profile.team_access),
      (Capability::Management, &profile.management_rights),
    ]
    .into_iter()
    .filter_map(|(cap, grant)| {
      grant.as_ref().map(|g| {
        (
          encode_capability(cap),
          g.has_access,
          encode_dt(g.granted_at),
          g.granted_by.clone(),
        )
      })
    })
    .collect();

    Ok(Self {
      uid: encode_uuid(profile.uid),
      display_name: profile.display_name.clone(),
      email: profile.email.clone(),
      created_at: encode_dt(profile.created_at),
      lifetime_points: encode_points(profile.lifetime_points)?,
      redeemable_points: encode_points(profile.redeemable_points)?,
      join_date: profile.join_date.map(encode_dt),
      last_expiration_check: profile.last_expiration_check.map(encode_dt),
      yearly,
      expirations,
      grants,
    })
  }
}
