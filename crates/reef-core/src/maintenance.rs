//! Yearly minimum-activity check: the pure half of the maintenance job.
//!
//! Each enrolled member must earn a share of their tier's minimum during the
//! previous calendar year. Members who fall short lose a tenth of their
//! lifetime points (rounded up), taken from the redeemable balance as far as
//! it goes. Nothing here touches a store; [`crate::job::YearlyCheck`] is the
//! I/O shell around [`plan`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  profile::{PointsExpiration, Profile},
  tier::Tier,
};

/// Share of lifetime points removed on a missed year, in percent.
pub const REDUCTION_PERCENT: u64 = 10;

// ─── Per-profile assessment ──────────────────────────────────────────────────

/// The outcome of checking one profile for `current_year`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
  /// No `join_date`; not part of the loyalty program.
  NotEnrolled,
  /// Less than one full calendar year since enrollment.
  JoinedThisYear,
  /// A reduction for `current_year` is already on record.
  AlreadyReduced,
  /// The tier carries no yearly requirement.
  Exempt(Tier),
  RequirementMet {
    tier:     Tier,
    required: u64,
    earned:   u64,
  },
  Reduce(Reduction),
}

/// A reduction decided for one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
  pub tier:               Tier,
  pub required:           u64,
  pub earned:             u64,
  pub points_reduced:     u64,
  pub redeemable_reduced: u64,
}

/// Reason recorded alongside a reduction.
pub fn reduction_reason(required: u64) -> String {
  format!("Did not meet minimum yearly requirement of {required} points")
}

/// `ceil(lifetime_points * 10%)`; zero only when the balance is zero.
pub fn reduction_for(lifetime_points: u64) -> u64 {
  lifetime_points.div_ceil(100 / REDUCTION_PERCENT)
}

/// Decide what the yearly check does to `profile` in `current_year`.
pub fn assess(profile: &Profile, current_year: i32) -> Assessment {
  let Some(join_year) = profile.join_year() else {
    return Assessment::NotEnrolled;
  };
  if current_year - join_year < 1 {
    return Assessment::JoinedThisYear;
  }
  if profile.points_expirations.contains_key(&current_year) {
    return Assessment::AlreadyReduced;
  }

  let tier = profile.tier();
  if tier.is_exempt_from_yearly_minimum() {
    return Assessment::Exempt(tier);
  }

  let required = tier.required_yearly_points();
  let earned = profile.points_earned_in(current_year - 1);
  if earned >= required {
    return Assessment::RequirementMet { tier, required, earned };
  }

  let points_reduced = reduction_for(profile.lifetime_points);
  Assessment::Reduce(Reduction {
    tier,
    required,
    earned,
    points_reduced,
    redeemable_reduced: profile.redeemable_points.min(points_reduced),
  })
}

// ─── Batch writes ────────────────────────────────────────────────────────────

/// One profile's write-back, applied atomically with the rest of the run.
///
/// Balances are absolute values computed from the job's read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
  pub uid:               Uuid,
  /// The year being checked; keys the expiration entry and the counter reset.
  pub year:              i32,
  pub lifetime_points:   u64,
  pub redeemable_points: u64,
  pub checked_at:        DateTime<Utc>,
  pub expiration:        PointsExpiration,
}

impl ProfileUpdate {
  fn new(
    profile: &Profile,
    reduction: &Reduction,
    year: i32,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      uid: profile.uid,
      year,
      lifetime_points: profile.lifetime_points - reduction.points_reduced,
      redeemable_points: profile.redeemable_points
        - reduction.redeemable_reduced,
      checked_at: now,
      expiration: PointsExpiration {
        points_reduced: reduction.points_reduced,
        reason:         reduction_reason(reduction.required),
        date:           now,
      },
    }
  }
}

/// Per-outcome counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTally {
  pub scanned:          usize,
  pub not_enrolled:     usize,
  pub joined_this_year: usize,
  pub already_reduced:  usize,
  pub exempt:           usize,
  pub met:              usize,
  pub reduced:          usize,
  pub points_reduced:   u64,
}

/// Everything a run intends to write, plus how each profile was classified.
#[derive(Debug, Clone, Default)]
pub struct YearlyPlan {
  pub updates: Vec<ProfileUpdate>,
  pub tally:   CheckTally,
}

/// Assess every profile and collect the writes.
pub fn plan(
  profiles: &[Profile],
  current_year: i32,
  now: DateTime<Utc>,
) -> YearlyPlan {
  let mut out = YearlyPlan::default();

  for profile in profiles {
    out.tally.scanned += 1;
    match assess(profile, current_year) {
      Assessment::NotEnrolled => out.tally.not_enrolled += 1,
      Assessment::JoinedThisYear => out.tally.joined_this_year += 1,
      Assessment::AlreadyReduced => out.tally.already_reduced += 1,
      Assessment::Exempt(_) => out.tally.exempt += 1,
      Assessment::RequirementMet { .. } => out.tally.met += 1,
      Assessment::Reduce(reduction) => {
        tracing::debug!(
          uid = %profile.uid,
          tier = %reduction.tier,
          earned = reduction.earned,
          required = reduction.required,
          points_reduced = reduction.points_reduced,
          "yearly requirement missed"
        );
        out.tally.reduced += 1;
        out.tally.points_reduced += reduction.points_reduced;
        out
          .updates
          .push(ProfileUpdate::new(profile, &reduction, current_year, now));
      }
    }
  }

  out
}

/// The writes the yearly check would make for `profiles`.
pub fn compute_reductions(
  profiles: &[Profile],
  current_year: i32,
  now: DateTime<Utc>,
) -> Vec<ProfileUpdate> {
  plan(profiles, current_year, now).updates
}
