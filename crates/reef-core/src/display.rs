//! Read model for the membership card and rewards page.
//!
//! Nothing here mutates a profile; [`LoyaltySummary`] is computed on every
//! read from the stored balances and the tier table.

use serde::{Deserialize, Serialize};

use crate::{profile::Profile, tier::Tier};

/// Everything the rewards page shows for one member in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltySummary {
  pub tier:                    Tier,
  pub tier_name:               String,
  pub multiplier:              f64,
  pub lifetime_points:         u64,
  pub redeemable_points:       u64,
  pub next_tier:               Option<Tier>,
  /// Points still needed to reach `next_tier`.
  pub points_to_next_tier:     Option<u64>,
  /// How far through the current band, 0–100. Always 100 at the top tier.
  pub tier_progress_percent:   f64,
  pub year:                    i32,
  pub points_earned_this_year: u64,
  pub yearly_requirement:      u64,
  pub yearly_remaining:        u64,
  /// The member has earned enough this year to avoid next year's reduction.
  pub tier_locked:             bool,
  pub exempt:                  bool,
}

impl LoyaltySummary {
  pub fn for_profile(profile: &Profile, year: i32) -> Self {
    let tier = profile.tier();
    let lifetime = profile.lifetime_points;
    let earned = profile.points_earned_in(year);
    let exempt = tier.is_exempt_from_yearly_minimum();
    let requirement = if exempt { 0 } else { tier.required_yearly_points() };

    let next_tier = tier.next();
    let points_to_next_tier =
      next_tier.map(|next| next.min_points().saturating_sub(lifetime));

    Self {
      tier,
      tier_name: tier.name().to_owned(),
      multiplier: tier.multiplier(),
      lifetime_points: lifetime,
      redeemable_points: profile.redeemable_points,
      next_tier,
      points_to_next_tier,
      tier_progress_percent: band_progress(tier, lifetime),
      year,
      points_earned_this_year: earned,
      yearly_requirement: requirement,
      yearly_remaining: requirement.saturating_sub(earned),
      tier_locked: exempt || earned >= requirement,
      exempt,
    }
  }
}

/// Percent progress from the bottom of `tier`'s band to the next tier's
/// minimum, rounded to one decimal.
fn band_progress(tier: Tier, lifetime: u64) -> f64 {
  let Some(next) = tier.next() else {
    return 100.0;
  };
  let span = (next.min_points() - tier.min_points()) as f64;
  let into = lifetime.saturating_sub(tier.min_points()) as f64;
  ((into / span) * 1000.0).round() / 10.0
}

/// Render a point total with thousands separators, e.g. `15,000`.
pub fn format_points(points: u64) -> String {
  let digits = points.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, ch) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(ch);
  }
  out
}
