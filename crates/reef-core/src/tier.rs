//! Loyalty tiers, derived from lifetime points, never stored.
//!
//! The five bands are contiguous and non-overlapping, so every point total
//! maps to exactly one tier.

use serde::{Deserialize, Serialize};

/// Share of a tier's minimum that must be earned each calendar year, in
/// percent.
pub const YEARLY_REQUIREMENT_PERCENT: u64 = 10;

/// A loyalty tier, ordered from lowest to highest.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
  OceanicSilver,
  MarinerGold,
  NautilusPlatinum,
  TridentElite,
  LifetimeElite,
}

impl Tier {
  /// Every tier, lowest first.
  pub const ALL: [Tier; 5] = [
    Tier::OceanicSilver,
    Tier::MarinerGold,
    Tier::NautilusPlatinum,
    Tier::TridentElite,
    Tier::LifetimeElite,
  ];

  /// Return the tier whose range contains `lifetime_points`.
  ///
  /// Falls back to [`Tier::OceanicSilver`] if nothing matches, which cannot
  /// happen while the ranges stay contiguous from zero.
  pub fn for_points(lifetime_points: u64) -> Tier {
    Tier::ALL
      .into_iter()
      .find(|tier| tier.contains(lifetime_points))
      .unwrap_or(Tier::OceanicSilver)
  }

  pub fn name(self) -> &'static str {
    match self {
      Tier::OceanicSilver => "Oceanic Silver",
      Tier::MarinerGold => "Mariner Gold",
      Tier::NautilusPlatinum => "Nautilus Platinum",
      Tier::TridentElite => "Trident Elite",
      Tier::LifetimeElite => "Lifetime Elite",
    }
  }

  pub fn min_points(self) -> u64 {
    match self {
      Tier::OceanicSilver => 0,
      Tier::MarinerGold => 10_000,
      Tier::NautilusPlatinum => 20_000,
      Tier::TridentElite => 50_000,
      Tier::LifetimeElite => 100_000,
    }
  }

  /// Inclusive upper bound; `None` for the open-ended top tier.
  pub fn max_points(self) -> Option<u64> {
    self.next().map(|next| next.min_points() - 1)
  }

  /// Earning multiplier in tenths, so arithmetic stays integral.
  fn multiplier_tenths(self) -> u64 {
    match self {
      Tier::OceanicSilver => 10,
      Tier::MarinerGold => 12,
      Tier::NautilusPlatinum => 15,
      Tier::TridentElite | Tier::LifetimeElite => 20,
    }
  }

  pub fn multiplier(self) -> f64 { self.multiplier_tenths() as f64 / 10.0 }

  /// Points earned for `base_points` of activity at this tier, rounded down.
  pub fn apply_multiplier(self, base_points: u64) -> u64 {
    base_points.saturating_mul(self.multiplier_tenths()) / 10
  }

  pub fn next(self) -> Option<Tier> {
    match self {
      Tier::OceanicSilver => Some(Tier::MarinerGold),
      Tier::MarinerGold => Some(Tier::NautilusPlatinum),
      Tier::NautilusPlatinum => Some(Tier::TridentElite),
      Tier::TridentElite => Some(Tier::LifetimeElite),
      Tier::LifetimeElite => None,
    }
  }

  pub fn contains(self, points: u64) -> bool {
    points >= self.min_points()
      && self.max_points().is_none_or(|max| points <= max)
  }

  /// Lifetime Elite members keep their status without yearly activity.
  pub fn is_exempt_from_yearly_minimum(self) -> bool {
    matches!(self, Tier::LifetimeElite)
  }

  /// Points a member of this tier must earn per calendar year: a fixed share
  /// of the tier's minimum, independent of where in the band they sit.
  pub fn required_yearly_points(self) -> u64 {
    self.min_points() * YEARLY_REQUIREMENT_PERCENT / 100
  }
}

impl std::fmt::Display for Tier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// A tier with its resolved range, as shown on the rewards page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDescriptor {
  pub tier:                   Tier,
  pub name:                   String,
  pub min_points:             u64,
  pub max_points:             Option<u64>,
  pub multiplier:             f64,
  pub required_yearly_points: u64,
}

impl From<Tier> for TierDescriptor {
  fn from(tier: Tier) -> Self {
    Self {
      tier,
      name: tier.name().to_owned(),
      min_points: tier.min_points(),
      max_points: tier.max_points(),
      multiplier: tier.multiplier(),
      required_yearly_points: tier.required_yearly_points(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn boundaries() {
    assert_eq!(Tier::for_points(0), Tier::OceanicSilver);
    assert_eq!(Tier::for_points(9_999), Tier::OceanicSilver);
    assert_eq!(Tier::for_points(10_000), Tier::MarinerGold);
    assert_eq!(Tier::for_points(19_999), Tier::MarinerGold);
    assert_eq!(Tier::for_points(20_000), Tier::NautilusPlatinum);
    assert_eq!(Tier::for_points(49_999), Tier::NautilusPlatinum);
    assert_eq!(Tier::for_points(50_000), Tier::TridentElite);
    assert_eq!(Tier::for_points(99_999), Tier::TridentElite);
    assert_eq!(Tier::for_points(100_000), Tier::LifetimeElite);
    assert_eq!(Tier::for_points(1_000_000), Tier::LifetimeElite);
    assert_eq!(Tier::for_points(u64::MAX), Tier::LifetimeElite);
  }

  #[test]
  fn exactly_one_tier_contains_each_value() {
    let samples = [
      0, 1, 5_000, 9_999, 10_000, 10_001, 19_999, 20_000, 35_000, 49_999,
      50_000, 75_000, 99_999, 100_000, 250_000,
    ];
    for points in samples {
      let matching: Vec<_> =
        Tier::ALL.iter().filter(|t| t.contains(points)).collect();
      assert_eq!(matching.len(), 1, "{points} matched {matching:?}");
      assert_eq!(*matching[0], Tier::for_points(points));
    }
  }

  #[test]
  fn ranges_are_contiguous() {
    for pair in Tier::ALL.windows(2) {
      assert_eq!(pair[0].max_points(), Some(pair[1].min_points() - 1));
      assert_eq!(pair[0].next(), Some(pair[1]));
    }
    assert_eq!(Tier::LifetimeElite.max_points(), None);
  }

  #[test]
  fn yearly_requirement_is_ten_percent_of_minimum() {
    assert_eq!(Tier::OceanicSilver.required_yearly_points(), 0);
    assert_eq!(Tier::MarinerGold.required_yearly_points(), 1_000);
    assert_eq!(Tier::NautilusPlatinum.required_yearly_points(), 2_000);
    assert_eq!(Tier::TridentElite.required_yearly_points(), 5_000);
    assert!(Tier::LifetimeElite.is_exempt_from_yearly_minimum());
    assert!(!Tier::TridentElite.is_exempt_from_yearly_minimum());
  }

  #[test]
  fn multiplier_rounds_down() {
    assert_eq!(Tier::OceanicSilver.apply_multiplier(105), 105);
    assert_eq!(Tier::MarinerGold.apply_multiplier(105), 126);
    assert_eq!(Tier::NautilusPlatinum.apply_multiplier(3), 4);
    assert_eq!(Tier::TridentElite.apply_multiplier(250), 500);
    assert_eq!(Tier::MarinerGold.multiplier(), 1.2);
  }

  #[test]
  fn display_uses_marketing_name() {
    assert_eq!(Tier::NautilusPlatinum.to_string(), "Nautilus Platinum");
    let json = serde_json::to_string(&Tier::TridentElite).unwrap();
    assert_eq!(json, "\"trident_elite\"");
  }
}
