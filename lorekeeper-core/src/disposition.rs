//! Disposition bands, NPC moods and relationship tiers
//!
//! A single banding function maps a signed standing in [-100, 100] to one of
//! seven ordered bands. NPC mood, relationship tier and the player's
//! reputation description are all projections of that band, so the
//! thresholds live in exactly one place.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest standing value (reputation, disposition)
pub const STANDING_MIN: i32 = -100;

/// Highest standing value (reputation, disposition)
pub const STANDING_MAX: i32 = 100;

/// Clamp an arbitrary (possibly overflowing) standing into [-100, 100]
pub fn clamp_standing(value: i64) -> i32 {
    value.clamp(STANDING_MIN as i64, STANDING_MAX as i64) as i32
}

/// Apply a delta to a standing and clamp the result
pub fn shift_standing(current: i32, delta: i32) -> i32 {
    clamp_standing(current as i64 + delta as i64)
}

/// Ordered bands over the standing range, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DispositionBand {
    /// standing < -50
    Hostile,
    /// -50 <= standing < -25
    Cold,
    /// -25 <= standing < 0
    Wary,
    /// 0 <= standing < 25
    Indifferent,
    /// 25 <= standing < 50
    Favorable,
    /// 50 <= standing < 75
    Warm,
    /// standing >= 75
    Devoted,
}

impl DispositionBand {
    /// Band for a standing value; total over all of `i32`
    pub fn of(standing: i32) -> Self {
        match standing {
            s if s >= 75 => DispositionBand::Devoted,
            s if s >= 50 => DispositionBand::Warm,
            s if s >= 25 => DispositionBand::Favorable,
            s if s >= 0 => DispositionBand::Indifferent,
            s if s >= -25 => DispositionBand::Wary,
            s if s >= -50 => DispositionBand::Cold,
            _ => DispositionBand::Hostile,
        }
    }

    /// NPC mood for this band
    pub fn mood(self) -> Mood {
        match self {
            DispositionBand::Devoted | DispositionBand::Warm => Mood::Friendly,
            DispositionBand::Favorable => Mood::Helpful,
            DispositionBand::Indifferent => Mood::Neutral,
            DispositionBand::Wary => Mood::Suspicious,
            DispositionBand::Cold => Mood::Unfriendly,
            DispositionBand::Hostile => Mood::Hostile,
        }
    }

    /// Relationship tier for this band
    pub fn tier(self) -> RelationshipTier {
        match self {
            DispositionBand::Devoted => RelationshipTier::CloseFriend,
            DispositionBand::Warm => RelationshipTier::Friend,
            DispositionBand::Favorable => RelationshipTier::Ally,
            DispositionBand::Indifferent => RelationshipTier::Acquaintance,
            DispositionBand::Wary => RelationshipTier::Stranger,
            DispositionBand::Cold => RelationshipTier::Rival,
            DispositionBand::Hostile => RelationshipTier::Enemy,
        }
    }

    /// How the world regards a player with this reputation
    pub fn reputation_label(self) -> &'static str {
        match self {
            DispositionBand::Devoted => "Heroic",
            DispositionBand::Warm => "Well-regarded",
            DispositionBand::Favorable => "Respected",
            DispositionBand::Indifferent => "Neutral",
            DispositionBand::Wary => "Mistrusted",
            DispositionBand::Cold => "Disliked",
            DispositionBand::Hostile => "Notorious",
        }
    }
}

/// Mood an NPC shows toward the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    /// disposition >= 50
    Friendly,
    /// disposition >= 25
    Helpful,
    /// disposition >= 0
    #[default]
    Neutral,
    /// disposition >= -25
    Suspicious,
    /// disposition >= -50
    Unfriendly,
    /// anything lower
    Hostile,
}

impl Mood {
    /// Mood derived from a disposition value
    pub fn from_disposition(disposition: i32) -> Self {
        DispositionBand::of(disposition).mood()
    }

    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Friendly => "friendly",
            Mood::Helpful => "helpful",
            Mood::Neutral => "neutral",
            Mood::Suspicious => "suspicious",
            Mood::Unfriendly => "unfriendly",
            Mood::Hostile => "hostile",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship tier shown to the prompt consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipTier {
    /// disposition >= 75
    CloseFriend,
    /// disposition >= 50
    Friend,
    /// disposition >= 25
    Ally,
    /// disposition >= 0
    Acquaintance,
    /// disposition >= -25
    Stranger,
    /// disposition >= -50
    Rival,
    /// anything lower
    Enemy,
}

impl RelationshipTier {
    /// Tier derived from a disposition value
    pub fn from_disposition(disposition: i32) -> Self {
        DispositionBand::of(disposition).tier()
    }

    /// Stable snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipTier::CloseFriend => "close_friend",
            RelationshipTier::Friend => "friend",
            RelationshipTier::Ally => "ally",
            RelationshipTier::Acquaintance => "acquaintance",
            RelationshipTier::Stranger => "stranger",
            RelationshipTier::Rival => "rival",
            RelationshipTier::Enemy => "enemy",
        }
    }
}

impl fmt::Display for RelationshipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reputation description for the prompt header
pub fn reputation_description(reputation: i32) -> &'static str {
    DispositionBand::of(reputation).reputation_label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_standing() {
        assert_eq!(clamp_standing(150), 100);
        assert_eq!(clamp_standing(-150), -100);
        assert_eq!(clamp_standing(42), 42);
        assert_eq!(shift_standing(90, i32::MAX), 100);
        assert_eq!(shift_standing(-90, i32::MIN), -100);
    }

    #[test]
    fn test_mood_thresholds() {
        let cases = [
            (100, Mood::Friendly),
            (50, Mood::Friendly),
            (49, Mood::Helpful),
            (25, Mood::Helpful),
            (24, Mood::Neutral),
            (0, Mood::Neutral),
            (-1, Mood::Suspicious),
            (-25, Mood::Suspicious),
            (-26, Mood::Unfriendly),
            (-50, Mood::Unfriendly),
            (-51, Mood::Hostile),
            (-100, Mood::Hostile),
        ];
        for (disposition, expected) in cases {
            assert_eq!(
                Mood::from_disposition(disposition),
                expected,
                "disposition {}",
                disposition
            );
        }
    }

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(RelationshipTier::from_disposition(75), RelationshipTier::CloseFriend);
        assert_eq!(RelationshipTier::from_disposition(74), RelationshipTier::Friend);
        assert_eq!(RelationshipTier::from_disposition(30), RelationshipTier::Ally);
        assert_eq!(RelationshipTier::from_disposition(0), RelationshipTier::Acquaintance);
        assert_eq!(RelationshipTier::from_disposition(-10), RelationshipTier::Stranger);
        assert_eq!(RelationshipTier::from_disposition(-40), RelationshipTier::Rival);
        assert_eq!(RelationshipTier::from_disposition(-99), RelationshipTier::Enemy);
    }

    #[test]
    fn test_reputation_description() {
        assert_eq!(reputation_description(80), "Heroic");
        assert_eq!(reputation_description(0), "Neutral");
        assert_eq!(reputation_description(-60), "Notorious");
    }

    #[test]
    fn test_bands_are_monotonic() {
        let mut previous = DispositionBand::of(STANDING_MIN);
        for standing in STANDING_MIN..=STANDING_MAX {
            let band = DispositionBand::of(standing);
            assert!(band >= previous);
            previous = band;
        }
    }

    #[test]
    fn test_labels_serialize_snake_case() {
        assert_eq!(serde_json::to_string(&Mood::Unfriendly).unwrap(), "\"unfriendly\"");
        assert_eq!(
            serde_json::to_string(&RelationshipTier::CloseFriend).unwrap(),
            "\"close_friend\""
        );
    }
}
