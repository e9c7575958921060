//! Relationship records between the player and NPCs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::disposition::{Mood, RelationshipTier, shift_standing};

/// How one NPC regards the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcRelationship {
    /// NPC id
    pub npc_id: String,
    /// Display name
    pub name: String,
    /// Attitude toward the player, clamped to [-100, 100]
    pub disposition: i32,
    /// First interaction
    pub first_met: DateTime<Utc>,
    /// Most recent interaction
    pub last_interaction: DateTime<Utc>,
    /// Number of interactions recorded
    pub interaction_count: u32,
    /// Facts the NPC knows, in learning order, without duplicates
    #[serde(default)]
    pub known_facts: Vec<String>,
    /// Mood derived from the disposition
    pub mood: Mood,
    /// Where the NPC was last seen
    #[serde(default)]
    pub location: String,
}

impl NpcRelationship {
    /// A neutral first meeting
    pub fn meet(
        npc_id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            npc_id: npc_id.into(),
            name: name.into(),
            disposition: 0,
            first_met: at,
            last_interaction: at,
            interaction_count: 0,
            known_facts: Vec::new(),
            mood: Mood::Neutral,
            location: location.into(),
        }
    }

    /// Record an interaction: shift disposition, learn new facts, and
    /// recompute mood from the post-update disposition.
    pub fn interact<I, S>(&mut self, delta: i32, facts: I, location: &str, at: DateTime<Utc>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disposition = shift_standing(self.disposition, delta);
        self.last_interaction = at;
        self.interaction_count += 1;
        self.location = location.to_string();
        for fact in facts {
            self.learn(fact);
        }
        self.mood = Mood::from_disposition(self.disposition);
    }

    /// Add a fact unless it is already known; returns true if it was new
    pub fn learn(&mut self, fact: impl Into<String>) -> bool {
        let fact = fact.into();
        if self.known_facts.contains(&fact) {
            return false;
        }
        self.known_facts.push(fact);
        true
    }

    /// Relationship tier from the current disposition
    pub fn tier(&self) -> RelationshipTier {
        RelationshipTier::from_disposition(self.disposition)
    }
}
