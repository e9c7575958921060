//! Session state: the root aggregate tracked per player play-through
//!
//! A [`Session`] bundles the character sheet, location history, the bounded
//! action log, NPC relationships and running statistics. All mutation goes
//! through methods here so the clamping and bounding invariants are enforced
//! in one place, whichever path (event pipeline or direct mutator) drives it.

mod action;
mod character;
mod location;
mod npc;

pub use action::{ActionCategory, ActionEvent, ActionRequest, parse_command};
pub use character::{Character, DEFAULT_MAX_HEALTH, EquipmentItem, Health, InventoryItem};
pub use location::{LocationState, LocationVisit};
pub use npc::NpcRelationship;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Location every explicitly created session starts in
pub const STARTING_LOCATION: &str = "starting_village";

/// Incremental counters over a session's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Every recorded action
    pub total_actions: u32,
    /// Combat actions
    pub combat_actions: u32,
    /// Social actions
    pub social_actions: u32,
    /// Exploration actions
    pub explore_actions: u32,
    /// Locations entered, including the starting one
    pub locations_visited: u32,
    /// Distinct NPCs interacted with
    pub npcs_met: u32,
}

impl SessionStats {
    /// Count one action of the given category
    pub fn count(&mut self, category: ActionCategory) {
        self.total_actions += 1;
        match category {
            ActionCategory::Combat => self.combat_actions += 1,
            ActionCategory::Social => self.social_actions += 1,
            ActionCategory::Explore => self.explore_actions += 1,
            ActionCategory::Other => {}
        }
    }
}

/// Complete tracked state of one player's play-through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique session id
    pub session_id: String,
    /// Player that owns the session
    #[serde(default)]
    pub player_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub last_update: DateTime<Utc>,
    /// Character sheet
    pub character: Character,
    /// Location state and history
    pub location: LocationState,
    /// Most recent actions, oldest first
    #[serde(default)]
    pub actions: VecDeque<ActionEvent>,
    /// NPC relationships keyed by npc id
    #[serde(default)]
    pub npcs: BTreeMap<String, NpcRelationship>,
    /// Running counters
    #[serde(default)]
    pub stats: SessionStats,
}

impl Session {
    /// A fully seeded session for a new player
    pub fn new(
        session_id: impl Into<String>,
        player_id: impl Into<String>,
        character_name: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            player_id: player_id.into(),
            created_at: at,
            last_update: at,
            character: Character::new(character_name),
            location: LocationState::starting_at(STARTING_LOCATION, at),
            actions: VecDeque::new(),
            npcs: BTreeMap::new(),
            stats: SessionStats {
                locations_visited: 1,
                ..SessionStats::default()
            },
        }
    }

    /// A bare session synthesized for an id nobody has seen before
    pub fn skeleton(session_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            player_id: String::new(),
            created_at: at,
            last_update: at,
            character: Character::unnamed(),
            location: LocationState::unknown(at),
            actions: VecDeque::new(),
            npcs: BTreeMap::new(),
            stats: SessionStats::default(),
        }
    }

    /// Stamp the last-update time
    pub fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_update {
            self.last_update = at;
        }
    }

    /// Append an action, evicting the oldest entries beyond `bound`
    pub fn push_action(&mut self, action: ActionEvent, bound: usize) {
        self.actions.push_back(action);
        while self.actions.len() > bound {
            self.actions.pop_front();
        }
    }

    /// Up to `count` most recent actions, oldest first
    pub fn recent_actions(&self, count: usize) -> impl Iterator<Item = &ActionEvent> {
        self.actions.iter().skip(self.actions.len().saturating_sub(count))
    }

    /// Move the player; a no-op when already there
    pub fn move_to(&mut self, location: &str, at: DateTime<Utc>) {
        if self.location.move_to(location, at) {
            self.stats.locations_visited += 1;
        }
        self.touch(at);
    }

    /// Shift health by `delta`, clamped to [0, max]
    pub fn adjust_health(&mut self, delta: i32, at: DateTime<Utc>) {
        self.character.health.adjust(delta);
        self.touch(at);
    }

    /// Shift reputation by `delta`, clamped to [-100, 100]
    pub fn adjust_reputation(&mut self, delta: i32, at: DateTime<Utc>) {
        self.character.adjust_reputation(delta);
        self.touch(at);
    }

    /// Record an interaction with an NPC, meeting them first if needed
    pub fn interact_with_npc<I, S>(
        &mut self,
        npc_id: &str,
        name: &str,
        delta: i32,
        facts: I,
        at: DateTime<Utc>,
    ) -> &NpcRelationship
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let location = self.location.current.clone();
        if !self.npcs.contains_key(npc_id) {
            self.stats.npcs_met += 1;
        }
        self.last_update = self.last_update.max(at);

        let npc = self
            .npcs
            .entry(npc_id.to_string())
            .or_insert_with(|| NpcRelationship::meet(npc_id, name, location.clone(), at));
        npc.interact(delta, facts, &location, at);
        npc
    }

    /// Minutes since the session was created
    pub fn duration_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 60.0
    }
}
