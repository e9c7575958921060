//! Structured session summary handed to prompt consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mood::PlayerMood;
use crate::config::PromptConfig;
use crate::disposition::{Mood, RelationshipTier, reputation_description};
use crate::session::{NpcRelationship, Session};

/// An NPC as presented to the language model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcContext {
    /// NPC id
    pub id: String,
    /// Display name
    pub name: String,
    /// Attitude toward the player
    pub disposition: i32,
    /// Mood label
    pub mood: Mood,
    /// Relationship tier from the same disposition
    pub relationship: RelationshipTier,
    /// Most recently learned facts, oldest first
    pub known_facts: Vec<String>,
    /// "moments", "12 min", ...
    pub last_seen: String,
    /// Where the NPC was last seen
    pub location: String,
}

impl NpcContext {
    fn project(npc: &NpcRelationship, max_facts: usize, now: DateTime<Utc>) -> Self {
        let skip = npc.known_facts.len().saturating_sub(max_facts);
        Self {
            id: npc.npc_id.clone(),
            name: npc.name.clone(),
            disposition: npc.disposition,
            mood: npc.mood,
            relationship: npc.tier(),
            known_facts: npc.known_facts[skip..].to_vec(),
            last_seen: time_since(npc.last_interaction, now),
            location: npc.location.clone(),
        }
    }
}

/// Coarse facts about the player's footprint in the world
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Locations entered
    pub locations_visited: u32,
    /// Actions recorded
    pub total_actions: u32,
    /// At least one combat action
    pub combat_experienced: bool,
    /// More social than combat actions
    pub social_active: bool,
}

/// Bounded projection of a session for prompt building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Session id
    pub session_id: String,
    /// Current location
    pub current_location: String,
    /// Location before the last move, empty if none
    pub previous_location: String,
    /// "current/max"
    pub player_health: String,
    /// Reputation value
    pub player_reputation: i32,
    /// Reputation band label
    pub reputation_description: String,
    /// Latest actions as "type: command -> outcome", oldest first
    pub recent_actions: Vec<String>,
    /// NPCs interacted with recently, most recent first
    pub active_npcs: Vec<NpcContext>,
    /// Minutes since session creation
    pub session_duration_minutes: f64,
    /// Mood heuristic over the latest actions
    pub player_mood: PlayerMood,
    /// World footprint
    pub world_state: WorldState,
}

impl ContextSummary {
    /// Summarize `session` as of `now`
    pub fn build(session: &Session, config: &PromptConfig, now: DateTime<Utc>) -> Self {
        let recent_actions = session
            .recent_actions(config.summary_actions)
            .map(|a| format!("{}: {} -> {}", a.kind, a.command, a.outcome))
            .collect();

        let stats = &session.stats;
        Self {
            session_id: session.session_id.clone(),
            current_location: session.location.current.clone(),
            previous_location: session.location.previous.clone(),
            player_health: session.character.health.to_string(),
            player_reputation: session.character.reputation,
            reputation_description: reputation_description(session.character.reputation).to_string(),
            recent_actions,
            active_npcs: active_npcs(session, config, now),
            session_duration_minutes: session.duration_minutes(now),
            player_mood: PlayerMood::assess(session.recent_actions(config.mood_window)),
            world_state: WorldState {
                locations_visited: stats.locations_visited,
                total_actions: stats.total_actions,
                combat_experienced: stats.combat_actions > 0,
                social_active: stats.social_actions > stats.combat_actions,
            },
        }
    }
}

/// NPCs whose last interaction falls inside the active window, most recent
/// first, capped
pub fn active_npcs(session: &Session, config: &PromptConfig, now: DateTime<Utc>) -> Vec<NpcContext> {
    let window = chrono::Duration::from_std(config.active_npc_window).unwrap_or(chrono::Duration::MAX);

    let mut recent: Vec<&NpcRelationship> = session
        .npcs
        .values()
        .filter(|npc| now.signed_duration_since(npc.last_interaction) < window)
        .collect();
    recent.sort_by(|a, b| {
        b.last_interaction
            .cmp(&a.last_interaction)
            .then_with(|| a.npc_id.cmp(&b.npc_id))
    });

    recent
        .into_iter()
        .take(config.max_active_npcs)
        .map(|npc| NpcContext::project(npc, config.max_facts_per_npc, now))
        .collect()
}

/// Coarse elapsed time: "moments", "N min", "N hr" or "N days"
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    if elapsed < chrono::Duration::minutes(1) {
        "moments".to_string()
    } else if elapsed < chrono::Duration::hours(1) {
        format!("{} min", elapsed.num_minutes())
    } else if elapsed < chrono::Duration::days(1) {
        format!("{} hr", elapsed.num_hours())
    } else {
        format!("{} days", elapsed.num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_since() {
        let now = Utc::now();
        assert_eq!(time_since(now, now), "moments");
        assert_eq!(time_since(now + Duration::minutes(5), now), "moments");
        assert_eq!(time_since(now - Duration::minutes(12), now), "12 min");
        assert_eq!(time_since(now - Duration::hours(3), now), "3 hr");
        assert_eq!(time_since(now - Duration::days(2), now), "2 days");
    }

    #[test]
    fn test_active_npcs_window_and_caps() {
        let now = Utc::now();
        let mut session = Session::new("s1", "p1", "Aragorn", now - Duration::days(3));
        session.interact_with_npc("old", "Old Tom", 10, ["x"], now - Duration::hours(30));
        session.interact_with_npc("bob", "Bob", 60, ["a", "b", "c"], now - Duration::hours(2));
        session.interact_with_npc("ann", "Ann", -60, Vec::<String>::new(), now - Duration::minutes(5));

        let config = PromptConfig {
            max_facts_per_npc: 2,
            ..PromptConfig::default()
        };
        let npcs = active_npcs(&session, &config, now);

        let ids: Vec<_> = npcs.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["ann", "bob"]);
        assert_eq!(npcs[0].relationship, RelationshipTier::Enemy);
        assert_eq!(npcs[0].mood, Mood::Hostile);
        assert_eq!(npcs[1].known_facts, vec!["b", "c"]);
        assert_eq!(npcs[1].last_seen, "2 hr");

        let capped = PromptConfig {
            max_active_npcs: 1,
            ..PromptConfig::default()
        };
        assert_eq!(active_npcs(&session, &capped, now).len(), 1);
    }

    #[test]
    fn test_summary_shape() {
        let now = Utc::now();
        let session = Session::new("s1", "p1", "Aragorn", now);
        let summary = ContextSummary::build(&session, &PromptConfig::default(), now);

        assert_eq!(summary.current_location, "starting_village");
        assert_eq!(summary.player_health, "20/20");
        assert_eq!(summary.reputation_description, "Neutral");
        assert!(summary.recent_actions.is_empty());
        assert_eq!(summary.player_mood, PlayerMood::Curious);
        assert_eq!(summary.world_state.locations_visited, 1);
        assert!(!summary.world_state.combat_experienced);
    }
}
