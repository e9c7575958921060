//! Structured prompt data: player profile, world knowledge, GM personality

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::summary::ContextSummary;
use crate::session::{ActionEvent, Session};

/// Overall play style from whole-session action ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayStyle {
    /// No categorized actions yet
    NewPlayer,
    /// Over half combat
    CombatFocused,
    /// Over 40% social
    RoleplayFocused,
    /// Over 40% exploration
    ExplorationFocused,
    /// None of the above
    Balanced,
}

/// How seasoned the player is in this session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    /// Under 10 actions or under 15 minutes
    Beginner,
    /// Under 50 actions or under an hour
    Intermediate,
    /// Everything beyond
    Experienced,
}

/// What the model should know about the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    /// Character name
    pub name: String,
    /// Play style
    pub play_style: PlayStyle,
    /// Experience level
    pub experience_level: ExperienceLevel,
    /// Activity kinds the player returns to
    pub preferred_activities: Vec<String>,
}

/// What the world has established so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldKnowledge {
    /// Every location seen, sorted
    pub known_locations: Vec<String>,
    /// Names of every NPC met, sorted
    pub established_npcs: Vec<String>,
    /// Running story threads
    pub ongoing_storylines: Vec<String>,
}

/// Tone weights for the game master, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GmPersonality {
    /// Willingness to nudge the player along
    pub helpfulness: f64,
    /// How hard encounters should be
    pub challenge_level: f64,
    /// How much to withhold
    pub mystery_level: f64,
    /// Weight on immersive narration
    pub immersion_focus: f64,
}

impl Default for GmPersonality {
    fn default() -> Self {
        Self {
            helpfulness: 0.7,
            challenge_level: 0.6,
            mystery_level: 0.6,
            immersion_focus: 0.9,
        }
    }
}

/// Everything a richer prompt builder needs, in structured form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptData {
    /// The bounded summary
    pub summary: ContextSummary,
    /// Latest raw events, oldest first
    pub recent_events: Vec<ActionEvent>,
    /// Player profile
    pub player_profile: PlayerProfile,
    /// World knowledge
    pub world_knowledge: WorldKnowledge,
    /// GM tone weights
    pub gm_personality: GmPersonality,
}

impl PlayerProfile {
    /// Profile `session` as of `now`
    pub fn build(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            name: session.character.name.clone(),
            play_style: play_style(session),
            experience_level: experience_level(session, now),
            preferred_activities: preferred_activities(session),
        }
    }
}

impl WorldKnowledge {
    /// Collect what `session` has established
    pub fn build(session: &Session) -> Self {
        let mut locations: BTreeSet<&str> = BTreeSet::new();
        locations.insert(&session.location.current);
        if !session.location.previous.is_empty() {
            locations.insert(&session.location.previous);
        }
        locations.extend(session.location.history.iter().map(|v| v.location.as_str()));
        locations.extend(
            session
                .actions
                .iter()
                .map(|a| a.location.as_str())
                .filter(|l| !l.is_empty()),
        );

        let npcs: BTreeSet<&str> = session.npcs.values().map(|n| n.name.as_str()).collect();

        Self {
            known_locations: locations.into_iter().map(str::to_string).collect(),
            established_npcs: npcs.into_iter().map(str::to_string).collect(),
            ongoing_storylines: storylines(session),
        }
    }
}

fn play_style(session: &Session) -> PlayStyle {
    let stats = &session.stats;
    let total = stats.combat_actions + stats.social_actions + stats.explore_actions;
    if total == 0 {
        return PlayStyle::NewPlayer;
    }

    let ratio = |n: u32| n as f64 / total as f64;
    if ratio(stats.combat_actions) > 0.5 {
        PlayStyle::CombatFocused
    } else if ratio(stats.social_actions) > 0.4 {
        PlayStyle::RoleplayFocused
    } else if ratio(stats.explore_actions) > 0.4 {
        PlayStyle::ExplorationFocused
    } else {
        PlayStyle::Balanced
    }
}

fn experience_level(session: &Session, now: DateTime<Utc>) -> ExperienceLevel {
    let actions = session.stats.total_actions;
    let minutes = session.duration_minutes(now);
    if actions < 10 || minutes < 15.0 {
        ExperienceLevel::Beginner
    } else if actions < 50 || minutes < 60.0 {
        ExperienceLevel::Intermediate
    } else {
        ExperienceLevel::Experienced
    }
}

fn preferred_activities(session: &Session) -> Vec<String> {
    let stats = &session.stats;
    let mut activities: Vec<String> = [
        (stats.combat_actions, "combat"),
        (stats.social_actions, "social_interaction"),
        (stats.explore_actions, "exploration"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 5)
    .map(|(_, name)| name.to_string())
    .collect();

    if activities.is_empty() {
        activities.push("discovering_the_world".to_string());
    }
    activities
}

fn storylines(session: &Session) -> Vec<String> {
    let mut lines = Vec::new();
    let reputation = session.character.reputation;
    if reputation > 25 {
        lines.push("Building positive reputation in the community".to_string());
    } else if reputation < -25 {
        lines.push("Dealing with negative reputation consequences".to_string());
    }
    if session.npcs.len() > 3 {
        lines.push("Developing relationships with multiple NPCs".to_string());
    }
    if session.stats.combat_actions > 10 {
        lines.push("Engaging in frequent combat encounters".to_string());
    }
    if lines.is_empty() {
        lines.push("Beginning their adventure".to_string());
    }
    lines
}
