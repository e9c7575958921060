//! Prompt synthesis: bounded digests of session state for a language model
//!
//! Everything here is a pure function of a session snapshot and a clock
//! reading. The rendered text has a fixed shape and every list in it is
//! capped by [`PromptConfig`], so prompt size stays bounded however long the
//! session runs.

mod mood;
mod profile;
mod render;
mod summary;

pub use mood::{PlayerFocus, PlayerMood};
pub use profile::{ExperienceLevel, GmPersonality, PlayStyle, PlayerProfile, PromptData, WorldKnowledge};
pub use summary::{ContextSummary, NpcContext, WorldState, active_npcs, time_since};

use chrono::{DateTime, Utc};

use crate::config::PromptConfig;
use crate::session::Session;

/// Builds summaries, prompt text and structured prompt data
#[derive(Debug, Clone, Default)]
pub struct PromptSynthesizer {
    config: PromptConfig,
}

impl PromptSynthesizer {
    /// Synthesizer with the given bounds
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    /// Active bounds
    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Structured summary of `session`
    pub fn summary(&self, session: &Session, now: DateTime<Utc>) -> ContextSummary {
        ContextSummary::build(session, &self.config, now)
    }

    /// The game master prompt text
    pub fn prompt(&self, session: &Session, now: DateTime<Utc>) -> String {
        let summary = self.summary(session, now);
        render::render_prompt(
            session,
            &summary,
            session.recent_actions(self.config.recent_actions),
            now,
        )
    }

    /// Summary plus recent raw events, player profile, world knowledge and
    /// GM personality
    pub fn prompt_data(&self, session: &Session, now: DateTime<Utc>) -> PromptData {
        PromptData {
            summary: self.summary(session, now),
            recent_events: session
                .recent_actions(self.config.prompt_data_events)
                .cloned()
                .collect(),
            player_profile: PlayerProfile::build(session, now),
            world_knowledge: WorldKnowledge::build(session),
            gm_personality: GmPersonality::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ActionRequest;
    use chrono::Duration;

    #[test]
    fn test_prompt_lists_only_latest_actions() {
        let start = Utc::now() - Duration::minutes(30);
        let mut session = Session::new("s1", "p1", "Aragorn", start);
        for i in 0..40 {
            let event = ActionRequest::from_command(format!("/go place{}", i))
                .outcome("Success")
                .into_event("road", start + Duration::minutes(i / 2));
            session.push_action(event, 50);
        }

        let synth = PromptSynthesizer::default();
        let prompt = synth.prompt(&session, Utc::now());

        assert!(prompt.starts_with("GAME MASTER CONTEXT"));
        assert!(prompt.contains("/go place39"));
        assert!(prompt.contains("/go place37"));
        assert!(!prompt.contains("/go place36 "));
        assert_eq!(prompt.matches(" ago: ").count(), 3);
        assert!(prompt.contains("- Location: starting_village (previously: none)"));
        assert!(prompt.contains("- Name: Aragorn"));
        assert!(prompt.ends_with("Current situation requires your response as Game Master."));
    }

    #[test]
    fn test_empty_session_prompt() {
        let now = Utc::now();
        let session = Session::new("s1", "p1", "Aragorn", now);
        let prompt = PromptSynthesizer::default().prompt(&session, now);

        assert!(prompt.contains("- No recent actions"));
        assert!(prompt.contains("- No known NPCs in area"));
        assert!(prompt.contains("- Player Health: 20/20"));
        assert!(prompt.contains("- Player Reputation: 0 (Neutral)"));
        assert!(prompt.contains("- Player Mood: curious"));
        assert!(prompt.contains("- Recent Focus: Balanced gameplay"));
    }

    #[test]
    fn test_prompt_data_bounds() {
        let now = Utc::now();
        let mut session = Session::new("s1", "p1", "Aragorn", now);
        for i in 0..25 {
            session.push_action(ActionRequest::new(format!("/wait {}", i)).into_event("x", now), 50);
        }

        let data = PromptSynthesizer::default().prompt_data(&session, now);
        assert_eq!(data.recent_events.len(), 10);
        assert_eq!(data.recent_events[9].command, "/wait 24");
        assert_eq!(data.summary.recent_actions.len(), 5);
        assert_eq!(data.gm_personality.immersion_focus, 0.9);
        assert_eq!(data.player_profile.name, "Aragorn");
    }
}
