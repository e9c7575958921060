//! Player mood and focus heuristics

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::{ActionCategory, ActionEvent, SessionStats};

/// How the player seems to be feeling, judged from their latest actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerMood {
    /// Winning fights
    Confident,
    /// Fighting without much success
    Aggressive,
    /// Mostly talking
    Diplomatic,
    /// Exploring, or nothing to go on yet
    Curious,
    /// Mixed activity, mostly succeeding
    Triumphant,
    /// Mixed activity, mostly failing
    Frustrated,
    /// Mixed activity, mixed results
    Focused,
}

impl PlayerMood {
    /// Classify the given actions (the caller picks the window).
    ///
    /// A strict combat majority yields confident or aggressive depending on
    /// whether more than 60% succeeded; a strict social majority yields
    /// diplomatic; more exploration than combat yields curious. Otherwise
    /// the success ratio decides: above 70% triumphant, below 30%
    /// frustrated, else focused. No actions at all reads as curious.
    pub fn assess<'a, I>(actions: I) -> Self
    where
        I: IntoIterator<Item = &'a ActionEvent>,
    {
        let (mut combat, mut social, mut explore, mut success, mut total) = (0u32, 0u32, 0u32, 0u32, 0u32);
        for action in actions {
            total += 1;
            match action.category() {
                ActionCategory::Combat => combat += 1,
                ActionCategory::Social => social += 1,
                ActionCategory::Explore => explore += 1,
                ActionCategory::Other => {}
            }
            if action.succeeded() {
                success += 1;
            }
        }

        if total == 0 {
            return PlayerMood::Curious;
        }
        let success_rate = success as f64 / total as f64;

        if combat > social && combat > explore {
            if success_rate > 0.6 {
                PlayerMood::Confident
            } else {
                PlayerMood::Aggressive
            }
        } else if social > combat && social > explore {
            PlayerMood::Diplomatic
        } else if explore > combat {
            PlayerMood::Curious
        } else if success_rate > 0.7 {
            PlayerMood::Triumphant
        } else if success_rate < 0.3 {
            PlayerMood::Frustrated
        } else {
            PlayerMood::Focused
        }
    }

    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerMood::Confident => "confident",
            PlayerMood::Aggressive => "aggressive",
            PlayerMood::Diplomatic => "diplomatic",
            PlayerMood::Curious => "curious",
            PlayerMood::Triumphant => "triumphant",
            PlayerMood::Frustrated => "frustrated",
            PlayerMood::Focused => "focused",
        }
    }
}

impl fmt::Display for PlayerMood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the player has spent the session doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerFocus {
    /// Combat outnumbers everything else
    Combat,
    /// Social outnumbers everything else
    Social,
    /// More exploration than combat
    Exploration,
    /// No clear leader
    Balanced,
}

impl PlayerFocus {
    /// Focus derived from whole-session counters
    pub fn from_stats(stats: &SessionStats) -> Self {
        let (combat, social, explore) = (stats.combat_actions, stats.social_actions, stats.explore_actions);
        if combat > social && combat > explore {
            PlayerFocus::Combat
        } else if social > combat && social > explore {
            PlayerFocus::Social
        } else if explore > combat {
            PlayerFocus::Exploration
        } else {
            PlayerFocus::Balanced
        }
    }

    /// Human-readable label for the prompt
    pub fn label(&self) -> &'static str {
        match self {
            PlayerFocus::Combat => "Combat-focused",
            PlayerFocus::Social => "Social interaction",
            PlayerFocus::Exploration => "Exploration",
            PlayerFocus::Balanced => "Balanced gameplay",
        }
    }
}
