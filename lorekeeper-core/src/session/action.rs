//! Action events and the requests that produce them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consequence::Consequence;
use crate::error::{LoreError, Result};

/// An immutable record of something the player did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Unique event id
    pub id: String,
    /// When the action was submitted
    pub timestamp: DateTime<Utc>,
    /// Action type tag ("combat", "talk", "move", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw player command
    pub command: String,
    /// Optional target of the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Player location when the action happened
    pub location: String,
    /// Narrated outcome text
    #[serde(default)]
    pub outcome: String,
    /// Typed consequences applied by the event pipeline
    #[serde(default)]
    pub consequences: Vec<Consequence>,
    /// Free-form extras carried along for consumers
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ActionEvent {
    /// Broad category of this action
    pub fn category(&self) -> ActionCategory {
        ActionCategory::of(&self.kind)
    }

    /// True when the outcome text reports a success
    pub fn succeeded(&self) -> bool {
        self.outcome.to_lowercase().contains("success")
    }
}

/// Broad grouping of action type tags used for statistics and mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// combat, attack, defend
    Combat,
    /// talk, dialogue, social
    Social,
    /// move, explore, examine, look
    Explore,
    /// anything else
    Other,
}

impl ActionCategory {
    /// Categorize an action type tag
    pub fn of(kind: &str) -> Self {
        match kind {
            "combat" | "attack" | "defend" => ActionCategory::Combat,
            "talk" | "dialogue" | "social" => ActionCategory::Social,
            "move" | "explore" | "examine" | "look" => ActionCategory::Explore,
            _ => ActionCategory::Other,
        }
    }
}

/// Split a slash command into its action type and target.
///
/// `/attack goblin` becomes `("combat", Some("goblin"))`; unrecognised
/// commands map to `"unknown"`.
pub fn parse_command(command: &str) -> (&'static str, Option<String>) {
    let mut words = command.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let second = words.next().map(str::to_string);

    match verb {
        "/look" | "/examine" => ("examine", Some("environment".to_string())),
        "/talk" | "/speak" => ("social", second),
        "/attack" | "/fight" => ("combat", second),
        "/move" | "/go" => ("move", second),
        _ => ("unknown", None),
    }
}

/// A player action as submitted by a caller, before it is stamped
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    command: String,
    kind: String,
    target: Option<String>,
    location: Option<String>,
    outcome: String,
    consequences: Vec<Consequence>,
    metadata: Map<String, Value>,
}

impl ActionRequest {
    /// New request of type "unknown"
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            kind: "unknown".to_string(),
            ..Default::default()
        }
    }

    /// New request with type and target parsed from a slash command
    pub fn from_command(command: impl Into<String>) -> Self {
        let command = command.into();
        let (kind, target) = parse_command(&command);
        Self {
            kind: kind.to_string(),
            target,
            command,
            ..Default::default()
        }
    }

    /// Set the action type tag
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Set the target
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Record the action at this location instead of the session's current one
    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the narrated outcome
    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }

    /// Attach a typed consequence
    pub fn consequence(mut self, consequence: Consequence) -> Self {
        self.consequences.push(consequence);
        self
    }

    /// Attach a consequence from its tag and a metadata bag.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the tag needs a payload the bag lacks.
    pub fn tagged(mut self, tag: &str, metadata: &Map<String, Value>) -> Result<Self> {
        self.consequences.push(Consequence::from_tag(tag, metadata)?);
        Ok(self)
    }

    /// Attach a free-form metadata entry
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Command text
    pub fn command_text(&self) -> &str {
        &self.command
    }

    /// Explicit location, if one was set
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Reject requests that cannot be recorded
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(LoreError::validation("action command is empty"));
        }
        if self.kind.trim().is_empty() {
            return Err(LoreError::validation("action type is empty"));
        }
        for consequence in &self.consequences {
            consequence.validate()?;
        }
        Ok(())
    }

    /// Stamp the request into an event
    pub fn into_event(self, location: impl Into<String>, at: DateTime<Utc>) -> ActionEvent {
        ActionEvent {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: at,
            location: self.location.unwrap_or_else(|| location.into()),
            kind: self.kind,
            command: self.command,
            target: self.target,
            outcome: self.outcome,
            consequences: self.consequences,
            metadata: self.metadata,
        }
    }
}
