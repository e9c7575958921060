//! Consequence rules: typed effects attached to action events
//!
//! Each [`Consequence`] is a closed, validated state delta. Tagged input
//! (a tag string plus a metadata bag) is converted once, at construction,
//! by [`Consequence::from_tag`]; unknown tags survive as
//! [`Consequence::Unknown`] and apply as no-ops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{LoreError, Result};
use crate::session::{ActionEvent, InventoryItem, Session};

/// Default reputation gain for `reputation_increase`
pub const DEFAULT_REPUTATION_GAIN: i32 = 5;

/// Default reputation loss for `reputation_decrease`
pub const DEFAULT_REPUTATION_LOSS: i32 = -10;

/// Reputation nudge for a won fight
pub const COMBAT_VICTORY_REPUTATION: i32 = 2;

/// Reputation nudge for a lost fight
pub const COMBAT_DEFEAT_REPUTATION: i32 = -1;

/// A state delta applied by the event pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Consequence {
    /// Raise reputation
    ReputationIncrease {
        /// Positive delta
        delta: i32,
    },
    /// Lower reputation
    ReputationDecrease {
        /// Negative delta
        delta: i32,
    },
    /// Lose hit points
    HealthDamage {
        /// Hit points lost
        amount: i32,
    },
    /// Regain hit points
    HealthHeal {
        /// Hit points regained
        amount: i32,
    },
    /// An NPC took note of the player
    NpcNoticed {
        /// NPC id
        npc_id: String,
        /// NPC display name
        npc_name: String,
    },
    /// Won a fight
    CombatVictory,
    /// Lost a fight
    CombatDefeat,
    /// Finished a quest
    QuestCompleted {
        /// Reputation granted
        reputation_reward: i32,
    },
    /// Picked something up
    ItemGained {
        /// The new inventory item
        item: InventoryItem,
    },
    /// Lost or used up an item
    ItemLost {
        /// Id of the inventory item to remove
        item_id: String,
    },
    /// A tag this build does not understand
    Unknown {
        /// The original tag
        tag: String,
    },
}

impl Consequence {
    /// Reputation gain with the default amount
    pub fn reputation_increase() -> Self {
        Consequence::ReputationIncrease {
            delta: DEFAULT_REPUTATION_GAIN,
        }
    }

    /// Reputation loss with the default amount
    pub fn reputation_decrease() -> Self {
        Consequence::ReputationDecrease {
            delta: DEFAULT_REPUTATION_LOSS,
        }
    }

    /// Build a consequence from a tag and the event's metadata bag.
    ///
    /// `reputation_change` overrides the default reputation deltas;
    /// `damage`, `healing`, `npc_id`/`npc_name`, `reputation_reward`,
    /// `item` and `item_id` carry the payloads of the matching tags.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a required payload is missing or has
    /// the wrong shape.
    pub fn from_tag(tag: &str, metadata: &Map<String, Value>) -> Result<Self> {
        let consequence = match tag {
            "reputation_increase" => Consequence::ReputationIncrease {
                delta: optional_int(metadata, "reputation_change")?
                    .map(|v| v.saturating_abs())
                    .unwrap_or(DEFAULT_REPUTATION_GAIN),
            },
            "reputation_decrease" => Consequence::ReputationDecrease {
                delta: optional_int(metadata, "reputation_change")?
                    .map(|v| v.saturating_abs().saturating_neg())
                    .unwrap_or(DEFAULT_REPUTATION_LOSS),
            },
            "health_damage" => Consequence::HealthDamage {
                amount: required_int(metadata, "damage", tag)?,
            },
            "health_heal" => Consequence::HealthHeal {
                amount: required_int(metadata, "healing", tag)?,
            },
            "npc_noticed" => Consequence::NpcNoticed {
                npc_id: required_str(metadata, "npc_id", tag)?,
                npc_name: required_str(metadata, "npc_name", tag)?,
            },
            "combat_victory" => Consequence::CombatVictory,
            "combat_defeat" => Consequence::CombatDefeat,
            "quest_completed" => Consequence::QuestCompleted {
                reputation_reward: required_int(metadata, "reputation_reward", tag)?,
            },
            "item_gained" => {
                let raw = metadata
                    .get("item")
                    .ok_or_else(|| missing("item", tag))?
                    .clone();
                let item: InventoryItem = serde_json::from_value(raw).map_err(|e| {
                    LoreError::validation(format!("item_gained: malformed item: {}", e))
                })?;
                Consequence::ItemGained { item }
            }
            "item_lost" => Consequence::ItemLost {
                item_id: required_str(metadata, "item_id", tag)?,
            },
            other => Consequence::Unknown {
                tag: other.to_string(),
            },
        };

        consequence.validate()?;
        Ok(consequence)
    }

    /// The tag this consequence is keyed by
    pub fn tag(&self) -> &str {
        match self {
            Consequence::ReputationIncrease { .. } => "reputation_increase",
            Consequence::ReputationDecrease { .. } => "reputation_decrease",
            Consequence::HealthDamage { .. } => "health_damage",
            Consequence::HealthHeal { .. } => "health_heal",
            Consequence::NpcNoticed { .. } => "npc_noticed",
            Consequence::CombatVictory => "combat_victory",
            Consequence::CombatDefeat => "combat_defeat",
            Consequence::QuestCompleted { .. } => "quest_completed",
            Consequence::ItemGained { .. } => "item_gained",
            Consequence::ItemLost { .. } => "item_lost",
            Consequence::Unknown { tag } => tag,
        }
    }

    /// Reject payloads that cannot be applied
    pub fn validate(&self) -> Result<()> {
        match self {
            Consequence::HealthDamage { amount } | Consequence::HealthHeal { amount }
                if *amount < 0 =>
            {
                Err(LoreError::validation(format!(
                    "{}: amount must not be negative",
                    self.tag()
                )))
            }
            Consequence::NpcNoticed { npc_id, .. } if npc_id.trim().is_empty() => {
                Err(LoreError::validation("npc_noticed: npc_id is empty"))
            }
            Consequence::ItemGained { item } if item.id.trim().is_empty() => {
                Err(LoreError::validation("item_gained: item id is empty"))
            }
            Consequence::ItemLost { item_id } if item_id.trim().is_empty() => {
                Err(LoreError::validation("item_lost: item_id is empty"))
            }
            _ => Ok(()),
        }
    }

    /// Apply this effect to `session`. `event` is the action that carried it.
    pub fn apply(&self, session: &mut Session, event: &ActionEvent, at: DateTime<Utc>) {
        match self {
            Consequence::ReputationIncrease { delta } | Consequence::ReputationDecrease { delta } => {
                session.adjust_reputation(*delta, at)
            }
            Consequence::HealthDamage { amount } => session.adjust_health(amount.saturating_neg(), at),
            Consequence::HealthHeal { amount } => session.adjust_health(*amount, at),
            Consequence::NpcNoticed { npc_id, npc_name } => {
                let fact = format!("noticed_player_{}", event.kind);
                session.interact_with_npc(npc_id, npc_name, 0, [fact], at);
            }
            Consequence::CombatVictory => session.adjust_reputation(COMBAT_VICTORY_REPUTATION, at),
            Consequence::CombatDefeat => session.adjust_reputation(COMBAT_DEFEAT_REPUTATION, at),
            Consequence::QuestCompleted { reputation_reward } => {
                session.adjust_reputation(*reputation_reward, at)
            }
            Consequence::ItemGained { item } => session.character.gain_item(item.clone()),
            Consequence::ItemLost { item_id } => {
                if session.character.lose_item(item_id).is_none() {
                    debug!(session_id = %session.session_id, item_id = %item_id, "item_lost for item not in inventory");
                }
            }
            Consequence::Unknown { tag } => {
                debug!(session_id = %session.session_id, tag = %tag, "ignoring unknown consequence");
            }
        }
    }
}

/// Apply a dequeued action to a session: append it to the bounded log,
/// run its consequences in order, count it and stamp the update time.
pub fn apply_action(session: &mut Session, event: ActionEvent, max_actions: usize, at: DateTime<Utc>) {
    for consequence in &event.consequences {
        consequence.apply(session, &event, at);
    }
    session.stats.count(event.category());
    session.push_action(event, max_actions);
    session.touch(at);
}

fn missing(key: &str, tag: &str) -> LoreError {
    LoreError::validation(format!("{}: metadata is missing '{}'", tag, key))
}

fn optional_int(metadata: &Map<String, Value>, key: &str) -> Result<Option<i32>> {
    match metadata.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(|v| Some(v.clamp(i32::MIN as i64, i32::MAX as i64) as i32))
            .ok_or_else(|| LoreError::validation(format!("'{}' must be an integer", key))),
    }
}

fn required_int(metadata: &Map<String, Value>, key: &str, tag: &str) -> Result<i32> {
    optional_int(metadata, key)?.ok_or_else(|| missing(key, tag))
}

fn required_str(metadata: &Map<String, Value>, key: &str, tag: &str) -> Result<String> {
    match metadata.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(LoreError::validation(format!("'{}' must be a string", key))),
        None => Err(missing(key, tag)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ActionRequest;
    use serde_json::json;

    fn bag(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn session() -> Session {
        Session::new("s1", "p1", "Aragorn", Utc::now())
    }

    #[test]
    fn test_from_tag_defaults_and_overrides() {
        let empty = Map::new();
        assert_eq!(
            Consequence::from_tag("reputation_increase", &empty).unwrap(),
            Consequence::ReputationIncrease { delta: 5 }
        );
        assert_eq!(
            Consequence::from_tag("reputation_decrease", &empty).unwrap(),
            Consequence::ReputationDecrease { delta: -10 }
        );

        let meta = bag(json!({ "reputation_change": 7 }));
        assert_eq!(
            Consequence::from_tag("reputation_decrease", &meta).unwrap(),
            Consequence::ReputationDecrease { delta: -7 }
        );
    }

    #[test]
    fn test_extreme_reputation_change_keeps_tag_direction() {
        for raw in [json!(i64::MIN), json!(-3_000_000_000i64), json!(i64::MAX)] {
            let meta = bag(json!({ "reputation_change": raw }));
            assert_eq!(
                Consequence::from_tag("reputation_increase", &meta).unwrap(),
                Consequence::ReputationIncrease { delta: i32::MAX }
            );
            assert_eq!(
                Consequence::from_tag("reputation_decrease", &meta).unwrap(),
                Consequence::ReputationDecrease { delta: -i32::MAX }
            );
        }

        let mut s = session();
        let at = s.last_update;
        let meta = bag(json!({ "reputation_change": i64::MIN }));
        let gain = Consequence::from_tag("reputation_increase", &meta).unwrap();
        let event = ActionRequest::new("/boast").into_event("village", at);
        gain.apply(&mut s, &event, at);
        assert_eq!(s.character.reputation, 100);
    }

    #[test]
    fn test_from_tag_requires_payloads() {
        let empty = Map::new();
        for tag in ["health_damage", "health_heal", "npc_noticed", "quest_completed", "item_gained", "item_lost"] {
            let err = Consequence::from_tag(tag, &empty).unwrap_err();
            assert!(matches!(err, LoreError::Validation(_)), "{} should fail", tag);
        }

        let wrong = bag(json!({ "damage": "lots" }));
        assert!(Consequence::from_tag("health_damage", &wrong).is_err());
        let negative = bag(json!({ "healing": -4 }));
        assert!(Consequence::from_tag("health_heal", &negative).is_err());
    }

    #[test]
    fn test_unknown_tag_is_noop() {
        let consequence = Consequence::from_tag("summon_dragon", &Map::new()).unwrap();
        assert_eq!(consequence.tag(), "summon_dragon");

        let mut s = session();
        let before = s.clone();
        let at = s.last_update;
        let event = ActionRequest::new("/summon").into_event("village", at);
        consequence.apply(&mut s, &event, at);
        assert_eq!(s, before);
    }

    #[test]
    fn test_apply_action_combat_victory() {
        let mut s = session();
        let event = ActionRequest::from_command("/attack goblin")
            .consequence(Consequence::CombatVictory)
            .into_event("starting_village", Utc::now());

        apply_action(&mut s, event, 50, Utc::now());
        assert_eq!(s.character.reputation, COMBAT_VICTORY_REPUTATION);
        assert_eq!(s.stats.total_actions, 1);
        assert_eq!(s.stats.combat_actions, 1);
        assert_eq!(s.actions.len(), 1);
    }

    #[test]
    fn test_health_effects_clamp() {
        let mut s = session();
        let now = Utc::now();
        let event = ActionRequest::new("ouch")
            .consequence(Consequence::HealthDamage { amount: 500 })
            .into_event("pit", now);
        apply_action(&mut s, event, 50, now);
        assert_eq!(s.character.health.current, 0);

        let event = ActionRequest::new("potion")
            .consequence(Consequence::HealthHeal { amount: 500 })
            .into_event("pit", now);
        apply_action(&mut s, event, 50, now);
        assert_eq!(s.character.health.current, 20);
    }

    #[test]
    fn test_npc_noticed_touches_relationship() {
        let mut s = session();
        let now = Utc::now();
        let meta = bag(json!({ "npc_id": "guard", "npc_name": "Town Guard" }));
        let event = ActionRequest::new("/attack dummy")
            .kind("combat")
            .tagged("npc_noticed", &meta)
            .unwrap()
            .into_event("square", now);

        apply_action(&mut s, event, 50, now);
        let guard = &s.npcs["guard"];
        assert_eq!(guard.disposition, 0);
        assert_eq!(guard.known_facts, vec!["noticed_player_combat"]);
        assert_eq!(s.stats.npcs_met, 1);
    }

    #[test]
    fn test_items() {
        let mut s = session();
        let now = Utc::now();
        let meta = bag(json!({ "item": { "id": "sword", "name": "Rusty Sword", "type": "weapon" } }));
        let gained = ActionRequest::new("/take sword")
            .tagged("item_gained", &meta)
            .unwrap()
            .into_event("armory", now);
        apply_action(&mut s, gained, 50, now);
        assert_eq!(s.character.inventory.len(), 1);
        assert_eq!(s.character.inventory[0].quantity, 1);

        let lost = ActionRequest::new("/drop sword")
            .consequence(Consequence::ItemLost { item_id: "sword".into() })
            .into_event("armory", now);
        apply_action(&mut s, lost, 50, now);
        assert!(s.character.inventory.is_empty());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Consequence::QuestCompleted { reputation_reward: 15 }).unwrap();
        assert_eq!(json, json!({ "kind": "quest_completed", "reputation_reward": 15 }));
        let back: Consequence = serde_json::from_value(json!({ "kind": "combat_defeat" })).unwrap();
        assert_eq!(back, Consequence::CombatDefeat);
    }
}
