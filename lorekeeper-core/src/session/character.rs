//! Character sheet: health, reputation, attributes and items

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::disposition::shift_standing;

/// Starting and default maximum health
pub const DEFAULT_MAX_HEALTH: i32 = 20;

/// Current and maximum health; `0 <= current <= max` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points
    pub current: i32,
    /// Maximum hit points
    pub max: i32,
}

impl Health {
    /// Full health at the given maximum
    pub fn full(max: i32) -> Self {
        let max = max.max(0);
        Self { current: max, max }
    }

    /// Apply a signed delta, clamping into [0, max]
    pub fn adjust(&mut self, delta: i32) {
        let next = self.current as i64 + delta as i64;
        self.current = next.clamp(0, self.max as i64) as i32;
    }

    /// True when no hit points remain
    pub fn is_down(&self) -> bool {
        self.current == 0
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::full(DEFAULT_MAX_HEALTH)
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.current, self.max)
    }
}

/// An equipped item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    /// Item id
    pub id: String,
    /// Display name
    pub name: String,
    /// weapon, armor, accessory, ...
    #[serde(rename = "type")]
    pub item_type: String,
    /// mainhand, offhand, chest, ...
    pub slot: String,
    /// Stat modifiers
    #[serde(default)]
    pub stats: BTreeMap<String, i32>,
}

/// An item carried in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item id
    pub id: String,
    /// Display name
    pub name: String,
    /// Item category
    #[serde(rename = "type")]
    pub item_type: String,
    /// Stack size
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Trade value
    #[serde(default)]
    pub value: u32,
}

fn default_quantity() -> u32 {
    1
}

impl InventoryItem {
    /// Single item with zero value
    pub fn new(id: impl Into<String>, name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            item_type: item_type.into(),
            quantity: 1,
            value: 0,
        }
    }

    /// Set the stack size
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the trade value
    pub fn with_value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }
}

/// The player's character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Character name
    pub name: String,
    /// Hit points
    pub health: Health,
    /// Standing with the world, clamped to [-100, 100]
    pub reputation: i32,
    /// strength, dexterity, ...
    #[serde(default)]
    pub attributes: BTreeMap<String, i32>,
    /// Equipped items
    #[serde(default)]
    pub equipment: Vec<EquipmentItem>,
    /// Carried items
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
}

impl Character {
    /// Freshly rolled character with the standard attribute spread
    pub fn new(name: impl Into<String>) -> Self {
        let attributes = ["strength", "dexterity", "intelligence", "charisma"]
            .into_iter()
            .map(|attr| (attr.to_string(), 10))
            .collect();

        Self {
            name: name.into(),
            health: Health::default(),
            reputation: 0,
            attributes,
            equipment: Vec::new(),
            inventory: Vec::new(),
        }
    }

    /// Nameless character used for implicitly created sessions
    pub fn unnamed() -> Self {
        Self {
            name: String::new(),
            health: Health::default(),
            reputation: 0,
            attributes: BTreeMap::new(),
            equipment: Vec::new(),
            inventory: Vec::new(),
        }
    }

    /// Shift reputation by `delta`, clamped
    pub fn adjust_reputation(&mut self, delta: i32) {
        self.reputation = shift_standing(self.reputation, delta);
    }

    /// Add an item to the inventory
    pub fn gain_item(&mut self, item: InventoryItem) {
        self.inventory.push(item);
    }

    /// Remove the first inventory item with this id; returns it if present
    pub fn lose_item(&mut self, item_id: &str) -> Option<InventoryItem> {
        let index = self.inventory.iter().position(|item| item.id == item_id)?;
        Some(self.inventory.remove(index))
    }
}
