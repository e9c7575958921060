//! Text rendering of the game master prompt

use chrono::{DateTime, Utc};

use super::mood::PlayerFocus;
use super::summary::{ContextSummary, NpcContext, WorldState, time_since};
use crate::session::{ActionEvent, EquipmentItem, Session};

const GM_INSTRUCTIONS: &str = "GM INSTRUCTIONS:
You are the AI Game Master for this fantasy RPG session. Based on the current context:
1. Respond as the omniscient narrator and world
2. Maintain consistency with previous interactions
3. React appropriately to the player's reputation and recent actions
4. Consider NPC relationships and dispositions
5. Provide immersive, contextual descriptions
6. Balance challenge with player agency

Current situation requires your response as Game Master.";

/// Render the fixed-shape prompt block. `recent` is the already bounded
/// list of actions to show.
pub fn render_prompt<'a, I>(
    session: &Session,
    summary: &ContextSummary,
    recent: I,
    now: DateTime<Utc>,
) -> String
where
    I: IntoIterator<Item = &'a ActionEvent>,
{
    let previous = if summary.previous_location.is_empty() {
        "none"
    } else {
        summary.previous_location.as_str()
    };

    format!(
        "GAME MASTER CONTEXT

CURRENT GAME STATE:
- Location: {location} (previously: {previous})
- Player Health: {health}
- Player Reputation: {reputation} ({reputation_label})
- Session Duration: {duration:.1} minutes
- Player Mood: {mood}

RECENT PLAYER ACTIONS:
{actions}

ACTIVE NPCS IN AREA:
{npcs}

PLAYER CHARACTER:
- Name: {name}
- Equipment: {equipment}
- Recent Focus: {focus}

WORLD CONTEXT:
{world}

{instructions}",
        location = summary.current_location,
        reputation = summary.player_reputation,
        reputation_label = summary.reputation_description,
        health = summary.player_health,
        duration = summary.session_duration_minutes,
        mood = summary.player_mood,
        actions = format_actions(recent, now),
        npcs = format_npcs(&summary.active_npcs),
        name = session.character.name,
        equipment = format_equipment(&session.character.equipment),
        focus = PlayerFocus::from_stats(&session.stats).label(),
        world = format_world(&summary.world_state),
        instructions = GM_INSTRUCTIONS,
    )
}

fn format_actions<'a, I>(actions: I, now: DateTime<Utc>) -> String
where
    I: IntoIterator<Item = &'a ActionEvent>,
{
    let lines: Vec<String> = actions
        .into_iter()
        .map(|a| {
            format!(
                "- {} ago: {} ({}) -> {}",
                time_since(a.timestamp, now),
                a.command,
                a.kind,
                a.outcome
            )
        })
        .collect();

    if lines.is_empty() {
        "- No recent actions".to_string()
    } else {
        lines.join("\n")
    }
}

fn format_npcs(npcs: &[NpcContext]) -> String {
    if npcs.is_empty() {
        return "- No known NPCs in area".to_string();
    }

    npcs.iter()
        .map(|npc| {
            let mut line = format!(
                "- {} ({}): {} mood, {} relationship (last seen {})",
                npc.name, npc.id, npc.mood, npc.relationship, npc.last_seen
            );
            if !npc.known_facts.is_empty() {
                line.push_str(" - Knows: ");
                line.push_str(&npc.known_facts.join(", "));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_equipment(equipment: &[EquipmentItem]) -> String {
    if equipment.is_empty() {
        return "No equipment".to_string();
    }
    equipment
        .iter()
        .map(|item| format!("{} ({})", item.name, item.item_type))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_world(world: &WorldState) -> String {
    let mut lines = Vec::new();
    if world.locations_visited > 0 {
        lines.push(format!("- Locations explored: {}", world.locations_visited));
    }
    if world.combat_experienced {
        lines.push("- Has combat experience".to_string());
    }
    if world.social_active {
        lines.push("- Prefers social interactions".to_string());
    }

    if lines.is_empty() {
        "- New to this world".to_string()
    } else {
        lines.join("\n")
    }
}
