//! End-to-end scenarios against the context engine over the in-memory store

use std::sync::Arc;

use lorekeeper_core::prelude::*;
use lorekeeper_core::session::STARTING_LOCATION;

fn engine_with(context: ContextConfig) -> (Arc<InMemorySessionStore>, ContextEngine) {
    let store = Arc::new(InMemorySessionStore::new());
    let config = ConfigBuilder::new().context(context).build();
    let engine = ContextEngine::new(config, store.clone()).expect("engine starts");
    (store, engine)
}

fn engine() -> (Arc<InMemorySessionStore>, ContextEngine) {
    engine_with(ContextConfig::default())
}

#[tokio::test]
async fn test_new_session_defaults() {
    let (store, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.player_id, "player-1");
    assert_eq!(session.character.name, "Aragorn");
    assert_eq!(session.character.health, Health { current: 20, max: 20 });
    assert_eq!(session.character.reputation, 0);
    assert_eq!(session.location.current, STARTING_LOCATION);
    assert!(session.actions.is_empty());
    assert!(session.npcs.is_empty());

    // Created sessions are durable immediately
    assert_eq!(store.load(&id).await.unwrap().session_id, id);
    assert!(engine.is_session_active(&id).await);
}

#[tokio::test]
async fn test_combat_victory_raises_reputation() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    engine
        .record_action(
            &id,
            ActionRequest::from_command("/attack goblin")
                .outcome("Success! The goblin flees.")
                .consequence(Consequence::CombatVictory),
        )
        .await
        .unwrap();
    engine.wait_idle().await;

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.character.reputation, 2);
    assert_eq!(session.stats.total_actions, 1);
    assert_eq!(session.stats.combat_actions, 1);

    let action = &session.actions[0];
    assert_eq!(action.kind, "combat");
    assert_eq!(action.target.as_deref(), Some("goblin"));
    assert_eq!(action.location, STARTING_LOCATION);
}

#[tokio::test]
async fn test_health_clamps_to_max() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    let health = engine.update_character_health(&id, -3).await.unwrap();
    assert_eq!(health.current, 17);

    let health = engine.update_character_health(&id, 50).await.unwrap();
    assert_eq!(health.current, 20);

    let health = engine.update_character_health(&id, -500).await.unwrap();
    assert_eq!(health.current, 0);
}

#[tokio::test]
async fn test_npc_disposition_clamps_and_sets_mood() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    let npc = engine
        .update_npc_relationship(&id, "npc_bob", "Bob", 150, vec!["likes ale".to_string()])
        .await
        .unwrap();
    assert_eq!(npc.disposition, 100);
    assert_eq!(npc.mood, Mood::Friendly);
    assert_eq!(npc.location, STARTING_LOCATION);

    let npc = engine
        .update_npc_relationship(&id, "npc_bob", "Bob", -130, vec!["likes ale".to_string()])
        .await
        .unwrap();
    assert_eq!(npc.disposition, -30);
    assert_eq!(npc.mood, Mood::Unfriendly);
    assert_eq!(npc.known_facts, vec!["likes ale"]);
    assert_eq!(npc.interaction_count, 2);

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.stats.npcs_met, 1);
}

#[tokio::test]
async fn test_reputation_clamps() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    assert_eq!(engine.update_reputation(&id, 250).await.unwrap(), 100);
    assert_eq!(engine.update_reputation(&id, -500).await.unwrap(), -100);
}

#[tokio::test]
async fn test_full_queue_drops_only_the_overflow() {
    let (_, engine) = engine_with(
        ContextConfig::default()
            .with_queue_capacity(1000)
            .with_max_actions(2000),
    );
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    engine.pause_pipeline();
    for i in 0..1000 {
        engine
            .record_action(&id, ActionRequest::new(format!("/wait {}", i)))
            .await
            .unwrap();
    }

    let err = engine
        .record_action(&id, ActionRequest::new("/overflow"))
        .await
        .unwrap_err();
    assert!(err.is_capacity());
    assert!(matches!(err, LoreError::QueueFull { capacity: 1000 }));

    let metrics = engine.metrics().await;
    assert_eq!(metrics.queue_depth, 1000);
    assert_eq!(metrics.pipeline.dropped, 1);
    assert!(metrics.pipeline_paused);

    engine.resume_pipeline();
    engine.wait_idle().await;

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.actions.len(), 1000);
    assert!(session.actions.iter().all(|a| a.command != "/overflow"));
    assert_eq!(session.actions.front().unwrap().command, "/wait 0");
    assert_eq!(session.actions.back().unwrap().command, "/wait 999");
}

#[tokio::test]
async fn test_action_log_keeps_newest() {
    let (_, engine) = engine_with(ContextConfig::default().with_max_actions(5));
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    for i in 0..12 {
        engine
            .record_action(&id, ActionRequest::new(format!("/step {}", i)))
            .await
            .unwrap();
    }
    engine.wait_idle().await;

    let commands: Vec<_> = engine
        .recent_actions(&id, 100)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.command)
        .collect();
    assert_eq!(commands, vec!["/step 7", "/step 8", "/step 9", "/step 10", "/step 11"]);

    // Stats count every applied action, not just retained ones
    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.stats.total_actions, 12);
}

#[tokio::test]
async fn test_mixed_paths_lose_nothing() {
    let (_, engine) = engine();
    let engine = Arc::new(engine);
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                engine
                    .record_action(
                        &id,
                        ActionRequest::new(format!("/help {}", i))
                            .consequence(Consequence::ReputationIncrease { delta: 1 }),
                    )
                    .await
                    .map(|_| ())
            } else {
                engine.update_reputation(&id, 1).await.map(|_| ())
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    engine.wait_idle().await;

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.character.reputation, 20);
    assert_eq!(session.actions.len(), 10);
}

#[tokio::test]
async fn test_tagged_consequences_from_metadata() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    let metadata = serde_json::json!({ "damage": 5, "npc_id": "npc_guard", "npc_name": "Guard" });
    let metadata = metadata.as_object().unwrap();
    let request = ActionRequest::from_command("/attack guard")
        .outcome("The guard strikes back")
        .tagged("health_damage", metadata)
        .unwrap()
        .tagged("npc_noticed", metadata)
        .unwrap()
        .tagged("reputation_decrease", &serde_json::Map::new())
        .unwrap();

    engine.record_action(&id, request).await.unwrap();
    engine.wait_idle().await;

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.character.health.current, 15);
    assert_eq!(session.character.reputation, -10);
    let guard = &session.npcs["npc_guard"];
    assert_eq!(guard.disposition, 0);
    assert_eq!(guard.known_facts, vec!["noticed_player_combat"]);
}

#[tokio::test]
async fn test_missing_payload_is_rejected() {
    let metadata = serde_json::Map::new();
    let err = ActionRequest::from_command("/rest")
        .tagged("health_heal", &metadata)
        .unwrap_err();
    assert!(matches!(err, LoreError::Validation(_)));
}

#[tokio::test]
async fn test_unknown_session_gets_skeleton() {
    let (_, engine) = engine();

    let session = engine.session("typo-id").await.unwrap();
    assert_eq!(session.session_id, "typo-id");
    assert_eq!(session.player_id, "");
    assert_eq!(session.character.health.current, 20);
    assert!(engine.is_session_active("typo-id").await);
}

#[tokio::test]
async fn test_prompt_reflects_state() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();

    engine.update_location(&id, "dark_forest").await.unwrap();
    engine
        .update_npc_relationship(&id, "npc_elf", "Legolas", 60, Vec::new())
        .await
        .unwrap();
    for command in ["/look", "/talk legolas", "/attack orc", "/move river"] {
        engine
            .record_action(&id, ActionRequest::from_command(command).outcome("done"))
            .await
            .unwrap();
    }
    engine.wait_idle().await;

    let prompt = engine.generate_prompt(&id).await.unwrap();
    assert!(prompt.contains("GAME MASTER CONTEXT"));
    assert!(prompt.contains("- Location: dark_forest (previously: starting_village)"));
    assert!(prompt.contains("Legolas"));
    assert!(prompt.contains("Aragorn"));
    assert!(!prompt.contains("/look"));
    assert!(prompt.contains("/move river"));

    let summary = engine.context_summary(&id).await.unwrap();
    assert_eq!(summary.current_location, "dark_forest");
    assert_eq!(summary.player_health, "20/20");
    assert_eq!(summary.active_npcs.len(), 1);
    assert_eq!(summary.active_npcs[0].mood, Mood::Friendly);
    assert_eq!(summary.recent_actions.len(), 4);
    assert_eq!(summary.world_state.locations_visited, 2);
    assert!(summary.world_state.combat_experienced);

    let data = engine.prompt_data(&id).await.unwrap();
    assert_eq!(data.recent_events.len(), 4);
    assert_eq!(data.world_knowledge.established_npcs, vec!["Legolas"]);
}

#[tokio::test]
async fn test_session_duration_is_non_negative() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();
    let duration = engine.session_duration(&id).await.unwrap();
    assert!(duration >= chrono::Duration::zero());
}

#[tokio::test]
async fn test_metrics_snapshot() {
    let (_, engine) = engine();
    let id = engine.create_session("player-1", "Aragorn").await.unwrap();
    engine.update_reputation(&id, 5).await.unwrap();

    let metrics = engine.metrics().await;
    assert_eq!(metrics.cached_sessions, 1);
    assert_eq!(metrics.dirty_sessions, 1);
    assert_eq!(metrics.queue_capacity, 1000);
    assert_eq!(metrics.max_actions, 50);
    assert_eq!(metrics.storage_backend, "memory");
    assert!(!metrics.pipeline_paused);
}
