//! Engine and store behavior over the SQLite backend

use std::sync::Arc;

use chrono::{Duration, Utc};
use lorekeeper_core::prelude::*;
use tempfile::TempDir;

async fn memory_store() -> SqliteSessionStore {
    SqliteSessionStore::connect("sqlite::memory:", 4)
        .await
        .expect("in-memory sqlite opens")
}

#[tokio::test]
async fn test_engine_over_in_memory_sqlite() {
    let config = ConfigBuilder::new()
        .storage(StorageConfig::sqlite("sqlite::memory:"))
        .build();
    let engine = ContextEngine::open(config).await.unwrap();
    assert_eq!(engine.store().name(), "sqlite");

    let id = engine.create_session("player-1", "Aragorn").await.unwrap();
    engine
        .record_action(
            &id,
            ActionRequest::from_command("/attack goblin").consequence(Consequence::CombatVictory),
        )
        .await
        .unwrap();
    engine.wait_idle().await;
    engine.shutdown().await.unwrap();

    let stored = engine.store().load(&id).await.unwrap();
    assert_eq!(stored.character.reputation, 2);
    assert_eq!(stored.actions.len(), 1);
}

#[tokio::test]
async fn test_sessions_survive_reopen() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("sessions.db").display());

    let id = {
        let engine = ContextEngine::open(
            ConfigBuilder::new().storage(StorageConfig::sqlite(&url)).build(),
        )
        .await
        .unwrap();
        let id = engine.create_session("player-1", "Aragorn").await.unwrap();
        engine.update_location(&id, "mines_of_moria").await.unwrap();
        engine
            .update_npc_relationship(&id, "npc_gimli", "Gimli", 30, vec!["dwarf".to_string()])
            .await
            .unwrap();
        engine.shutdown().await.unwrap();
        id
    };

    let engine = ContextEngine::open(
        ConfigBuilder::new().storage(StorageConfig::sqlite(&url)).build(),
    )
    .await
    .unwrap();
    assert!(!engine.is_session_active(&id).await);

    let session = engine.session(&id).await.unwrap();
    assert_eq!(session.location.current, "mines_of_moria");
    assert_eq!(session.npcs["npc_gimli"].mood, Mood::Helpful);
    assert_eq!(session.location.history.len(), 2);
    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_player_and_recency_queries() {
    let store = memory_store().await;
    let now = Utc::now();

    store
        .save(&Session::new("a", "alice", "Alice", now - Duration::hours(3)))
        .await
        .unwrap();
    store
        .save(&Session::new("b", "alice", "Alice II", now - Duration::minutes(5)))
        .await
        .unwrap();
    store
        .save(&Session::new("c", "bob", "Bob", now - Duration::minutes(10)))
        .await
        .unwrap();

    let alice: Vec<_> = store
        .sessions_for_player("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(alice, vec!["b", "a"]);

    let recent = store.active_since(now - Duration::hours(1)).await.unwrap();
    assert_eq!(recent, vec!["b", "c"]);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.active_last_hour, 2);
    assert!(stats.average_snapshot_bytes > 0.0);
}

#[tokio::test]
async fn test_purge_older_than() {
    let store = memory_store().await;
    let now = Utc::now();
    store
        .save(&Session::new("stale", "p1", "Old", now - Duration::days(45)))
        .await
        .unwrap();
    store
        .save(&Session::new("hot", "p1", "Kept", now - Duration::days(45)))
        .await
        .unwrap();
    store.save(&Session::new("fresh", "p1", "New", now)).await.unwrap();

    let purged = store
        .purge_older_than(now - Duration::days(30), &["hot".to_string()])
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert_eq!(store.list_ids().await.unwrap(), vec!["fresh", "hot"]);

    let purged = store.purge_older_than(now - Duration::days(30), &[]).await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(store.list_ids().await.unwrap(), vec!["fresh"]);
}

#[tokio::test]
async fn test_export_and_backup() {
    let store = memory_store().await;
    store
        .save(&Session::new("s1", "p1", "Aragorn", Utc::now()))
        .await
        .unwrap();
    store
        .save(&Session::new("s2", "p2", "Boromir", Utc::now()))
        .await
        .unwrap();

    let exported: Vec<Session> = serde_json::from_str(&store.export_json().await.unwrap()).unwrap();
    let ids: Vec<_> = exported.iter().map(|s| s.session_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("backup.json");
    store.backup_to(&path).await.unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    let restored: Vec<Session> = serde_json::from_str(&written).unwrap();
    assert_eq!(restored.len(), 2);
}

#[tokio::test]
async fn test_store_shared_between_engine_and_queries() {
    let store = Arc::new(memory_store().await);
    let engine = ContextEngine::new(LoreConfig::default(), store.clone()).unwrap();

    let first = engine.create_session("player-9", "Eowyn").await.unwrap();
    let second = engine.create_session("player-9", "Eowyn").await.unwrap();
    engine.update_reputation(&first, 40).await.unwrap();
    engine.shutdown().await.unwrap();

    let sessions = store.sessions_for_player("player-9").await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session_id, first);
    assert_eq!(sessions[0].character.reputation, 40);
    assert!(sessions.iter().any(|s| s.session_id == second));
}
