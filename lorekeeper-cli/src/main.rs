//! Lorekeeper CLI - drive and inspect game sessions from the terminal

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use lorekeeper_core::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lorekeeper")]
#[command(about = "Lorekeeper session context engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; defaults to lorekeeper.toml plus LOREKEEPER_* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database URL, overriding the configured store
    #[arg(short, long, global = true, env = "LOREKEEPER_DATABASE_URL")]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session management commands
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Record a player action and apply it
    Act {
        /// Session ID
        session_id: String,
        /// Command text, e.g. "/attack goblin"
        command: String,
        /// Narrated outcome
        #[arg(short, long, default_value = "")]
        outcome: String,
        /// Action type, overriding the one parsed from the command
        #[arg(short, long)]
        kind: Option<String>,
        /// Consequence tag to apply (repeatable)
        #[arg(long = "consequence")]
        consequences: Vec<String>,
        /// Metadata entry as key=value; values are parsed as JSON when possible
        #[arg(short, long = "meta", value_parser = parse_meta)]
        metadata: Vec<(String, Value)>,
    },
    /// Print the game master prompt for a session
    Prompt {
        /// Session ID
        session_id: String,
        /// Print structured prompt data instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print engine and store metrics
    Metrics,
    /// Export every stored session as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete stored sessions not updated for the given number of days
    Purge {
        /// Age in days
        #[arg(long)]
        days: u32,
    },
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Create a new session
    Create {
        /// Player ID
        #[arg(short, long)]
        player: String,
        /// Character name
        #[arg(short, long)]
        name: String,
    },
    /// Show a session summary
    Status {
        /// Session ID
        id: String,
    },
    /// List stored sessions
    List {
        /// Only sessions owned by this player
        #[arg(short, long)]
        player: Option<String>,
    },
    /// Move the player to a location
    Move {
        /// Session ID
        id: String,
        /// Destination
        location: String,
    },
    /// Shift the character's health
    Health {
        /// Session ID
        id: String,
        /// Signed change
        #[arg(allow_negative_numbers = true)]
        delta: i32,
    },
    /// Shift the character's reputation
    Reputation {
        /// Session ID
        id: String,
        /// Signed change
        #[arg(allow_negative_numbers = true)]
        delta: i32,
    },
    /// Record an interaction with an NPC
    Npc {
        /// Session ID
        id: String,
        /// NPC ID
        npc_id: String,
        /// NPC display name
        #[arg(short, long)]
        name: String,
        /// Signed disposition change
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        delta: i32,
        /// Fact the NPC learns (repeatable)
        #[arg(long = "fact")]
        facts: Vec<String>,
    },
    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },
}

fn parse_meta(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// The instant `days` days before `now`
fn purge_cutoff(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    TimeDelta::try_days(i64::from(days))
        .and_then(|age| now.checked_sub_signed(age))
        .with_context(|| format!("--days {} reaches past the earliest representable date", days))
}

fn load_config(cli: &Cli) -> Result<LoreConfig> {
    let mut config = match &cli.config {
        Some(path) => LoreConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => LoreConfig::load()?,
    };
    if let Some(url) = &cli.database {
        config.storage = StorageConfig::sqlite(url.clone());
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// The engine plus direct access to the SQLite store when one is configured
struct Backend {
    engine: ContextEngine,
    sqlite: Option<Arc<SqliteSessionStore>>,
}

impl Backend {
    async fn open(config: LoreConfig) -> Result<Self> {
        let (store, sqlite) = match &config.storage {
            StorageConfig::Sqlite { url, max_connections } => {
                let store = Arc::new(SqliteSessionStore::connect(url, *max_connections).await?);
                (store.clone() as Arc<dyn SessionStore>, Some(store))
            }
            StorageConfig::Memory => {
                warn!("Using the in-memory store; sessions are lost when this command exits");
                (Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>, None)
            }
        };
        store.health_check().await?;

        let engine = ContextEngine::new(config, store)?;
        Ok(Self { engine, sqlite })
    }

    fn sqlite(&self, command: &str) -> Result<&SqliteSessionStore> {
        match &self.sqlite {
            Some(store) => Ok(store.as_ref()),
            None => bail!("'{}' needs the sqlite store (pass --database)", command),
        }
    }

    async fn close(self) -> Result<()> {
        let report = self.engine.shutdown().await?;
        if !report.is_clean() {
            for (session_id, error) in &report.failed {
                warn!(session_id = %session_id, error = %error, "Session not persisted");
            }
            bail!("{} session(s) could not be persisted", report.failed.len());
        }
        Ok(())
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("lorekeeper {}", env!("CARGO_PKG_VERSION"));
        println!("lorekeeper-core {}", lorekeeper_core::VERSION);
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_tracing(&config.logging);

    let backend = Backend::open(config).await?;
    let result = run(&backend, cli.command).await;
    let closed = backend.close().await;
    result.and(closed)
}

async fn run(backend: &Backend, command: Commands) -> Result<()> {
    let engine = &backend.engine;

    match command {
        Commands::Version => {}
        Commands::Session { command } => match command {
            SessionCommands::Create { player, name } => {
                let session_id = engine.create_session(&player, &name).await?;
                info!(session_id = %session_id, "Session created");
                println!("{}", session_id);
            }
            SessionCommands::Status { id } => {
                print_json(&engine.context_summary(&id).await?)?;
            }
            SessionCommands::List { player } => match player {
                Some(player) => {
                    let store = backend.sqlite("session list --player")?;
                    for session in store.sessions_for_player(&player).await? {
                        println!(
                            "{}\t{}\t{}\t{}",
                            session.session_id,
                            session.character.name,
                            session.location.current,
                            session.last_update.to_rfc3339()
                        );
                    }
                }
                None => {
                    for session_id in engine.store().list_ids().await? {
                        println!("{}", session_id);
                    }
                }
            },
            SessionCommands::Move { id, location } => {
                engine.update_location(&id, &location).await?;
                println!("{}", location.trim());
            }
            SessionCommands::Health { id, delta } => {
                println!("{}", engine.update_character_health(&id, delta).await?);
            }
            SessionCommands::Reputation { id, delta } => {
                let reputation = engine.update_reputation(&id, delta).await?;
                println!("{} ({})", reputation, reputation_description(reputation));
            }
            SessionCommands::Npc {
                id,
                npc_id,
                name,
                delta,
                facts,
            } => {
                let npc = engine
                    .update_npc_relationship(&id, &npc_id, &name, delta, facts)
                    .await?;
                print_json(&npc)?;
            }
            SessionCommands::Delete { id } => {
                if !engine.delete_session(&id).await? {
                    bail!("session '{}' not found", id);
                }
            }
        },
        Commands::Act {
            session_id,
            command,
            outcome,
            kind,
            consequences,
            metadata,
        } => {
            let metadata: Map<String, Value> = metadata.into_iter().collect();
            let mut request = ActionRequest::from_command(command).outcome(outcome);
            if let Some(kind) = kind {
                request = request.kind(kind);
            }
            for tag in &consequences {
                request = request.tagged(tag, &metadata)?;
            }
            for (key, value) in metadata {
                request = request.metadata(key, value);
            }

            let action_id = engine.record_action(&session_id, request).await?;
            engine.wait_idle().await;

            let session = engine.session(&session_id).await?;
            print_json(&json!({
                "action_id": action_id,
                "health": session.character.health.to_string(),
                "reputation": session.character.reputation,
                "location": session.location.current,
                "total_actions": session.stats.total_actions,
            }))?;
        }
        Commands::Prompt { session_id, json } => {
            if json {
                print_json(&engine.prompt_data(&session_id).await?)?;
            } else {
                println!("{}", engine.generate_prompt(&session_id).await?);
            }
        }
        Commands::Metrics => {
            let metrics = engine.metrics().await;
            let storage = match &backend.sqlite {
                Some(store) => Some(store.stats().await?),
                None => None,
            };
            print_json(&json!({ "engine": metrics, "storage": storage }))?;
        }
        Commands::Export { output } => {
            let store = backend.sqlite("export")?;
            match output {
                Some(path) => store.backup_to(&path).await?,
                None => println!("{}", store.export_json().await?),
            }
        }
        Commands::Purge { days } => {
            let cutoff = purge_cutoff(Utc::now(), days)?;
            let purged = engine.purge_older_than(cutoff).await?;
            println!("{}", purged);
        }
    }

    Ok(())
}
