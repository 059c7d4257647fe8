// crates/cli/src/main.rs
//! replyradar binary.
//!
//! Reads JSON (file or stdin), prints JSON on stdout. Logs go to stderr and,
//! when `[logging].file_dir` is set, to a daily-rolling file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use replyradar_cli::{commands, input};
use replyradar_core::{series_window_start, EngineConfig, MessageFeatures};
use replyradar_db::Database;
use replyradar_observability::init_tracing;
use replyradar_types::{FollowupEvent, Granularity, TimeRange};

#[derive(Parser)]
#[command(name = "replyradar")]
#[command(about = "Conversation follow-up state and effectiveness analytics")]
struct Cli {
    /// Config file (default: <config dir>/replyradar/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// SQLite database path. Commands that persist use it when given;
    /// `due` and `interpret` fall back to the default location.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Evaluation time (RFC 3339); defaults to the current time
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a signal bundle and print the resulting state
    Evaluate {
        /// Bundle JSON file (`-` or omitted for stdin)
        file: Option<PathBuf>,
        /// Record the result (and read the previous state) under this id; needs --db
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Recompute follow-up episodes from a JSON array of messages
    Derive {
        /// Messages JSON file (`-` or omitted for stdin)
        file: Option<PathBuf>,
    },

    /// Bucketed follow-up series and summary
    Series {
        /// Look-back window: 24h, 7d, 30d or 90d
        #[arg(long, default_value = "30d")]
        range: TimeRange,
        /// Bucket width: hour, day, week or month
        #[arg(long)]
        granularity: Option<Granularity>,
        /// Episodes JSON file; when omitted, episodes are read from --db
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Show whether the classifier would run for a message, without calling it
    Gate {
        /// Message text
        text: String,
        /// Ingestion features as a JSON object
        #[arg(long)]
        features: Option<String>,
        /// Also show today's budget usage for this conversation; needs --db
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Run the classifier for a message through the configured command
    Interpret {
        /// Conversation id (budget scope)
        #[arg(long)]
        conversation: String,
        /// Message text
        text: String,
        /// Recent message bodies that shape the cache key (repeatable)
        #[arg(long)]
        context: Vec<String>,
    },

    /// List conversations whose follow-up is due
    Due,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

async fn open_db(path: Option<&PathBuf>) -> Result<Database> {
    match path {
        Some(p) => Database::new(p)
            .await
            .with_context(|| format!("opening database {}", p.display())),
        None => Database::open_default().await.context("opening default database"),
    }
}

async fn open_db_if_given(path: Option<&PathBuf>) -> Result<Option<Database>> {
    match path {
        Some(_) => Ok(Some(open_db(path).await?)),
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("loading config")?;
    let _tracing = init_tracing(&config.logging).context("initializing logging")?;

    let now = cli.now.unwrap_or_else(Utc::now);
    tracing::debug!(%now, "replyradar starting");

    match cli.command {
        Commands::Evaluate { file, conversation } => {
            let text = input::read_source(file.as_deref())?;
            let bundle = input::parse_bundle(&text, &config.thresholds, now)?;
            let db = open_db_if_given(cli.db.as_ref()).await?;
            let store = match (&db, conversation.as_deref()) {
                (Some(db), Some(id)) => Some((db, id)),
                (None, Some(_)) => anyhow::bail!("--conversation needs --db"),
                _ => None,
            };
            let result = commands::evaluate(bundle, store).await?;
            print_json(&result, cli.pretty)
        }
        Commands::Derive { file } => {
            let text = input::read_source(file.as_deref())?;
            let batch = input::parse_messages(&text)?;
            let db = open_db_if_given(cli.db.as_ref()).await?;
            let report = commands::derive(batch, db.as_ref(), &config.followup).await?;
            print_json(&report, cli.pretty)
        }
        Commands::Series {
            range,
            granularity,
            events,
        } => {
            let events: Vec<FollowupEvent> = match events {
                Some(path) => {
                    let text = input::read_source(Some(path.as_path()))?;
                    serde_json::from_str(&text)
                        .context("expected a JSON array of follow-up events")?
                }
                None => {
                    let db = open_db(cli.db.as_ref()).await?;
                    let since = series_window_start(range, granularity, now);
                    db.get_followup_events_since(since)
                        .await
                        .context("loading follow-up events")?
                }
            };
            print_json(&commands::series(&events, range, granularity, now), cli.pretty)
        }
        Commands::Gate {
            text,
            features,
            conversation,
        } => {
            let features = MessageFeatures::parse(features.as_deref());
            let db = open_db_if_given(cli.db.as_ref()).await?;
            let budget = match (&db, conversation.as_deref()) {
                (Some(db), Some(id)) => Some((db, id, now)),
                _ => None,
            };
            let report = commands::gate(&text, &features, &config.ai, budget).await?;
            print_json(&report, cli.pretty)
        }
        Commands::Interpret {
            conversation,
            text,
            context,
        } => {
            let db = Arc::new(open_db(cli.db.as_ref()).await?);
            let report =
                commands::interpret(db, &config.ai, &conversation, &text, &context, now).await?;
            print_json(&report, cli.pretty)
        }
        Commands::Due => {
            let db = open_db(cli.db.as_ref()).await?;
            print_json(&commands::due(&db, now).await?, cli.pretty)
        }
    }
}
