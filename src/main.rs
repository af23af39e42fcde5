use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use creator_lift::attribution::AttributionEngine;
use creator_lift::config::{AnalysisSettings, Config};
use creator_lift::db::models::{ConfounderImpact, ConfounderType, LabelSource, Metrics};
use creator_lift::db::{Database, SqliteDatabase};
use creator_lift::output;
use creator_lift::privacy;
use creator_lift::recommendation::RecommendationEngine;

/// creator-lift: attribution analytics for creator-management agencies.
///
/// Answers which content category is actually converting subscribers, from
/// periodic snapshots of post metrics and fan-acquisition events.
#[derive(Parser)]
#[command(name = "creator-lift", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Show database stats: creator/post/fan counts, last snapshot
    Status,

    /// Run attribution + recommendation analysis for a creator
    Analyze {
        /// Creator id
        creator_id: i64,

        /// Lookback window in days
        #[arg(long, default_value = "30")]
        days: i64,
    },

    /// Record a post metric snapshot (thin wrapper for scripting ingestion)
    RecordSnapshot {
        creator_id: i64,
        platform: String,
        external_post_id: String,

        /// RFC3339 publication timestamp, only used the first time a post is seen
        #[arg(long)]
        posted_at: String,

        /// RFC3339 snapshot timestamp
        #[arg(long)]
        at: String,

        #[arg(long, default_value = "0")]
        views: i64,
        #[arg(long, default_value = "0")]
        likes: i64,
        #[arg(long, default_value = "0")]
        comments: i64,
        #[arg(long, default_value = "0")]
        shares: i64,
        #[arg(long, default_value = "0")]
        saves: i64,

        /// Content category; normalised to "other" if outside the taxonomy
        #[arg(long, default_value = "other")]
        category: String,

        /// Where the category label came from: ml_suggested | user_confirmed | user_override
        #[arg(long, default_value = "ml_suggested")]
        label_source: String,
    },

    /// Record a fan (subscriber) acquisition event
    RecordFan {
        creator_id: i64,

        /// Raw external identifier — hashed before storage, never kept as-is
        external_id: String,

        /// RFC3339 acquisition timestamp
        #[arg(long)]
        acquired_at: String,

        /// Category hint carried by a referral link, if any
        #[arg(long)]
        referral_category: Option<String>,
    },

    /// Record a confounder event (promotion, price change, collab, ...)
    RecordConfounder {
        creator_id: i64,

        /// price_change | promotion | collab | external_traffic | mass_dm | platform_promo | other
        event_type: String,

        /// RFC3339 start timestamp
        #[arg(long)]
        start_at: String,

        /// RFC3339 end timestamp; absent means a point event
        #[arg(long)]
        end_at: Option<String>,

        /// low | medium | high
        #[arg(long, default_value = "medium")]
        impact: String,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Re-run weighted fan attribution for a creator (also run automatically
    /// before every `analyze`)
    AttributeFans {
        creator_id: i64,

        /// Attribution window in hours; defaults to the creator's
        /// optimal_attribution_window_hours
        #[arg(long)]
        window_hours: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("creator_lift=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let config = Config::load()?;
            info!(db_path = %config.db_path, "initializing database");
            let conn = creator_lift::db::initialize(&config.db_path)?;
            let table_count = creator_lift::db::schema::table_count(&conn)?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext: record some snapshots and fans, then run `creator-lift analyze <creator_id>`.");
        }

        Commands::Status => {
            let config = Config::load()?;
            creator_lift::status::show(&config)?;
        }

        Commands::Analyze { creator_id, days } => {
            let config = Config::load()?;
            let db = open_database(&config).await?;

            let creator = db
                .get_creator(creator_id)
                .await?
                .with_context(|| format!("no creator with id {creator_id}"))?;

            let settings = AnalysisSettings::default();
            let engine = RecommendationEngine::new(db, settings);
            let report = engine.generate(creator_id, days).await?;

            info!(
                creator_id,
                days,
                confident = report.confident.len(),
                hypothesis = report.hypothesis.len(),
                has_confounders = report.has_confounders,
                "analysis complete"
            );
            if report.has_confounders {
                warn!(creator_id, "recommendation downgraded: confounders overlap analysis window");
            }

            output::terminal::display_recommendation_report(&creator.name, days, &report);
        }

        Commands::RecordSnapshot {
            creator_id,
            platform,
            external_post_id,
            posted_at,
            at,
            views,
            likes,
            comments,
            shares,
            saves,
            category,
            label_source,
        } => {
            let config = Config::load()?;
            let db = open_database(&config).await?;

            let posted_at = parse_timestamp(&posted_at)?;
            let at = parse_timestamp(&at)?;
            let taxonomy: Vec<String> = AnalysisSettings::default().category_taxonomy;
            let category = creator_lift::db::models::normalize_category(&category, &taxonomy);
            let label_source = parse_label_source(&label_source);

            let post_id = db
                .get_or_create_post(creator_id, &platform, &external_post_id, posted_at, &category, label_source)
                .await?;

            let metrics = Metrics { views, likes, comments, shares, saves };
            let store = creator_lift::snapshot_store::SnapshotStore::new(db);
            let outcome = store.record(post_id, creator_id, at, &metrics, None).await?;

            match outcome {
                creator_lift::snapshot_store::RecordOutcome::Created => {
                    println!("Recorded snapshot for post {post_id} at {at}");
                }
                creator_lift::snapshot_store::RecordOutcome::AlreadyRecorded => {
                    println!("Snapshot at {at} for post {post_id} already recorded (no-op)");
                }
            }
        }

        Commands::RecordFan {
            creator_id,
            external_id,
            acquired_at,
            referral_category,
        } => {
            let config = Config::load()?;
            config.require_hash_salt()?;
            let db = open_database(&config).await?;

            let acquired_at = parse_timestamp(&acquired_at)?;
            let hash = privacy::hash_external_id(&external_id, config.hash_salt.as_bytes());

            let fan_id = db
                .insert_fan(creator_id, acquired_at, &hash, referral_category.as_deref())
                .await?;
            println!("Recorded fan {fan_id} for creator {creator_id} at {acquired_at}");
        }

        Commands::RecordConfounder {
            creator_id,
            event_type,
            start_at,
            end_at,
            impact,
            description,
        } => {
            let config = Config::load()?;
            let db = open_database(&config).await?;

            let start_at = parse_timestamp(&start_at)?;
            let end_at = end_at.map(|s| parse_timestamp(&s)).transpose()?;
            let event_type = ConfounderType::parse(&event_type);
            let impact = ConfounderImpact::parse(&impact);

            let id = db
                .insert_confounder(creator_id, event_type, start_at, end_at, impact, &description)
                .await?;
            println!("Recorded confounder event {id} for creator {creator_id}");
        }

        Commands::AttributeFans { creator_id, window_hours } => {
            let config = Config::load()?;
            let db = open_database(&config).await?;

            let window_hours = match window_hours {
                Some(h) => h,
                None => {
                    let creator = db
                        .get_creator(creator_id)
                        .await?
                        .with_context(|| format!("no creator with id {creator_id}"))?;
                    creator.optimal_attribution_window_hours
                }
            };

            let engine = AttributionEngine::new(db);
            let summary = engine.attribute_fans(creator_id, window_hours).await?;

            info!(
                creator_id,
                window_hours,
                referral_link = summary.referral_link_count,
                weighted_window = summary.weighted_window_count,
                unattributed = summary.unattributed_count,
                "fan attribution complete"
            );
            println!(
                "Attributed {} fan(s) via referral link, {} via weighted window, {} left unattributed",
                summary.referral_link_count, summary.weighted_window_count, summary.unattributed_count
            );
            for note in &summary.notes {
                println!("  {note}");
            }
        }
    }

    Ok(())
}

async fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    let conn = creator_lift::db::open(&config.db_path)?;
    Ok(Arc::new(SqliteDatabase::new(conn)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid RFC3339 timestamp: {s}"))?
        .with_timezone(&Utc))
}

fn parse_label_source(s: &str) -> LabelSource {
    LabelSource::parse(s)
}
