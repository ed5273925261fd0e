use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use murmur::cache::TtlCache;
use murmur::comments::import::read_comment_file;
use murmur::comments::CommentResolver;
use murmur::config::Config;
use murmur::db::models::CommentRecord;
use murmur::db::Database;
use murmur::pipeline::{ExtractionSettings, TieredExtractor, TopicService};
use murmur::topics::primary::MessagesProvider;
use murmur::topics::secondary::ChatCompletionsProvider;
use murmur::topics::traits::{TopicProvider, UnconfiguredProvider};

/// Murmur: find what people are talking about under a post.
///
/// Resolves a post's comments, extracts a small ranked set of discussion
/// topics through a primary → secondary → local fallback chain, and keeps
/// exactly one topic set per post.
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Load comments for a post from a file (JSON or one comment per line)
    Import {
        /// The post the comments belong to
        post_id: String,

        /// Path to the comment file
        file: PathBuf,

        /// Write to the legacy flat comment table instead of the structured store
        #[arg(long)]
        legacy: bool,
    },

    /// Extract topics for one post
    Analyze {
        post_id: String,

        /// Ignore a recently cached result and run again
        #[arg(long)]
        force: bool,
    },

    /// Extract topics for many posts (defaults to every post still missing topics)
    AnalyzeBatch {
        post_ids: Vec<String>,

        /// Number of posts to analyze in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: u32,

        /// Max pending posts to pick up when no ids are given (default: 500)
        #[arg(long, default_value = "500")]
        limit: u32,
    },

    /// Show a post's stored topics
    Topics { post_id: String },

    /// Remove superseded topic sets
    Reconcile {
        /// Keep running, one pass every SECS seconds, until Ctrl-C
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Show system status (DB stats, providers, recent analyses)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("murmur=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing Murmur database...");
            let db = murmur::db::initialize_sqlite(&config.db_path)?;
            let table_count = db.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nMurmur is ready. Next step: set up your .env file");
            println!("  (see .env.example for the provider API keys)");
            println!("\nThen run: murmur import <post_id> <file>");
        }

        Commands::Import {
            post_id,
            file,
            legacy,
        } => {
            let db = murmur::db::open_sqlite(&config.db_path)?;
            let comments = read_comment_file(&file)?;

            if legacy {
                let inserted = db.insert_legacy_comments(&post_id, &comments).await?;
                println!("Imported {inserted} comments for {post_id} into the legacy table");
            } else {
                db.save_post_comments(&post_id, &comments).await?;
                println!("Imported {} comments for {post_id}", comments.len());
            }
        }

        Commands::Analyze { post_id, force } => {
            let db = murmur::db::open_sqlite(&config.db_path)?;
            let service = build_service(&config, db)?;

            let report = if force {
                service.reanalyze(&post_id).await
            } else {
                service.analyze(&post_id).await
            };
            murmur::output::terminal::display_report(&post_id, &report);

            if report.success {
                let topics = service.get_topics(&post_id).await?;
                murmur::output::terminal::display_topics(&post_id, &topics);
            }
        }

        Commands::AnalyzeBatch {
            post_ids,
            concurrency,
            limit,
        } => {
            let db = murmur::db::open_sqlite(&config.db_path)?;

            let post_ids = if post_ids.is_empty() {
                db.posts_pending_analysis(limit).await?
            } else {
                post_ids
            };
            if post_ids.is_empty() {
                println!("No posts waiting for analysis.");
                return Ok(());
            }

            println!(
                "Analyzing {} posts ({} concurrent)...",
                post_ids.len(),
                concurrency
            );
            let service = build_service(&config, db)?;
            let results = murmur::pipeline::batch::analyze_many(
                &service,
                post_ids,
                concurrency as usize,
                true,
            )
            .await?;

            for (post_id, report) in results.iter().filter(|(_, r)| !r.success) {
                murmur::output::terminal::display_report(post_id, report);
            }
            let summary = murmur::pipeline::batch::BatchSummary::from_reports(&results);
            murmur::output::terminal::display_batch_summary(&summary);
        }

        Commands::Topics { post_id } => {
            let db = murmur::db::open_sqlite(&config.db_path)?;
            let topics = db.get_topics(&post_id).await?;
            murmur::output::terminal::display_topics(&post_id, &topics);
        }

        Commands::Reconcile { watch } => {
            let db = murmur::db::open_sqlite(&config.db_path)?;

            match watch {
                None => {
                    let report = murmur::pipeline::reconcile::run_once(db.as_ref()).await?;
                    murmur::output::terminal::display_reconcile(&report);
                }
                Some(secs) => {
                    println!(
                        "Reconciling every {secs}s. {}",
                        "Press Ctrl-C to stop.".dimmed()
                    );
                    let shutdown = async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            warn!(error = %e, "Failed to listen for Ctrl-C");
                            std::future::pending::<()>().await;
                        }
                    };
                    let totals = murmur::pipeline::reconcile::run_periodic(
                        db,
                        Duration::from_secs(secs.max(1)),
                        shutdown,
                    )
                    .await;
                    murmur::output::terminal::display_reconcile(&totals);
                }
            }
        }

        Commands::Status => {
            if !murmur::status::is_initialized(&config.db_path) {
                println!("Database: not initialized");
                println!("\nRun `murmur init` to set up the database.");
                return Ok(());
            }
            let db = murmur::db::open_sqlite(&config.db_path)?;
            murmur::status::show(&db, &config).await?;
        }
    }

    Ok(())
}

/// Wire the providers, resolver, and extractor from config.
///
/// A provider whose API key is missing is replaced by a stand-in that
/// always fails as "not configured", so the cascade skips it.
fn build_service(config: &Config, db: Arc<dyn Database>) -> Result<TopicService> {
    let primary: Arc<dyn TopicProvider> = match config.require_primary() {
        Ok(()) => Arc::new(
            MessagesProvider::new(&config.primary_api_key, &config.primary_model)?
                .with_base_url(&config.primary_url)
                .with_retry_delay(config.retry_delay)
                .with_max_topics(config.max_topics),
        ),
        Err(e) => {
            warn!(error = %e, "Primary provider disabled");
            Arc::new(UnconfiguredProvider::new("primary"))
        }
    };

    let secondary: Arc<dyn TopicProvider> = match config.require_secondary() {
        Ok(()) => Arc::new(
            ChatCompletionsProvider::new(&config.secondary_api_key, &config.secondary_model)?
                .with_base_url(&config.secondary_url)
                .with_retry_delay(config.retry_delay)
                .with_max_topics(config.max_topics),
        ),
        Err(e) => {
            warn!(error = %e, "Secondary provider disabled");
            Arc::new(UnconfiguredProvider::new("secondary"))
        }
    };

    let settings = ExtractionSettings {
        provider_timeout: config.provider_timeout,
        max_topics: config.max_topics,
        ..ExtractionSettings::default()
    };
    let extractor = TieredExtractor::new(primary, secondary).with_settings(settings);

    let comment_cache = Arc::new(TtlCache::<Vec<CommentRecord>>::new(config.comment_cache_ttl));
    let resolver = CommentResolver::new(comment_cache, db.clone());

    Ok(TopicService::new(db, resolver, extractor).with_result_ttl(config.result_cache_ttl))
}
