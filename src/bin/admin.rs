//! CLI administration tool for tinyurl-core.
//!
//! Inspects the id sequence and click pipeline, runs the background jobs
//! once on demand, and prints statistics without going through a service.
//!
//! # Usage
//!
//! ```bash
//! # Where the shared counter stands
//! cargo run --bin tinyurl-admin -- sequence show
//!
//! # Reserve a block and print fresh codes
//! cargo run --bin tinyurl-admin -- codes generate -n 5
//!
//! # Click pipeline
//! cargo run --bin tinyurl-admin -- clicks pending
//! cargo run --bin tinyurl-admin -- clicks process
//!
//! # Remove expired links
//! cargo run --bin tinyurl-admin -- links cleanup
//!
//! # Statistics
//! cargo run --bin tinyurl-admin -- stats top -n 10
//! cargo run --bin tinyurl-admin -- stats url k8mRho4 --granularity day --days 7
//!
//! # Check backend connections
//! cargo run --bin tinyurl-admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the service; see `tinyurl_core::config`.

use tinyurl_core::application::scheduler::{JobScheduler, TickOutcome};
use tinyurl_core::application::services::{SequenceBlockAllocator, ShortCodeGenerator, StatsService};
use tinyurl_core::config::{self, Config};
use tinyurl_core::domain::cleanup_worker::CleanupWorker;
use tinyurl_core::domain::click_worker::AggregationWorker;
use tinyurl_core::domain::entities::Granularity;
use tinyurl_core::domain::repositories::{ClickLog, SequenceRepository};
use tinyurl_core::infrastructure::persistence::{
    PgLinkRepository, PgLockRepository, PgRollupRepository, PgSequenceRepository,
};
use tinyurl_core::runtime;
use tinyurl_core::utils::id_shuffler::SPACE;

use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for managing tinyurl-core.
#[derive(Parser)]
#[command(name = "tinyurl-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect the shared id counter
    Sequence {
        #[command(subcommand)]
        action: SequenceAction,
    },

    /// Generate short codes
    Codes {
        #[command(subcommand)]
        action: CodesAction,
    },

    /// Inspect or drive the click pipeline
    Clicks {
        #[command(subcommand)]
        action: ClicksAction,
    },

    /// Link maintenance
    Links {
        #[command(subcommand)]
        action: LinksAction,
    },

    /// Show statistics
    Stats {
        #[command(subcommand)]
        action: StatsAction,
    },

    /// Backend diagnostics
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum SequenceAction {
    /// Show the counter and how much of the code space is used
    Show,
}

#[derive(Subcommand)]
enum CodesAction {
    /// Reserve a block and print fresh codes
    Generate {
        /// Number of codes
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,
    },
}

#[derive(Subcommand)]
enum ClicksAction {
    /// Count delivered but unacknowledged click events
    Pending,

    /// Run one aggregation cycle now
    Process,
}

#[derive(Subcommand)]
enum LinksAction {
    /// Delete links whose expiry has passed
    Cleanup {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StatsAction {
    /// System totals and the most clicked links
    Top {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u32,
    },

    /// Rollup series and device breakdown for one code
    Url {
        code: String,

        /// `hour` or `day`
        #[arg(short, long, default_value = "hour")]
        granularity: String,

        /// How far back to look, in days
        #[arg(short, long, default_value_t = 1)]
        days: i64,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Check Postgres and Redis connections
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let pool = Arc::new(pool);

    match cli.command {
        Commands::Sequence { action } => handle_sequence(action, pool).await?,
        Commands::Codes { action } => handle_codes(action, &config, pool).await?,
        Commands::Clicks { action } => handle_clicks(action, &config, pool).await?,
        Commands::Links { action } => handle_links(action, &config, pool).await?,
        Commands::Stats { action } => handle_stats(action, pool).await?,
        Commands::Db { action } => handle_db(action, &config, &pool).await?,
    }

    Ok(())
}

async fn handle_sequence(action: SequenceAction, pool: Arc<PgPool>) -> Result<()> {
    match action {
        SequenceAction::Show => {
            println!("{}", "🔢 Id Sequence".bright_blue().bold());
            println!();

            let repo = PgSequenceRepository::new(pool);
            let current = repo
                .current()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read sequence: {}", e))?;

            let used = current as f64 / SPACE as f64 * 100.0;
            println!("  Next block start: {}", current.to_string().bright_green().bold());
            println!("  Code space:       {}", SPACE.to_string().bright_white());
            println!("  Used:             {}", format!("{used:.6}%").bright_white());
            println!();
        }
    }

    Ok(())
}

/// Reserves blocks through the same path the service uses and prints codes.
///
/// Ids left in the last block are abandoned when the process exits.
async fn handle_codes(action: CodesAction, config: &Config, pool: Arc<PgPool>) -> Result<()> {
    match action {
        CodesAction::Generate { count } => {
            println!("{}", "✨ Short Codes".bright_blue().bold());
            println!();

            let sequence = Arc::new(PgSequenceRepository::new(pool));
            let allocator = Arc::new(SequenceBlockAllocator::new(sequence, config.operation_timeout));
            let generator = ShortCodeGenerator::new(allocator, count.clamp(1, config.block_size));

            for _ in 0..count {
                let id = generator
                    .next_id()
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to allocate id: {}", e))?;
                let code = tinyurl_core::utils::base62::encode(
                    tinyurl_core::utils::id_shuffler::shuffle(id),
                );
                println!("  {:>14}  {}", id.to_string().bright_black(), code.bright_yellow().bold());
            }
            println!();
        }
    }

    Ok(())
}

async fn handle_clicks(action: ClicksAction, config: &Config, pool: Arc<PgPool>) -> Result<()> {
    let log = Arc::new(runtime::connect_click_log(config).await?);

    match action {
        ClicksAction::Pending => {
            let pending = log
                .pending_count(&config.click_consumer_group)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read pending count: {}", e))?;

            println!("{}", "📬 Click Log".bright_blue().bold());
            println!();
            println!("  Stream:  {}", config.click_stream_key.cyan());
            println!("  Group:   {}", config.click_consumer_group.cyan());
            println!("  Pending: {}", pending.to_string().bright_green().bold());
            println!();
        }
        ClicksAction::Process => {
            println!("{}", "⚙️  Processing clicks".bright_blue().bold());

            let links = Arc::new(PgLinkRepository::new(pool.clone()));
            let rollups = Arc::new(PgRollupRepository::new(pool.clone()));
            let worker = AggregationWorker::new(log, rollups, links, config.worker_config());

            let scheduler = JobScheduler::new(
                Arc::new(PgLockRepository::new(pool)),
                config.lock_policy(),
                config.operation_timeout,
            );
            print_outcome(scheduler.tick(&worker).await);
        }
    }

    Ok(())
}

async fn handle_links(action: LinksAction, config: &Config, pool: Arc<PgPool>) -> Result<()> {
    match action {
        LinksAction::Cleanup { yes } => {
            println!("{}", "🧹 Expired Link Cleanup".bright_blue().bold());
            println!();

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt("Delete all expired links and their statistics?")
                    .default(false)
                    .interact()?;

                if !confirmed {
                    println!("{}", "❌ Cancelled".red());
                    return Ok(());
                }
            }

            let links = Arc::new(PgLinkRepository::new(pool.clone()));
            let worker = CleanupWorker::new(links, config.operation_timeout);
            let scheduler = JobScheduler::new(
                Arc::new(PgLockRepository::new(pool)),
                config.lock_policy(),
                config.operation_timeout,
            );
            print_outcome(scheduler.tick(&worker).await);
        }
    }

    Ok(())
}

async fn handle_stats(action: StatsAction, pool: Arc<PgPool>) -> Result<()> {
    let service = StatsService::new(
        Arc::new(PgLinkRepository::new(pool.clone())),
        Arc::new(PgRollupRepository::new(pool)),
    );

    match action {
        StatsAction::Top { limit } => {
            println!("{}", "📊 Statistics".bright_blue().bold());
            println!();

            let summary = service
                .system_summary(limit)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load statistics: {}", e))?;

            println!(
                "  Links:  {}",
                summary.totals.total_links.to_string().bright_green().bold()
            );
            println!(
                "  Clicks: {}",
                summary.totals.total_clicks.to_string().bright_green().bold()
            );
            println!();

            if summary.top_links.is_empty() {
                println!("{}", "  No links yet".yellow());
                return Ok(());
            }

            println!(
                "  {:<10} {:>10}  {}",
                "Code".bright_white().bold(),
                "Clicks".bright_white().bold(),
                "URL".bright_white().bold()
            );
            println!("  {}", "─".repeat(75).bright_black());
            for link in &summary.top_links {
                println!(
                    "  {:<10} {:>10}  {}",
                    link.code.cyan(),
                    link.total_clicks.to_string().bright_green(),
                    link.long_url.bright_black()
                );
            }
            println!();
        }
        StatsAction::Url {
            code,
            granularity,
            days,
        } => {
            let granularity: Granularity = granularity
                .parse()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let to = Utc::now();
            let from = granularity.bucket_start(to - TimeDelta::days(days.max(1)));

            let stats = service
                .url_stats(&code, granularity, from, to)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let devices = service
                .device_breakdown(&code, granularity, from, to)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            println!("{} {}", "📈".bright_blue(), stats.link.code.bright_blue().bold());
            println!();
            println!("  URL:          {}", stats.link.long_url.cyan());
            println!(
                "  Created:      {}",
                stats.link.created_at.format("%Y-%m-%d %H:%M").to_string().bright_black()
            );
            println!(
                "  All-time:     {}",
                stats.link.total_clicks.to_string().bright_green().bold()
            );
            println!(
                "  In range:     {}",
                stats.clicks_in_range().to_string().bright_green()
            );
            println!();

            for point in &stats.points {
                println!(
                    "  {}  {}",
                    point.bucket_start.format("%Y-%m-%d %H:%M").to_string().bright_black(),
                    point.count.to_string().bright_white()
                );
            }

            if devices.iter().any(|(_, n)| *n > 0) {
                println!();
                for (class, clicks) in &devices {
                    println!("  {:<8} {}", class.to_string().cyan(), clicks);
                }
            }
            println!();
        }
    }

    Ok(())
}

async fn handle_db(action: DbAction, config: &Config, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking connections...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;
            println!("{}", "✅ Database connection OK".green().bold());

            runtime::connect_click_log(config).await?;
            println!("{}", "✅ Redis connection OK".green().bold());
        }
    }

    Ok(())
}

fn print_outcome(outcome: TickOutcome) {
    match outcome {
        TickOutcome::Completed => println!("{}", "✅ Done".green().bold()),
        TickOutcome::Skipped => {
            println!("{}", "⏭️  Another instance holds the lock, try again later".yellow())
        }
        TickOutcome::Abandoned => println!("{}", "❌ Job exceeded its lease and was cancelled".red()),
        TickOutcome::Failed(e) => println!("{} {}", "❌ Failed:".red().bold(), e),
    }
}
