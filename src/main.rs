mod config;
mod delivery;
mod discord;
mod error;
mod format;
mod models;
mod normalize;
mod pipeline;
mod shutdown;
mod snapshot;
mod source;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{parse_keywords, PipelineConfig, DEFAULT_KEYWORDS};
use delivery::{ChatChannel, DEFAULT_CHANNEL_LIMIT};
use discord::{ConsoleChannel, DiscordChannel};
use models::RenderedMessage;
use pipeline::RunSummary;
use snapshot::SnapshotStore;
use source::{FixtureSource, LinkedInSource, ListingSource, SnapshotSource};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobfeed")]
#[command(about = "Find job postings, clean them up, and post them to a chat channel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch fresh listings and deliver them
    Run {
        /// Comma-separated search keywords
        #[arg(short, long, default_value = DEFAULT_KEYWORDS)]
        keywords: String,

        /// Location to search in
        #[arg(short, long, default_value = "")]
        location: String,

        /// Maximum number of jobs to fetch
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Where listings come from
        #[arg(long, value_enum, default_value = "linkedin")]
        source: SourceKind,

        /// Skip visiting each posting for its description
        #[arg(long)]
        no_details: bool,

        /// Seed for the fixture source
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        delivery: DeliveryArgs,

        #[command(flatten)]
        snapshots: SnapshotArgs,
    },

    /// Re-run normalization, formatting and delivery from a raw snapshot
    Replay {
        /// Path to a raw_*.json snapshot
        file: PathBuf,

        /// Maximum number of jobs to replay
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,

        #[command(flatten)]
        delivery: DeliveryArgs,

        #[command(flatten)]
        snapshots: SnapshotArgs,
    },

    /// Deliver an already rendered messages snapshot
    Resend {
        /// Path to a messages_*.json snapshot
        file: PathBuf,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Linkedin,
    Fixture,
}

#[derive(Args)]
struct DeliveryArgs {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Discord channel to post into
    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    channel_id: Option<String>,

    /// Print messages instead of posting them
    #[arg(long)]
    dry_run: bool,

    /// Maximum characters per chat message
    #[arg(long, default_value_t = DEFAULT_CHANNEL_LIMIT)]
    channel_limit: usize,

    /// Minimum milliseconds between two messages
    #[arg(long, default_value = "1500")]
    min_gap_ms: u64,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Directory for JSON snapshots of each stage
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Do not write snapshots
    #[arg(long)]
    no_snapshots: bool,
}

impl SnapshotArgs {
    fn resolve(self) -> Option<PathBuf> {
        if self.no_snapshots {
            None
        } else {
            Some(self.snapshot_dir.unwrap_or_else(SnapshotStore::default_dir))
        }
    }
}

/// Build the chat channel and its destination. Failing here is fatal.
fn build_channel(args: &DeliveryArgs) -> Result<(Box<dyn ChatChannel>, String)> {
    if args.dry_run {
        let destination = args.channel_id.clone().unwrap_or_else(|| "console".to_string());
        return Ok((Box::new(ConsoleChannel), destination));
    }

    let token = args.discord_token.as_deref().unwrap_or_default();
    let channel_id = args
        .channel_id
        .as_deref()
        .ok_or_else(|| anyhow!("No Discord channel configured. Set DISCORD_CHANNEL_ID or pass --channel-id."))?;
    let channel = DiscordChannel::new(token, channel_id).context("Failed to set up Discord delivery")?;
    let destination = channel.channel_id().to_string();
    Ok((Box::new(channel), destination))
}

fn pipeline_config(
    keywords: Vec<String>,
    location: String,
    limit: usize,
    destination: String,
    delivery: &DeliveryArgs,
    snapshot_dir: Option<PathBuf>,
) -> Result<PipelineConfig> {
    let config = PipelineConfig {
        keywords,
        location,
        limit,
        destination,
        snapshot_dir,
        ..Default::default()
    }
    .with_channel_limit(delivery.channel_limit)
    .with_min_gap(Duration::from_millis(delivery.min_gap_ms));
    config.validate()?;
    Ok(config)
}

fn print_summary(summary: &RunSummary) {
    println!("\nResults:");
    println!("  Jobs found:         {}", summary.found);
    if summary.malformed > 0 {
        println!("  Malformed:          {}", summary.malformed);
    }
    println!("  Duplicates removed: {}", summary.duplicates);
    println!("  Normalized:         {}", summary.normalized);
    if summary.format_skipped > 0 {
        println!("  Format skipped:     {}", summary.format_skipped);
    }
    println!("  Delivered:          {}", summary.delivered);
    println!("  Failed:             {}", summary.failed);
    if !summary.failed_jobs.is_empty() {
        println!("  Failed jobs:        {}", summary.failed_jobs.join(", "));
    }
    if summary.not_attempted > 0 {
        println!("  Not attempted:      {} (cancelled)", summary.not_attempted);
    }
    if let Some(err) = &summary.source_error {
        println!("  Source error:       {}", err);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobfeed=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = shutdown::install_shutdown_handler();

    match cli.command {
        Commands::Run {
            keywords,
            location,
            limit,
            source,
            no_details,
            seed,
            delivery,
            snapshots,
        } => {
            let (channel, destination) = build_channel(&delivery)?;
            let config = pipeline_config(
                parse_keywords(&keywords),
                location,
                limit,
                destination,
                &delivery,
                snapshots.resolve(),
            )?;

            let source: Box<dyn ListingSource> = match source {
                SourceKind::Linkedin => Box::new(LinkedInSource::new(!no_details)?),
                SourceKind::Fixture => Box::new(FixtureSource::new(seed)),
            };

            let summary = pipeline::run(source.as_ref(), channel.as_ref(), &config, &cancel).await;
            print_summary(&summary);
        }

        Commands::Replay {
            file,
            limit,
            delivery,
            snapshots,
        } => {
            let (channel, destination) = build_channel(&delivery)?;
            let config = pipeline_config(Vec::new(), String::new(), limit, destination, &delivery, snapshots.resolve())?;

            // Fail fast on an unreadable file instead of reporting zero jobs.
            snapshot::load_raw(&file)?;
            let source = SnapshotSource::new(file);

            let summary = pipeline::run(&source, channel.as_ref(), &config, &cancel).await;
            print_summary(&summary);
        }

        Commands::Resend { file, delivery: args } => {
            let (channel, destination) = build_channel(&args)?;
            let config = pipeline_config(Vec::new(), String::new(), 1, destination, &args, None)?;

            let saved = snapshot::load_messages(&file)?;
            println!("Resending {} message(s) from {}", saved.message_count, file.display());
            let messages: Vec<RenderedMessage> = saved
                .messages
                .into_iter()
                .enumerate()
                .map(|(i, text)| RenderedMessage {
                    job_id: format!("#{}", i),
                    text,
                })
                .collect();

            let result =
                delivery::deliver(channel.as_ref(), &config.destination, messages, &config.delivery, &cancel).await;

            println!("\nResults:");
            println!("  Delivered:          {}", result.delivered);
            println!("  Failed:             {}", result.failed);
            if !result.failed_indices.is_empty() {
                let failed: Vec<String> = result.failed_indices.iter().map(|i| format!("#{}", i)).collect();
                println!("  Failed messages:    {}", failed.join(", "));
            }
            if result.not_attempted > 0 {
                println!("  Not attempted:      {} (cancelled)", result.not_attempted);
            }
        }
    }

    Ok(())
}
