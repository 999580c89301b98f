//! herd CLI - Main entry point

mod fetch;
mod stream;

use clap::{Parser, Subcommand};
use herd_foundation::HerdConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// herd - coordinated requests and cancellable SSE streams
#[derive(Parser, Debug)]
#[command(name = "herd")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to global + project config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open an event stream and print message data as it arrives
    Stream {
        url: String,

        /// Extra request header, `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,

        /// Also print named events as `[type] data`
        #[arg(long)]
        events: bool,
    },
    /// Fetch a JSON endpoint repeatedly through one coordinator
    Fetch {
        url: String,

        /// JSON payload (sent as a POST body and used in the cache key)
        #[arg(short, long)]
        payload: Option<String>,

        /// Number of calls
        #[arg(short = 'n', long, default_value = "1")]
        repeat: u32,

        /// Pause between calls
        #[arg(long, default_value = "0")]
        interval_ms: u64,

        /// Cache lifetime override
        #[arg(long)]
        ttl_ms: Option<u64>,

        /// Throttle window override
        #[arg(long)]
        throttle_ms: Option<u64>,

        /// Bypass cache, throttle and in-flight joining
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load configuration
    let config = match &args.config {
        Some(path) => HerdConfig::load_from(path)?,
        None => HerdConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}", e);
            HerdConfig::default()
        }),
    };
    tracing::debug!(?config, "Configuration loaded");

    match args.command {
        Command::Stream {
            url,
            headers,
            body,
            events,
        } => {
            stream::run(
                &config,
                stream::StreamArgs {
                    url,
                    headers,
                    body,
                    events,
                },
            )
            .await
        }
        Command::Fetch {
            url,
            payload,
            repeat,
            interval_ms,
            ttl_ms,
            throttle_ms,
            force,
        } => {
            let mut coordinator = config.coordinator.clone();
            if let Some(ttl_ms) = ttl_ms {
                coordinator.ttl_ms = ttl_ms;
            }
            if let Some(throttle_ms) = throttle_ms {
                coordinator.throttle_ms = throttle_ms;
            }

            fetch::run(
                &coordinator,
                fetch::FetchArgs {
                    url,
                    payload,
                    repeat,
                    interval_ms,
                    force,
                },
            )
            .await
        }
    }
}
