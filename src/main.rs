mod clean;
mod config;
mod ingest;
mod keywords;
mod metrics;
mod models;
mod orchestrator;
mod output;
mod preprocess;
mod render;
mod themes;
mod translate;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

/// Bank app review normalization and thematic tagging pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Raw review CSV produced by the collector
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for generated files (default: "out")
    #[arg(short, long, default_value = "out")]
    output_dir: PathBuf,

    /// Path to YAML config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the per-bank balancing target from config
    #[arg(long)]
    target_count: Option<usize>,

    /// Override the balancer RNG seed from config
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    info!("Starting bank-review-themes");

    let args = Args::parse();

    let mut cfg = config::load_config(args.config.as_deref())?;
    if let Some(target) = args.target_count {
        debug!("CLI override - target_count={}", target);
        cfg.balance.target_count = target;
    }
    if let Some(seed) = args.seed {
        debug!("CLI override - seed={}", seed);
        cfg.balance.seed = seed;
    }

    let run_date = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    info!(
        "Run parameters - date={}, input={}, output_dir={}",
        run_date,
        args.input.display(),
        args.output_dir.display()
    );

    orchestrator::run_pipeline(&cfg, &args.input, &args.output_dir, &run_date).await
}
