use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use complaint_medallion::{BronzeStage, GoldStage, PipelineConfig, SilverStage, run_all};

#[derive(Parser)]
#[command(name = "medallion")]
#[command(about = "Bronze/silver/gold cleaning of consumer-complaint exports")]
#[command(version)]
struct Cli {
    /// JSON configuration overriding the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the raw export files
    Bronze,
    /// Standardize the bronze output
    Silver,
    /// Curate the silver output into region reports
    Gold,
    /// Run every stage in order
    All,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let start = Instant::now();
    match cli.command {
        Commands::Bronze => {
            BronzeStage::new(&config).run().context("Bronze stage failed")?;
        }
        Commands::Silver => {
            SilverStage::new(&config).run().context("Silver stage failed")?;
        }
        Commands::Gold => {
            GoldStage::new(&config).run().context("Gold stage failed")?;
        }
        Commands::All => {
            run_all(&config).context("Pipeline failed")?;
        }
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
