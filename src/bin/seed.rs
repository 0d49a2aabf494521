use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use covid_compare::ingest::archive::extract_archive;
use covid_compare::ingest::loader::DEFAULT_BATCH_SIZE;
use covid_compare::ingest::progress::Progress;
use covid_compare::ingest::seed::{
    run_attribute_stage, run_countries_stage, run_fact_stage, seed_database, SeedOptions,
};
use covid_compare::logging::init_tracing;
use covid_compare::store::countries::PgCountryStore;
use covid_compare::store::db::Db;
use covid_compare::util::env as env_util;

#[derive(Parser, Debug)]
#[command(name = "seed", version, about = "CovidCompare database seeding CLI")]
struct Cli {
    /// Directory holding csv.zip and the extracted csv/ tree
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Override the archive path (defaults to <data-dir>/csv.zip)
    #[arg(long)]
    archive: Option<PathBuf>,
    /// Records per bulk insert
    #[arg(long, default_value_t = env_util::env_parse("SEED_BATCH_SIZE", DEFAULT_BATCH_SIZE))]
    batch_size: usize,
    /// Optional override for the database URL
    #[arg(long)]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run the whole pipeline: extract, countries, attributes, facts
    All,
    /// Extract and verify the bundled CSV archive, nothing else
    Extract,
    /// Import the country table from an already-extracted csv directory
    Countries,
    /// Run country attribute update passes
    Attributes {
        /// Restrict to specific jobs (e.g. population,median-age)
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,
    },
    /// Run fact dataset imports
    Facts {
        /// Restrict to specific datasets (e.g. covid-cases,vaccinations)
        #[arg(long, value_delimiter = ',')]
        only: Option<Vec<String>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing("info")?;

    let cli = Cli::parse();
    let opts = SeedOptions {
        archive_path: cli
            .archive
            .unwrap_or_else(|| cli.data_dir.join("csv.zip")),
        csv_dir: cli.data_dir.join("csv"),
        batch_size: cli.batch_size,
    };

    if let Err(e) = run(cli.command, opts, cli.db_url).await {
        error!("seeding failed: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Commands, opts: SeedOptions, db_url: Option<String>) -> Result<()> {
    if let Commands::Extract = command {
        extract_archive(&opts.archive_path, &opts.csv_dir)?;
        return Ok(());
    }

    let url = match db_url {
        Some(v) => v,
        None => env_util::db_url()?,
    };
    info!(url = %env_util::redact_db_url(&url), "connecting");
    let db = Db::connect(&url, 10).await?;
    let countries = PgCountryStore::new(db.clone());

    match command {
        Commands::Extract => unreachable!("handled above"),
        Commands::All => seed_database(&db, &opts).await?,
        Commands::Countries => {
            let stats = run_countries_stage(&countries, &opts.csv_dir).await?;
            info!(
                processed = stats.processed,
                inserted = stats.inserted,
                "countries import done"
            );
        }
        Commands::Attributes { only } => {
            run_attribute_stage(&countries, &opts.csv_dir, only.as_deref()).await?;
        }
        Commands::Facts { only } => {
            let progress = Progress::new();
            let result =
                run_fact_stage(&db, &countries, &opts, &progress, only.as_deref()).await;
            progress.clear();
            result?;
        }
    }
    Ok(())
}
