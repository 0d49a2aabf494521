use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Result};
use futures::future::{join_all, BoxFuture};
use tracing::{error, info};

use super::archive;
use super::attributes::{run_attribute_pass, AttrStats, AttributePass, ATTRIBUTE_PASSES};
use super::countries::{self, import_countries};
use super::datasets::covid_cases::CovidCases;
use super::datasets::life_expectancy::LifeExpectancy;
use super::datasets::vaccinations::Vaccinations;
use super::datasets::vaccinations_age::VaccinationsByAge;
use super::datasets::vaccinations_manufacturer::VaccinationsByManufacturer;
use super::error::SeedError;
use super::loader::{run_fact_import, FactDataset, LoadStats};
use super::progress::Progress;
use super::reader::CsvSource;
use crate::store::countries::{CountryStore, PgCountryStore};
use crate::store::db::Db;
use crate::store::facts::{
    FactStore, PgCovidCases, PgLifeExpectancy, PgVaccinations, PgVaccinationsByAge,
    PgVaccinationsByManufacturer,
};

/// Seeding run configuration.
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub archive_path: PathBuf,
    pub csv_dir: PathBuf,
    pub batch_size: usize,
}

/// Stats assembled across a full run, exported as a JSON snapshot.
#[derive(Debug)]
pub struct SeedReport {
    pub countries: LoadStats,
    pub attributes: Vec<AttrStats>,
    pub facts: Vec<(&'static str, LoadStats)>,
}

/// Run the full pipeline: extract, countries, attributes, facts.
///
/// Stage 2 strictly precedes stages 3 and 4. Within a stage, jobs fan out
/// concurrently and are never cancelled once launched; a job failure is
/// collected, reported, and stops later stages from starting.
pub async fn seed_database(db: &Db, opts: &SeedOptions) -> Result<()> {
    let started = Instant::now();
    let progress = Progress::new();

    let result = run_stages(db, opts, &progress).await;
    // The display is released before any error propagates to the exit path.
    progress.clear();
    let report = result?;

    write_summary(&report, started.elapsed());
    info!("[PHASE] Database Seeding Complete");
    info!("total time: {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

async fn run_stages(db: &Db, opts: &SeedOptions, progress: &Progress) -> Result<SeedReport> {
    info!("[PHASE] Checking CSV files");
    archive::extract_archive(&opts.archive_path, &opts.csv_dir)?;

    let countries_store = PgCountryStore::new(db.clone());

    info!("[PHASE] Importing and verifying country data");
    let countries = run_countries_stage(&countries_store, &opts.csv_dir).await?;

    info!("[PHASE] Updating country attributes");
    let attributes = run_attribute_stage(&countries_store, &opts.csv_dir, None).await?;
    info!("all country attributes updated");

    info!("[PHASE] Importing main datasets");
    let facts = run_fact_stage(db, &countries_store, opts, progress, None).await?;

    Ok(SeedReport {
        countries,
        attributes,
        facts,
    })
}

// Best-effort JSON snapshot of the run, alongside the console summary.
fn write_summary(report: &SeedReport, elapsed: std::time::Duration) {
    let datasets: Vec<serde_json::Value> = report
        .facts
        .iter()
        .map(|(dataset, stats)| serde_json::json!({ "dataset": dataset, "stats": stats }))
        .collect();
    let snapshot = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "countries": report.countries,
        "attributes": report.attributes,
        "datasets": datasets,
        "elapsed_seconds": elapsed.as_secs_f64(),
    });
    let path = format!(
        "exports/seed_summary_{}.json",
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    );
    if std::path::Path::new("exports").exists() || std::fs::create_dir_all("exports").is_ok() {
        let _ = std::fs::write(
            &path,
            serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".into()),
        );
        info!(file = %path, "seed summary written");
    }
}

/// Stage 2. Countries must exist before anything else touches the database;
/// an import that leaves the table empty aborts the run.
pub async fn run_countries_stage(
    store: &dyn CountryStore,
    csv_dir: &Path,
) -> Result<LoadStats> {
    let source = CsvSource::new(csv_dir, countries::FILE_NAME);
    let stats = import_countries(store, &source).await?;
    if store.count().await? == 0 {
        return Err(SeedError::EmptySeed.into());
    }
    Ok(stats)
}

/// Stage 3: attribute passes fan out concurrently. Every failure is logged
/// before the stage verdict; the first one becomes the stage error after
/// all siblings have settled.
pub async fn run_attribute_stage(
    store: &dyn CountryStore,
    csv_dir: &Path,
    only: Option<&[String]>,
) -> Result<Vec<AttrStats>> {
    let passes: Vec<&AttributePass> = ATTRIBUTE_PASSES
        .iter()
        .filter(|p| selected(only, p.job))
        .collect();
    if passes.is_empty() {
        bail!("no attribute passes matched the requested jobs");
    }

    let jobs = passes
        .iter()
        .copied()
        .map(|pass| run_attribute_pass(store, csv_dir, pass));
    let results = join_all(jobs).await;

    let mut stats = Vec::with_capacity(results.len());
    let mut failed: Option<SeedError> = None;
    for (pass, result) in passes.iter().zip(results) {
        match result {
            Ok(s) => stats.push(s),
            Err(e) => {
                error!(job = pass.job, error = %format!("{e:#}"), "attribute job failed");
                if failed.is_none() {
                    failed = Some(SeedError::JobFailed {
                        job: pass.job.to_string(),
                        source: e,
                    });
                }
            }
        }
    }
    if let Some(err) = failed {
        return Err(err.into());
    }
    Ok(stats)
}

/// Stage 4: fact datasets fan out concurrently, each with its own freshly
/// built country lookup and its own repository handle.
pub async fn run_fact_stage(
    db: &Db,
    countries: &dyn CountryStore,
    opts: &SeedOptions,
    progress: &Progress,
    only: Option<&[String]>,
) -> Result<Vec<(&'static str, LoadStats)>> {
    let covid = PgCovidCases::new(db.clone());
    let life = PgLifeExpectancy::new(db.clone());
    let vacc = PgVaccinations::new(db.clone());
    let vacc_age = PgVaccinationsByAge::new(db.clone());
    let vacc_man = PgVaccinationsByManufacturer::new(db.clone());

    let mut jobs: Vec<BoxFuture<'_, (&'static str, Result<LoadStats>)>> = Vec::new();
    if selected(only, CovidCases::SLUG) {
        jobs.push(Box::pin(run_fact_job::<CovidCases>(
            countries, &covid, opts, progress,
        )));
    }
    if selected(only, LifeExpectancy::SLUG) {
        jobs.push(Box::pin(run_fact_job::<LifeExpectancy>(
            countries, &life, opts, progress,
        )));
    }
    if selected(only, Vaccinations::SLUG) {
        jobs.push(Box::pin(run_fact_job::<Vaccinations>(
            countries, &vacc, opts, progress,
        )));
    }
    if selected(only, VaccinationsByAge::SLUG) {
        jobs.push(Box::pin(run_fact_job::<VaccinationsByAge>(
            countries, &vacc_age, opts, progress,
        )));
    }
    if selected(only, VaccinationsByManufacturer::SLUG) {
        jobs.push(Box::pin(run_fact_job::<VaccinationsByManufacturer>(
            countries, &vacc_man, opts, progress,
        )));
    }
    if jobs.is_empty() {
        bail!("no datasets matched the requested names");
    }

    let results = join_all(jobs).await;

    let mut out = Vec::with_capacity(results.len());
    let mut failed: Option<SeedError> = None;
    for (title, result) in results {
        match result {
            Ok(stats) => {
                info!(
                    dataset = title,
                    processed = stats.processed,
                    inserted = stats.inserted,
                    skipped_unresolved = stats.skipped_unresolved,
                    skipped_invalid = stats.skipped_invalid,
                    "dataset import completed"
                );
                out.push((title, stats));
            }
            Err(e) => {
                error!(dataset = title, error = %format!("{e:#}"), "dataset import failed");
                if failed.is_none() {
                    failed = Some(SeedError::JobFailed {
                        job: title.to_string(),
                        source: e,
                    });
                }
            }
        }
    }
    if let Some(err) = failed {
        return Err(err.into());
    }
    Ok(out)
}

async fn run_fact_job<D: FactDataset>(
    countries: &dyn CountryStore,
    store: &dyn FactStore<D::Record>,
    opts: &SeedOptions,
    progress: &Progress,
) -> (&'static str, Result<LoadStats>) {
    let result = async {
        let lookup = countries.load_lookup().await?;
        // Stage 2 already gates on a populated table; this re-checks per job
        // so partial CLI runs get the same guarantee.
        if lookup.is_empty() {
            return Err(SeedError::EmptySeed.into());
        }
        let source = CsvSource::new(&opts.csv_dir, D::FILE_NAME);
        run_fact_import::<D>(&source, &lookup, store, progress, opts.batch_size).await
    }
    .await;
    (D::TITLE, result)
}

fn selected(only: Option<&[String]>, name: &str) -> bool {
    only.map(|o| o.iter().any(|s| s == name)).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testutil::scratch_dir;
    use crate::store::mem::MemCountryStore;
    use std::fs;

    #[tokio::test]
    async fn empty_country_import_fails_the_gate() {
        let dir = scratch_dir("seed-empty");
        fs::write(dir.join(countries::FILE_NAME), "owid,iso3,continent\n").unwrap();
        let store = MemCountryStore::default();

        let err = run_countries_stage(&store, &dir).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedError>(),
            Some(SeedError::EmptySeed)
        ));
    }

    #[tokio::test]
    async fn populated_import_passes_the_gate() {
        let dir = scratch_dir("seed-ok");
        fs::write(
            dir.join(countries::FILE_NAME),
            "owid,iso3,continent\nbrazil,BRA,South America\n",
        )
        .unwrap();
        let store = MemCountryStore::default();

        let stats = run_countries_stage(&store, &dir).await.unwrap();
        assert_eq!(stats.inserted, 1);
        assert!(!store.load_lookup().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attribute_stage_reports_every_failure_before_aborting() {
        // No files on disk: every pass fails with SourceUnavailable, the
        // stage still settles all of them and surfaces the first as fatal.
        let dir = scratch_dir("seed-attr-missing");
        let store = MemCountryStore::with_countries(&[("brazil", "BRA")]);

        let err = run_attribute_stage(&store, &dir, None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedError>(),
            Some(SeedError::JobFailed { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_attribute_selection_is_an_error() {
        let dir = scratch_dir("seed-attr-unknown");
        let store = MemCountryStore::default();
        let only = vec!["not-a-job".to_string()];
        assert!(run_attribute_stage(&store, &dir, Some(only.as_slice()))
            .await
            .is_err());
    }
}
