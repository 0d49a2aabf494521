use std::fs::{self, File};
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use zip::ZipArchive;

use super::error::SeedError;

/// Every file a full seeding run expects to find after extraction.
pub const REQUIRED_FILES: &[&str] = &[
    "aged_65_older.csv",
    "cardiovasc_death_rate.csv",
    "cases_deaths.csv",
    "countries.csv",
    "diabetes_prevalence.csv",
    "extreme_poverty.csv",
    "female_smokers.csv",
    "gdp_per_capita.csv",
    "handwashing_facilities.csv",
    "hospital_beds.csv",
    "human_development_index.csv",
    "income_groups.csv",
    "life_expectancy.csv",
    "male_smokers.csv",
    "median_age.csv",
    "population_density.csv",
    "population.csv",
    "vaccinations_age.csv",
    "vaccinations_manufacturer.csv",
    "vaccinations.csv",
];

/// Unpack the bundled CSV archive flat into `csv_dir`, replacing any
/// previous extraction, then verify the full set of required files.
pub fn extract_archive(archive_path: &Path, csv_dir: &Path) -> Result<()> {
    if !archive_path.exists() {
        return Err(SeedError::SourceUnavailable {
            path: archive_path.to_path_buf(),
        }
        .into());
    }
    let file = File::open(archive_path)
        .with_context(|| format!("open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("read zip archive {}", archive_path.display()))?;

    if csv_dir.exists() {
        fs::remove_dir_all(csv_dir)
            .with_context(|| format!("clear {}", csv_dir.display()))?;
    }
    fs::create_dir_all(csv_dir).with_context(|| format!("create {}", csv_dir.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        // Entries may carry directory prefixes; flatten to the bare file name.
        let Some(file_name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_owned()))
        else {
            continue;
        };
        let target = csv_dir.join(&file_name);
        let mut out =
            File::create(&target).with_context(|| format!("create {}", target.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("extract {}", target.display()))?;
        info!(file = %file_name.to_string_lossy(), "extracted");
    }

    verify_required(csv_dir)
}

/// Check the required file manifest against an already-extracted directory.
pub fn verify_required(csv_dir: &Path) -> Result<()> {
    let missing: Vec<String> = REQUIRED_FILES
        .iter()
        .filter(|f| !csv_dir.join(f).exists())
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SeedError::MissingSourceFiles { files: missing }.into());
    }
    info!(files = REQUIRED_FILES.len(), "all csv files extracted and verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testutil::scratch_dir;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(dir: &Path, files: &[&str]) -> std::path::PathBuf {
        let path = dir.join("csv.zip");
        let file = File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for name in files {
            // nested prefix exercises the flattening
            zip.start_file(format!("csv/{name}"), options).unwrap();
            zip.write_all(b"col\nvalue\n").unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn extracts_flat_and_verifies() {
        let dir = scratch_dir("archive-ok");
        let archive = build_archive(&dir, REQUIRED_FILES);
        let csv_dir = dir.join("csv");

        extract_archive(&archive, &csv_dir).unwrap();

        for name in REQUIRED_FILES {
            assert!(csv_dir.join(name).exists(), "missing {name}");
        }
        // no nested csv/ directory left behind
        assert!(!csv_dir.join("csv").exists());
    }

    #[test]
    fn missing_archive_is_source_unavailable() {
        let dir = scratch_dir("archive-missing");
        let err = extract_archive(&dir.join("csv.zip"), &dir.join("csv")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedError>(),
            Some(SeedError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn incomplete_archive_reports_missing_files() {
        let dir = scratch_dir("archive-partial");
        let all_but_countries: Vec<&str> = REQUIRED_FILES
            .iter()
            .copied()
            .filter(|f| *f != "countries.csv")
            .collect();
        let archive = build_archive(&dir, &all_but_countries);

        let err = extract_archive(&archive, &dir.join("csv")).unwrap_err();
        match err.downcast_ref::<SeedError>() {
            Some(SeedError::MissingSourceFiles { files }) => {
                assert_eq!(files, &vec!["countries.csv".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
