use anyhow::Result;
use csv::StringRecord;
use tracing::{info, warn};

use super::loader::LoadStats;
use super::reader::{CsvSource, ReadOutcome};
use crate::store::countries::{CountryStore, NewCountry};

pub const FILE_NAME: &str = "countries.csv";

/// Import the country table: one row per country, idempotent on ISO code.
///
/// Everything downstream joins through this table, so it runs alone and is
/// verified non-empty before any other stage starts.
pub async fn import_countries(store: &dyn CountryStore, source: &CsvSource) -> Result<LoadStats> {
    let mut rows = source.open()?;
    let mut rec = StringRecord::new();
    let mut stats = LoadStats::default();

    loop {
        match rows.read_record(&mut rec)? {
            ReadOutcome::Eof => break,
            ReadOutcome::Skipped => {
                stats.processed += 1;
                stats.skipped_invalid += 1;
            }
            ReadOutcome::Row => {
                stats.processed += 1;
                let name = rows
                    .field(&rec, "owid")
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                let iso = rows
                    .field(&rec, "iso3")
                    .map(str::trim)
                    .filter(|s| !s.is_empty());
                let (Some(name), Some(iso)) = (name, iso) else {
                    stats.skipped_invalid += 1;
                    warn!("country row missing name or iso code, skipped");
                    continue;
                };
                let country = NewCountry {
                    name: name.to_string(),
                    iso_code: iso.to_string(),
                    continent: rows
                        .field(&rec, "continent")
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                };
                match store.insert(&country).await {
                    Ok(true) => stats.inserted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(country = %country.name, error = %e, "country insert failed")
                    }
                }
            }
        }
    }

    info!(
        processed = stats.processed,
        inserted = stats.inserted,
        "countries import completed"
    );
    Ok(stats)
}
