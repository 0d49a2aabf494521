use std::path::Path;

use anyhow::{Context, Result};
use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::reader::{CsvSource, ReadOutcome};
use crate::store::countries::{CountryField, CountryStore};

/// One attribute-update pass: match rows by ISO code, write one column.
pub struct AttributePass {
    pub job: &'static str,
    pub file: &'static str,
    pub iso_column: &'static str,
    pub value_column: &'static str,
    pub field: CountryField,
}

/// Every pass stage 3 runs. All of them may run concurrently because each
/// one only ever writes its own column.
pub const ATTRIBUTE_PASSES: &[AttributePass] = &[
    AttributePass {
        job: "aged-65-older",
        file: "aged_65_older.csv",
        iso_column: "iso_code",
        value_column: "aged_65_older",
        field: CountryField::Aged65Older,
    },
    AttributePass {
        job: "cardiovasc-death-rate",
        file: "cardiovasc_death_rate.csv",
        iso_column: "iso_code",
        value_column: "cardiovasc_death_rate",
        field: CountryField::CardiovascDeathRate,
    },
    AttributePass {
        job: "diabetes-prevalence",
        file: "diabetes_prevalence.csv",
        iso_column: "iso_code",
        value_column: "diabetes_prevalence",
        field: CountryField::DiabetesPrevalence,
    },
    AttributePass {
        job: "extreme-poverty",
        file: "extreme_poverty.csv",
        iso_column: "iso_code",
        value_column: "extreme_poverty",
        field: CountryField::ExtremePoverty,
    },
    AttributePass {
        job: "female-smokers",
        file: "female_smokers.csv",
        iso_column: "iso_code",
        value_column: "female_smokers",
        field: CountryField::FemaleSmokers,
    },
    AttributePass {
        job: "gdp-per-capita",
        file: "gdp_per_capita.csv",
        iso_column: "iso_code",
        value_column: "gdp_per_capita",
        field: CountryField::GdpPerCapita,
    },
    AttributePass {
        job: "handwashing-facilities",
        file: "handwashing_facilities.csv",
        iso_column: "iso_code",
        value_column: "handwashing_facilities",
        field: CountryField::HandwashingFacilities,
    },
    AttributePass {
        job: "hospital-beds",
        file: "hospital_beds.csv",
        iso_column: "iso_code",
        value_column: "hospital_beds_per_thousand",
        field: CountryField::HospitalBedsPerThousand,
    },
    AttributePass {
        job: "human-development-index",
        file: "human_development_index.csv",
        iso_column: "iso_code",
        value_column: "human_development_index",
        field: CountryField::HumanDevelopmentIndex,
    },
    // The income-group feed comes from a different publisher and keeps its
    // own header casing.
    AttributePass {
        job: "income-group",
        file: "income_groups.csv",
        iso_column: "Code",
        value_column: "Income group",
        field: CountryField::IncomeGroup,
    },
    AttributePass {
        job: "male-smokers",
        file: "male_smokers.csv",
        iso_column: "iso_code",
        value_column: "male_smokers",
        field: CountryField::MaleSmokers,
    },
    AttributePass {
        job: "median-age",
        file: "median_age.csv",
        iso_column: "iso_code",
        value_column: "median_age",
        field: CountryField::MedianAge,
    },
    AttributePass {
        job: "population",
        file: "population.csv",
        iso_column: "iso_code",
        value_column: "population",
        field: CountryField::Population,
    },
    AttributePass {
        job: "population-density",
        file: "population_density.csv",
        iso_column: "iso_code",
        value_column: "population_density",
        field: CountryField::PopulationDensity,
    },
];

/// Counters for one attribute pass. `updated` sums rows touched in the
/// countries table, not rows read.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct AttrStats {
    pub processed: u64,
    pub updated: u64,
}

/// Run one pass over its file. Countries absent from the file are never
/// touched; rows whose ISO code matches nothing update zero rows and move
/// on.
pub async fn run_attribute_pass(
    store: &dyn CountryStore,
    csv_dir: &Path,
    pass: &AttributePass,
) -> Result<AttrStats> {
    let source = CsvSource::new(csv_dir, pass.file);
    let mut rows = source
        .open()
        .with_context(|| format!("{} source", pass.job))?;
    let mut rec = StringRecord::new();
    let mut stats = AttrStats::default();

    loop {
        match rows.read_record(&mut rec)? {
            ReadOutcome::Eof => break,
            ReadOutcome::Skipped => {
                stats.processed += 1;
            }
            ReadOutcome::Row => {
                stats.processed += 1;
                let Some(iso) = rows
                    .field(&rec, pass.iso_column)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                else {
                    debug!(job = pass.job, "row without iso code");
                    continue;
                };
                let value = pass.field.coerce(rows.field(&rec, pass.value_column));
                match store.set_field(iso, pass.field, &value).await {
                    Ok(n) => stats.updated += n,
                    Err(e) => {
                        warn!(job = pass.job, iso, error = %e, "attribute update failed")
                    }
                }
            }
        }
    }

    info!(
        job = pass.job,
        processed = stats.processed,
        updated = stats.updated,
        "attribute pass completed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testutil::scratch_dir;
    use crate::store::countries::FieldValue;
    use crate::store::mem::MemCountryStore;
    use std::fs;

    fn population_pass() -> &'static AttributePass {
        ATTRIBUTE_PASSES
            .iter()
            .find(|p| p.job == "population")
            .unwrap()
    }

    #[tokio::test]
    async fn updates_matching_countries_only() {
        let dir = scratch_dir("attr-pass");
        fs::write(
            dir.join("population.csv"),
            "entity,iso_code,population\nBrazil,BRA,212559409\n",
        )
        .unwrap();
        let store = MemCountryStore::with_countries(&[("brazil", "BRA"), ("france", "FRA")]);

        let stats = run_attribute_pass(&store, &dir, population_pass()).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.updated, 1);

        let snapshot = store.snapshot();
        let brazil = snapshot.iter().find(|c| c.iso_code == "BRA").unwrap();
        assert_eq!(
            brazil.fields.get("population"),
            Some(&FieldValue::Float(Some(212559409.0)))
        );
        // France was not in the file: its column is untouched, not nulled.
        let france = snapshot.iter().find(|c| c.iso_code == "FRA").unwrap();
        assert!(france.fields.get("population").is_none());
    }

    #[tokio::test]
    async fn empty_values_write_null_for_listed_countries() {
        let dir = scratch_dir("attr-null");
        fs::write(
            dir.join("population.csv"),
            "entity,iso_code,population\nBrazil,BRA,\n",
        )
        .unwrap();
        let store = MemCountryStore::with_countries(&[("brazil", "BRA")]);

        run_attribute_pass(&store, &dir, population_pass()).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(
            snapshot[0].fields.get("population"),
            Some(&FieldValue::Float(None))
        );
    }

    #[tokio::test]
    async fn unknown_iso_codes_touch_nothing() {
        let dir = scratch_dir("attr-unknown");
        fs::write(
            dir.join("population.csv"),
            "entity,iso_code,population\nNowhere,XXX,123\n",
        )
        .unwrap();
        let store = MemCountryStore::with_countries(&[("brazil", "BRA")]);

        let stats = run_attribute_pass(&store, &dir, population_pass()).await.unwrap();
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.updated, 0);
    }

    #[test]
    fn pass_table_covers_every_field_once() {
        let fields: std::collections::HashSet<_> =
            ATTRIBUTE_PASSES.iter().map(|p| p.field.column()).collect();
        assert_eq!(fields.len(), ATTRIBUTE_PASSES.len());
        assert_eq!(ATTRIBUTE_PASSES.len(), 14);
        // index used by the other tests
        assert_eq!(population_pass().job, "population");
    }
}
