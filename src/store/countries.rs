use anyhow::Result;
use async_trait::async_trait;
use sqlx::Row;

use super::db::Db;
use crate::ingest::resolver::CountryLookup;
use crate::ingest::transform::parse_float;

/// A country row as produced by the import pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCountry {
    pub name: String,
    pub iso_code: String,
    pub continent: Option<String>,
}

/// Updatable scalar attribute columns on `countries`.
///
/// Each attribute pass owns exactly one of these. Concurrent passes write
/// disjoint columns, so they never conflict at the row level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryField {
    Aged65Older,
    CardiovascDeathRate,
    DiabetesPrevalence,
    ExtremePoverty,
    FemaleSmokers,
    GdpPerCapita,
    HandwashingFacilities,
    HospitalBedsPerThousand,
    HumanDevelopmentIndex,
    IncomeGroup,
    MaleSmokers,
    MedianAge,
    Population,
    PopulationDensity,
}

impl CountryField {
    pub fn column(self) -> &'static str {
        match self {
            CountryField::Aged65Older => "aged_65_older",
            CountryField::CardiovascDeathRate => "cardiovasc_death_rate",
            CountryField::DiabetesPrevalence => "diabetes_prevalence",
            CountryField::ExtremePoverty => "extreme_poverty",
            CountryField::FemaleSmokers => "female_smokers",
            CountryField::GdpPerCapita => "gdp_per_capita",
            CountryField::HandwashingFacilities => "handwashing_facilities",
            CountryField::HospitalBedsPerThousand => "hospital_beds_per_thousand",
            CountryField::HumanDevelopmentIndex => "human_development_index",
            CountryField::IncomeGroup => "income_group",
            CountryField::MaleSmokers => "male_smokers",
            CountryField::MedianAge => "median_age",
            CountryField::Population => "population",
            CountryField::PopulationDensity => "population_density",
        }
    }

    fn is_text(self) -> bool {
        matches!(self, CountryField::IncomeGroup)
    }

    /// Coerce a raw CSV cell into this field's value. Empty or malformed
    /// cells become NULL; a literal `0` stays `0`.
    pub fn coerce(self, raw: Option<&str>) -> FieldValue {
        if self.is_text() {
            FieldValue::Text(
                raw.map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            )
        } else {
            FieldValue::Float(raw.and_then(parse_float))
        }
    }
}

/// Typed value for one attribute column write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(Option<f64>),
    Text(Option<String>),
}

/// Repository handle for the countries table.
///
/// Every import job receives its own handle; the connection pool is the only
/// shared state behind it.
#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Insert one country, skipping on an existing ISO code. Returns whether
    /// a row was actually persisted.
    async fn insert(&self, country: &NewCountry) -> Result<bool>;

    async fn count(&self) -> Result<i64>;

    /// Snapshot the whole table as ISO/name lookup maps. Built fresh at the
    /// start of every import job; never reused across runs.
    async fn load_lookup(&self) -> Result<CountryLookup>;

    /// Write a single attribute column for every row matching `iso_code`.
    /// Returns the number of rows touched.
    async fn set_field(
        &self,
        iso_code: &str,
        field: CountryField,
        value: &FieldValue,
    ) -> Result<u64>;
}

pub struct PgCountryStore {
    db: Db,
}

impl PgCountryStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CountryStore for PgCountryStore {
    async fn insert(&self, country: &NewCountry) -> Result<bool> {
        let res = sqlx::query(
            "INSERT INTO countries (name, iso_code, continent) VALUES ($1, $2, $3)
             ON CONFLICT (iso_code) DO NOTHING",
        )
        .persistent(false)
        .bind(&country.name)
        .bind(&country.iso_code)
        .bind(&country.continent)
        .execute(&self.db.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT count(*) FROM countries")
            .persistent(false)
            .fetch_one(&self.db.pool)
            .await?;
        Ok(n)
    }

    async fn load_lookup(&self) -> Result<CountryLookup> {
        let rows = sqlx::query("SELECT id, name, iso_code FROM countries")
            .persistent(false)
            .fetch_all(&self.db.pool)
            .await?;
        let mut lookup = CountryLookup::default();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            let iso_code: String = row.try_get("iso_code")?;
            lookup.insert(id, &name, &iso_code);
        }
        Ok(lookup)
    }

    async fn set_field(
        &self,
        iso_code: &str,
        field: CountryField,
        value: &FieldValue,
    ) -> Result<u64> {
        // Column names come from the fixed CountryField enum, never from input.
        let sql = format!(
            "UPDATE countries SET {} = $1 WHERE iso_code = $2",
            field.column()
        );
        let query = sqlx::query(&sql).persistent(false);
        let query = match value {
            FieldValue::Float(v) => query.bind(*v),
            FieldValue::Text(v) => query.bind(v.clone()),
        };
        let res = query.bind(iso_code).execute(&self.db.pool).await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn income_group_coerces_to_text() {
        assert_eq!(
            CountryField::IncomeGroup.coerce(Some(" High income ")),
            FieldValue::Text(Some("High income".to_string()))
        );
        assert_eq!(
            CountryField::IncomeGroup.coerce(Some("")),
            FieldValue::Text(None)
        );
        assert_eq!(CountryField::IncomeGroup.coerce(None), FieldValue::Text(None));
    }

    #[test]
    fn numeric_fields_coerce_to_float_or_null() {
        assert_eq!(
            CountryField::Population.coerce(Some("212559409")),
            FieldValue::Float(Some(212559409.0))
        );
        assert_eq!(
            CountryField::Population.coerce(Some("0")),
            FieldValue::Float(Some(0.0))
        );
        assert_eq!(
            CountryField::Population.coerce(Some("n/a")),
            FieldValue::Float(None)
        );
        assert_eq!(CountryField::Population.coerce(None), FieldValue::Float(None));
    }

    #[test]
    fn every_field_maps_to_a_distinct_column() {
        let all = [
            CountryField::Aged65Older,
            CountryField::CardiovascDeathRate,
            CountryField::DiabetesPrevalence,
            CountryField::ExtremePoverty,
            CountryField::FemaleSmokers,
            CountryField::GdpPerCapita,
            CountryField::HandwashingFacilities,
            CountryField::HospitalBedsPerThousand,
            CountryField::HumanDevelopmentIndex,
            CountryField::IncomeGroup,
            CountryField::MaleSmokers,
            CountryField::MedianAge,
            CountryField::Population,
            CountryField::PopulationDensity,
        ];
        let columns: std::collections::HashSet<_> = all.iter().map(|f| f.column()).collect();
        assert_eq!(columns.len(), all.len());
    }
}
