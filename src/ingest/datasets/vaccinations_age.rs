use chrono::NaiveDate;
use csv::StringRecord;

use crate::ingest::error::RowSkip;
use crate::ingest::loader::FactDataset;
use crate::ingest::reader::CsvRows;
use crate::ingest::resolver::CountryKey;
use crate::ingest::transform::{date_field, float_field, required_text_field};

/// Vaccination coverage split by age bucket. This feed keys countries by
/// display name rather than ISO code.
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationByAgeRecord {
    pub country_id: i64,
    pub date: NaiveDate,
    pub age_group: String,
    pub people_vaccinated_per_hundred: Option<f64>,
    pub people_fully_vaccinated_per_hundred: Option<f64>,
    pub people_with_booster_per_hundred: Option<f64>,
}

pub struct VaccinationsByAge;

impl FactDataset for VaccinationsByAge {
    type Record = VaccinationByAgeRecord;

    const TITLE: &'static str = "Vacc. by Age";
    const SLUG: &'static str = "vaccinations-age";
    const FILE_NAME: &'static str = "vaccinations_age.csv";
    const COUNTRY_COLUMN: &'static str = "country";
    const KEY: CountryKey = CountryKey::Name;

    fn transform(
        rows: &CsvRows,
        rec: &StringRecord,
        country_id: i64,
    ) -> Result<Self::Record, RowSkip> {
        Ok(VaccinationByAgeRecord {
            country_id,
            date: date_field(rows, rec, "date")?,
            age_group: required_text_field(rows, rec, "age_group")?,
            people_vaccinated_per_hundred: float_field(rows, rec, "people_vaccinated_per_hundred"),
            people_fully_vaccinated_per_hundred: float_field(
                rows,
                rec,
                "people_fully_vaccinated_per_hundred",
            ),
            people_with_booster_per_hundred: float_field(
                rows,
                rec,
                "people_with_booster_per_hundred",
            ),
        })
    }
}
