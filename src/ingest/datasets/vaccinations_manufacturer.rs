use chrono::NaiveDate;
use csv::StringRecord;

use crate::ingest::error::RowSkip;
use crate::ingest::loader::FactDataset;
use crate::ingest::reader::CsvRows;
use crate::ingest::resolver::CountryKey;
use crate::ingest::transform::{date_field, int_field, required_text_field};

/// Cumulative doses per vaccine product. Name-keyed like the by-age feed.
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationByManufacturerRecord {
    pub country_id: i64,
    pub date: NaiveDate,
    pub vaccine: String,
    pub total_vaccinations: Option<i64>,
}

pub struct VaccinationsByManufacturer;

impl FactDataset for VaccinationsByManufacturer {
    type Record = VaccinationByManufacturerRecord;

    const TITLE: &'static str = "Vacc. by Manufacturer";
    const SLUG: &'static str = "vaccinations-manufacturer";
    const FILE_NAME: &'static str = "vaccinations_manufacturer.csv";
    const COUNTRY_COLUMN: &'static str = "country";
    const KEY: CountryKey = CountryKey::Name;

    fn transform(
        rows: &CsvRows,
        rec: &StringRecord,
        country_id: i64,
    ) -> Result<Self::Record, RowSkip> {
        Ok(VaccinationByManufacturerRecord {
            country_id,
            date: date_field(rows, rec, "date")?,
            vaccine: required_text_field(rows, rec, "vaccine")?,
            total_vaccinations: int_field(rows, rec, "total_vaccinations"),
        })
    }
}
