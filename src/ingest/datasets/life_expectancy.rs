use csv::StringRecord;

use crate::ingest::error::RowSkip;
use crate::ingest::loader::FactDataset;
use crate::ingest::reader::CsvRows;
use crate::ingest::resolver::CountryKey;
use crate::ingest::transform::{float_field, required_int_field};

// Upstream header for the value column; spaces and punctuation are verbatim.
const VALUE_COLUMN: &str = "Period life expectancy at birth - Sex: all - Age: 0";

/// Yearly life expectancy at birth, keyed by (country, year).
#[derive(Debug, Clone, PartialEq)]
pub struct LifeExpectancyRecord {
    pub country_id: i64,
    pub year: i32,
    pub life_expectancy: Option<f64>,
}

pub struct LifeExpectancy;

impl FactDataset for LifeExpectancy {
    type Record = LifeExpectancyRecord;

    const TITLE: &'static str = "Life Expectancy";
    const SLUG: &'static str = "life-expectancy";
    const FILE_NAME: &'static str = "life_expectancy.csv";
    const COUNTRY_COLUMN: &'static str = "Code";
    const KEY: CountryKey = CountryKey::Iso;

    fn transform(
        rows: &CsvRows,
        rec: &StringRecord,
        country_id: i64,
    ) -> Result<Self::Record, RowSkip> {
        Ok(LifeExpectancyRecord {
            country_id,
            year: required_int_field(rows, rec, "Year")?,
            life_expectancy: float_field(rows, rec, VALUE_COLUMN),
        })
    }
}
