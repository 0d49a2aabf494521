use chrono::NaiveDate;
use csv::StringRecord;

use crate::ingest::error::RowSkip;
use crate::ingest::loader::FactDataset;
use crate::ingest::reader::CsvRows;
use crate::ingest::resolver::CountryKey;
use crate::ingest::transform::{date_field, int_field};

/// Daily case/death counts, one row per country and day.
#[derive(Debug, Clone, PartialEq)]
pub struct CovidCaseRecord {
    pub country_id: i64,
    pub date: NaiveDate,
    pub new_cases: Option<i64>,
    pub total_cases: Option<i64>,
    pub new_deaths: Option<i64>,
    pub total_deaths: Option<i64>,
}

pub struct CovidCases;

impl FactDataset for CovidCases {
    type Record = CovidCaseRecord;

    const TITLE: &'static str = "Covid Cases";
    const SLUG: &'static str = "covid-cases";
    const FILE_NAME: &'static str = "cases_deaths.csv";
    const COUNTRY_COLUMN: &'static str = "country";
    const KEY: CountryKey = CountryKey::Iso;

    fn transform(
        rows: &CsvRows,
        rec: &StringRecord,
        country_id: i64,
    ) -> Result<Self::Record, RowSkip> {
        Ok(CovidCaseRecord {
            country_id,
            date: date_field(rows, rec, "date")?,
            new_cases: int_field(rows, rec, "new_cases"),
            total_cases: int_field(rows, rec, "total_cases"),
            new_deaths: int_field(rows, rec, "new_deaths"),
            total_deaths: int_field(rows, rec, "total_deaths"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::reader::{CsvSource, ReadOutcome};
    use crate::ingest::testutil::write_csv;

    #[test]
    fn maps_counts_and_nulls_empty_cells() {
        let path = write_csv(
            "covid-transform.csv",
            "country,date,new_cases,total_cases,new_deaths,total_deaths\nBRA,2021-03-04,100,2500,,30\n",
        );
        let mut rows = CsvSource::from_path(&path).open().unwrap();
        let mut rec = StringRecord::new();
        assert!(matches!(
            rows.read_record(&mut rec).unwrap(),
            ReadOutcome::Row
        ));

        let record = CovidCases::transform(&rows, &rec, 7).unwrap();
        assert_eq!(record.country_id, 7);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2021, 3, 4).unwrap());
        assert_eq!(record.new_cases, Some(100));
        assert_eq!(record.total_cases, Some(2500));
        assert_eq!(record.new_deaths, None);
        assert_eq!(record.total_deaths, Some(30));
    }
}
