use chrono::NaiveDate;
use csv::StringRecord;

use crate::ingest::error::RowSkip;
use crate::ingest::loader::FactDataset;
use crate::ingest::reader::CsvRows;
use crate::ingest::resolver::CountryKey;
use crate::ingest::transform::{date_field, float_field};

/// National vaccination time series. The upstream feed carries the full set
/// of derived metrics (per-hundred, per-million, smoothed, interpolated and
/// rolling-window variants); all are kept, all independently nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationRecord {
    pub country_id: i64,
    pub date: NaiveDate,
    pub total_vaccinations: Option<f64>,
    pub people_vaccinated: Option<f64>,
    pub people_fully_vaccinated: Option<f64>,
    pub total_boosters: Option<f64>,
    pub daily_vaccinations: Option<f64>,
    pub daily_vaccinations_smoothed: Option<f64>,
    pub daily_people_vaccinated_smoothed: Option<f64>,
    pub total_vaccinations_per_hundred: Option<f64>,
    pub people_vaccinated_per_hundred: Option<f64>,
    pub people_fully_vaccinated_per_hundred: Option<f64>,
    pub total_boosters_per_hundred: Option<f64>,
    pub daily_people_vaccinated_smoothed_per_hundred: Option<f64>,
    pub daily_vaccinations_smoothed_per_million: Option<f64>,
    pub people_unvaccinated: Option<f64>,
    pub share_of_boosters: Option<f64>,
    pub total_vaccinations_interpolated: Option<f64>,
    pub people_vaccinated_interpolated: Option<f64>,
    pub people_fully_vaccinated_interpolated: Option<f64>,
    pub total_boosters_interpolated: Option<f64>,
    pub total_vaccinations_no_boosters_interpolated: Option<f64>,
    pub total_vaccinations_no_boosters_per_hundred_interpolated: Option<f64>,
    pub rolling_vaccinations_6m: Option<f64>,
    pub rolling_vaccinations_6m_per_hundred: Option<f64>,
    pub rolling_vaccinations_9m: Option<f64>,
    pub rolling_vaccinations_9m_per_hundred: Option<f64>,
    pub rolling_vaccinations_12m: Option<f64>,
    pub rolling_vaccinations_12m_per_hundred: Option<f64>,
}

pub struct Vaccinations;

impl FactDataset for Vaccinations {
    type Record = VaccinationRecord;

    const TITLE: &'static str = "Vaccinations";
    const SLUG: &'static str = "vaccinations";
    const FILE_NAME: &'static str = "vaccinations.csv";
    const COUNTRY_COLUMN: &'static str = "country";
    const KEY: CountryKey = CountryKey::Iso;

    fn transform(
        rows: &CsvRows,
        rec: &StringRecord,
        country_id: i64,
    ) -> Result<Self::Record, RowSkip> {
        let f = |column: &str| float_field(rows, rec, column);
        Ok(VaccinationRecord {
            country_id,
            date: date_field(rows, rec, "date")?,
            total_vaccinations: f("total_vaccinations"),
            people_vaccinated: f("people_vaccinated"),
            people_fully_vaccinated: f("people_fully_vaccinated"),
            total_boosters: f("total_boosters"),
            daily_vaccinations: f("daily_vaccinations"),
            daily_vaccinations_smoothed: f("daily_vaccinations_smoothed"),
            daily_people_vaccinated_smoothed: f("daily_people_vaccinated_smoothed"),
            total_vaccinations_per_hundred: f("total_vaccinations_per_hundred"),
            people_vaccinated_per_hundred: f("people_vaccinated_per_hundred"),
            people_fully_vaccinated_per_hundred: f("people_fully_vaccinated_per_hundred"),
            total_boosters_per_hundred: f("total_boosters_per_hundred"),
            daily_people_vaccinated_smoothed_per_hundred: f(
                "daily_people_vaccinated_smoothed_per_hundred",
            ),
            daily_vaccinations_smoothed_per_million: f("daily_vaccinations_smoothed_per_million"),
            people_unvaccinated: f("people_unvaccinated"),
            share_of_boosters: f("share_of_boosters"),
            total_vaccinations_interpolated: f("total_vaccinations_interpolated"),
            people_vaccinated_interpolated: f("people_vaccinated_interpolated"),
            people_fully_vaccinated_interpolated: f("people_fully_vaccinated_interpolated"),
            total_boosters_interpolated: f("total_boosters_interpolated"),
            total_vaccinations_no_boosters_interpolated: f(
                "total_vaccinations_no_boosters_interpolated",
            ),
            total_vaccinations_no_boosters_per_hundred_interpolated: f(
                "total_vaccinations_no_boosters_per_hundred_interpolated",
            ),
            rolling_vaccinations_6m: f("rolling_vaccinations_6m"),
            rolling_vaccinations_6m_per_hundred: f("rolling_vaccinations_6m_per_hundred"),
            rolling_vaccinations_9m: f("rolling_vaccinations_9m"),
            rolling_vaccinations_9m_per_hundred: f("rolling_vaccinations_9m_per_hundred"),
            rolling_vaccinations_12m: f("rolling_vaccinations_12m"),
            rolling_vaccinations_12m_per_hundred: f("rolling_vaccinations_12m_per_hundred"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::reader::{CsvSource, ReadOutcome};
    use crate::ingest::testutil::write_csv;

    #[test]
    fn unmapped_columns_are_ignored_and_gaps_null() {
        // deliberately sparse header set: everything absent stays None
        let path = write_csv(
            "vacc-transform.csv",
            "country,date,total_vaccinations,people_vaccinated,some_future_column\nBRA,2021-06-01,1000,800,9\n",
        );
        let mut rows = CsvSource::from_path(&path).open().unwrap();
        let mut rec = StringRecord::new();
        assert!(matches!(
            rows.read_record(&mut rec).unwrap(),
            ReadOutcome::Row
        ));

        let record = Vaccinations::transform(&rows, &rec, 3).unwrap();
        assert_eq!(record.total_vaccinations, Some(1000.0));
        assert_eq!(record.people_vaccinated, Some(800.0));
        assert_eq!(record.total_boosters, None);
        assert_eq!(record.rolling_vaccinations_12m_per_hundred, None);
    }
}
