use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::db::Db;
use crate::ingest::datasets::covid_cases::CovidCaseRecord;
use crate::ingest::datasets::life_expectancy::LifeExpectancyRecord;
use crate::ingest::datasets::vaccinations::VaccinationRecord;
use crate::ingest::datasets::vaccinations_age::VaccinationByAgeRecord;
use crate::ingest::datasets::vaccinations_manufacturer::VaccinationByManufacturerRecord;

/// Bulk sink for one fact dataset.
///
/// Implementations must skip rows that collide on the dataset's natural key
/// and report only rows actually persisted. Duplicate handling via the
/// database unique constraint is also what makes concurrent batches over
/// overlapping keys safe.
#[async_trait]
pub trait FactStore<R: Send + Sync>: Send + Sync {
    async fn insert_batch(&self, rows: &[R]) -> Result<u64>;
}

pub struct PgCovidCases {
    db: Db,
}

impl PgCovidCases {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore<CovidCaseRecord> for PgCovidCases {
    async fn insert_batch(&self, rows: &[CovidCaseRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO covid_cases (country_id, date, new_cases, total_cases, new_deaths, total_deaths) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.country_id)
                .push_bind(r.date)
                .push_bind(r.new_cases)
                .push_bind(r.total_cases)
                .push_bind(r.new_deaths)
                .push_bind(r.total_deaths);
        });
        qb.push(" ON CONFLICT (country_id, date) DO NOTHING");
        let res = qb.build().persistent(false).execute(&self.db.pool).await?;
        Ok(res.rows_affected())
    }
}

pub struct PgLifeExpectancy {
    db: Db,
}

impl PgLifeExpectancy {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore<LifeExpectancyRecord> for PgLifeExpectancy {
    async fn insert_batch(&self, rows: &[LifeExpectancyRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO life_expectancy (country_id, year, life_expectancy) ");
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.country_id)
                .push_bind(r.year)
                .push_bind(r.life_expectancy);
        });
        qb.push(" ON CONFLICT (country_id, year) DO NOTHING");
        let res = qb.build().persistent(false).execute(&self.db.pool).await?;
        Ok(res.rows_affected())
    }
}

pub struct PgVaccinations {
    db: Db,
}

impl PgVaccinations {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore<VaccinationRecord> for PgVaccinations {
    async fn insert_batch(&self, rows: &[VaccinationRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO vaccinations (country_id, date, total_vaccinations, people_vaccinated, \
             people_fully_vaccinated, total_boosters, daily_vaccinations, daily_vaccinations_smoothed, \
             daily_people_vaccinated_smoothed, total_vaccinations_per_hundred, people_vaccinated_per_hundred, \
             people_fully_vaccinated_per_hundred, total_boosters_per_hundred, \
             daily_people_vaccinated_smoothed_per_hundred, daily_vaccinations_smoothed_per_million, \
             people_unvaccinated, share_of_boosters, total_vaccinations_interpolated, \
             people_vaccinated_interpolated, people_fully_vaccinated_interpolated, total_boosters_interpolated, \
             total_vaccinations_no_boosters_interpolated, total_vaccinations_no_boosters_per_hundred_interpolated, \
             rolling_vaccinations_6m, rolling_vaccinations_6m_per_hundred, rolling_vaccinations_9m, \
             rolling_vaccinations_9m_per_hundred, rolling_vaccinations_12m, rolling_vaccinations_12m_per_hundred) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.country_id)
                .push_bind(r.date)
                .push_bind(r.total_vaccinations)
                .push_bind(r.people_vaccinated)
                .push_bind(r.people_fully_vaccinated)
                .push_bind(r.total_boosters)
                .push_bind(r.daily_vaccinations)
                .push_bind(r.daily_vaccinations_smoothed)
                .push_bind(r.daily_people_vaccinated_smoothed)
                .push_bind(r.total_vaccinations_per_hundred)
                .push_bind(r.people_vaccinated_per_hundred)
                .push_bind(r.people_fully_vaccinated_per_hundred)
                .push_bind(r.total_boosters_per_hundred)
                .push_bind(r.daily_people_vaccinated_smoothed_per_hundred)
                .push_bind(r.daily_vaccinations_smoothed_per_million)
                .push_bind(r.people_unvaccinated)
                .push_bind(r.share_of_boosters)
                .push_bind(r.total_vaccinations_interpolated)
                .push_bind(r.people_vaccinated_interpolated)
                .push_bind(r.people_fully_vaccinated_interpolated)
                .push_bind(r.total_boosters_interpolated)
                .push_bind(r.total_vaccinations_no_boosters_interpolated)
                .push_bind(r.total_vaccinations_no_boosters_per_hundred_interpolated)
                .push_bind(r.rolling_vaccinations_6m)
                .push_bind(r.rolling_vaccinations_6m_per_hundred)
                .push_bind(r.rolling_vaccinations_9m)
                .push_bind(r.rolling_vaccinations_9m_per_hundred)
                .push_bind(r.rolling_vaccinations_12m)
                .push_bind(r.rolling_vaccinations_12m_per_hundred);
        });
        qb.push(" ON CONFLICT (country_id, date) DO NOTHING");
        let res = qb.build().persistent(false).execute(&self.db.pool).await?;
        Ok(res.rows_affected())
    }
}

pub struct PgVaccinationsByAge {
    db: Db,
}

impl PgVaccinationsByAge {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore<VaccinationByAgeRecord> for PgVaccinationsByAge {
    async fn insert_batch(&self, rows: &[VaccinationByAgeRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO vaccinations_by_age (country_id, date, age_group, \
             people_vaccinated_per_hundred, people_fully_vaccinated_per_hundred, \
             people_with_booster_per_hundred) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.country_id)
                .push_bind(r.date)
                .push_bind(&r.age_group)
                .push_bind(r.people_vaccinated_per_hundred)
                .push_bind(r.people_fully_vaccinated_per_hundred)
                .push_bind(r.people_with_booster_per_hundred);
        });
        qb.push(" ON CONFLICT (country_id, date, age_group) DO NOTHING");
        let res = qb.build().persistent(false).execute(&self.db.pool).await?;
        Ok(res.rows_affected())
    }
}

pub struct PgVaccinationsByManufacturer {
    db: Db,
}

impl PgVaccinationsByManufacturer {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FactStore<VaccinationByManufacturerRecord> for PgVaccinationsByManufacturer {
    async fn insert_batch(&self, rows: &[VaccinationByManufacturerRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO vaccinations_by_manufacturer (country_id, date, vaccine, total_vaccinations) ",
        );
        qb.push_values(rows, |mut b, r| {
            b.push_bind(r.country_id)
                .push_bind(r.date)
                .push_bind(&r.vaccine)
                .push_bind(r.total_vaccinations);
        });
        qb.push(" ON CONFLICT (country_id, date, vaccine) DO NOTHING");
        let res = qb.build().persistent(false).execute(&self.db.pool).await?;
        Ok(res.rows_affected())
    }
}
