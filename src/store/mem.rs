//! In-memory store implementations for pipeline tests. The natural-key set
//! reproduces the duplicate-skip behavior of the database unique
//! constraints.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use super::countries::{CountryField, CountryStore, FieldValue, NewCountry};
use super::facts::FactStore;
use crate::ingest::datasets::covid_cases::CovidCaseRecord;
use crate::ingest::datasets::life_expectancy::LifeExpectancyRecord;
use crate::ingest::datasets::vaccinations::VaccinationRecord;
use crate::ingest::datasets::vaccinations_age::VaccinationByAgeRecord;
use crate::ingest::datasets::vaccinations_manufacturer::VaccinationByManufacturerRecord;
use crate::ingest::resolver::CountryLookup;

#[derive(Debug, Clone)]
pub struct MemCountry {
    pub id: i64,
    pub name: String,
    pub iso_code: String,
    pub continent: Option<String>,
    /// Attribute columns written so far, keyed by column name. Absent key
    /// means the pass never touched the column.
    pub fields: HashMap<&'static str, FieldValue>,
}

#[derive(Default)]
pub struct MemCountryStore {
    rows: Mutex<Vec<MemCountry>>,
}

impl MemCountryStore {
    pub fn with_countries(seed: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut rows = store.rows.lock().unwrap();
            for (i, (name, iso)) in seed.iter().enumerate() {
                rows.push(MemCountry {
                    id: (i + 1) as i64,
                    name: name.to_string(),
                    iso_code: iso.to_string(),
                    continent: None,
                    fields: HashMap::new(),
                });
            }
        }
        store
    }

    pub fn snapshot(&self) -> Vec<MemCountry> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl CountryStore for MemCountryStore {
    async fn insert(&self, country: &NewCountry) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|c| c.iso_code == country.iso_code) {
            return Ok(false);
        }
        let id = rows.len() as i64 + 1;
        rows.push(MemCountry {
            id,
            name: country.name.clone(),
            iso_code: country.iso_code.clone(),
            continent: country.continent.clone(),
            fields: HashMap::new(),
        });
        Ok(true)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn load_lookup(&self) -> Result<CountryLookup> {
        let rows = self.rows.lock().unwrap();
        let mut lookup = CountryLookup::default();
        for c in rows.iter() {
            lookup.insert(c.id, &c.name, &c.iso_code);
        }
        Ok(lookup)
    }

    async fn set_field(
        &self,
        iso_code: &str,
        field: CountryField,
        value: &FieldValue,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut touched = 0u64;
        for c in rows.iter_mut().filter(|c| c.iso_code == iso_code) {
            c.fields.insert(field.column(), value.clone());
            touched += 1;
        }
        Ok(touched)
    }
}

/// Natural key per fact record, mirroring the unique constraints.
pub trait NaturalKey {
    type Key: Eq + Hash + Send;
    fn natural_key(&self) -> Self::Key;
}

impl NaturalKey for CovidCaseRecord {
    type Key = (i64, NaiveDate);
    fn natural_key(&self) -> Self::Key {
        (self.country_id, self.date)
    }
}

impl NaturalKey for VaccinationRecord {
    type Key = (i64, NaiveDate);
    fn natural_key(&self) -> Self::Key {
        (self.country_id, self.date)
    }
}

impl NaturalKey for VaccinationByAgeRecord {
    type Key = (i64, NaiveDate, String);
    fn natural_key(&self) -> Self::Key {
        (self.country_id, self.date, self.age_group.clone())
    }
}

impl NaturalKey for VaccinationByManufacturerRecord {
    type Key = (i64, NaiveDate, String);
    fn natural_key(&self) -> Self::Key {
        (self.country_id, self.date, self.vaccine.clone())
    }
}

impl NaturalKey for LifeExpectancyRecord {
    type Key = (i64, i32);
    fn natural_key(&self) -> Self::Key {
        (self.country_id, self.year)
    }
}

struct MemFactsInner<R: NaturalKey> {
    keys: HashSet<R::Key>,
    rows: Vec<R>,
}

pub struct MemFactStore<R: NaturalKey> {
    inner: Mutex<MemFactsInner<R>>,
}

impl<R: NaturalKey> MemFactStore<R> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemFactsInner {
                keys: HashSet::new(),
                rows: Vec::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: NaturalKey> Default for MemFactStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R> FactStore<R> for MemFactStore<R>
where
    R: NaturalKey + Clone + Send + Sync,
{
    async fn insert_batch(&self, rows: &[R]) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut inserted = 0u64;
        for r in rows {
            if inner.keys.insert(r.natural_key()) {
                inner.rows.push(r.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
