//! Per-dataset field mappings. Each module pairs a record struct with the
//! fixed source-column mapping recovered from the upstream CSV feeds.

pub mod covid_cases;
pub mod life_expectancy;
pub mod vaccinations;
pub mod vaccinations_age;
pub mod vaccinations_manufacturer;
