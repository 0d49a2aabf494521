//! Seeding pipeline for the CovidCompare dashboard database.
//!
//! Streams public CSV datasets into Postgres: the country table first, then
//! concurrent attribute-update passes and fact-table imports joined through
//! ISO 3166 alpha-3 codes.

pub mod ingest;
pub mod logging;
pub mod store;

pub mod util {
    pub mod env;
}
