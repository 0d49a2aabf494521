use anyhow::Result;
use csv::StringRecord;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::error::RowSkip;
use super::progress::Progress;
use super::reader::{CsvRows, CsvSource, ReadOutcome};
use super::resolver::{CountryKey, CountryLookup};
use crate::store::facts::FactStore;

/// Default number of records per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Static description of one fact dataset: where its rows come from and how
/// a raw row becomes a typed record. The field mapping is fixed per dataset,
/// never inferred; unmapped source columns are ignored.
pub trait FactDataset {
    type Record: Send + Sync;

    /// Label shown in progress output and logs.
    const TITLE: &'static str;
    /// CLI selector, e.g. `covid-cases`.
    const SLUG: &'static str;
    /// File name inside the extracted csv directory.
    const FILE_NAME: &'static str;
    /// Column holding the country identifier.
    const COUNTRY_COLUMN: &'static str;
    /// Which lookup map the identifier resolves against.
    const KEY: CountryKey;

    fn transform(
        rows: &CsvRows,
        rec: &StringRecord,
        country_id: i64,
    ) -> Result<Self::Record, RowSkip>;
}

/// Outcome counters for one import job.
///
/// `processed` counts every data row read from the source file, including
/// rows later dropped for an unresolved country or a failed parse;
/// `inserted` counts only rows the store actually persisted (duplicates
/// excluded). `inserted <= processed` always holds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub processed: u64,
    pub inserted: u64,
    pub skipped_unresolved: u64,
    pub skipped_invalid: u64,
}

/// Stream one dataset file through resolve → transform → batched insert.
///
/// Batch-level store errors are logged and the job moves on to the next
/// batch; only a missing source file or an I/O failure aborts the job.
pub async fn run_fact_import<D: FactDataset>(
    source: &CsvSource,
    lookup: &CountryLookup,
    store: &dyn FactStore<D::Record>,
    progress: &Progress,
    batch_size: usize,
) -> Result<LoadStats> {
    let batch_size = batch_size.max(1);
    let total = source.count_rows()?;
    let bar = progress.job(D::TITLE, total);

    let mut rows = source.open()?;
    let mut rec = StringRecord::new();
    let mut stats = LoadStats::default();
    let mut batch: Vec<D::Record> = Vec::with_capacity(batch_size);
    // Rows seen since the last flush, counting dropped ones, so batch
    // boundaries follow the file rather than only the surviving records.
    let mut pending = 0usize;

    loop {
        match rows.read_record(&mut rec)? {
            ReadOutcome::Eof => break,
            ReadOutcome::Skipped => {
                stats.processed += 1;
                stats.skipped_invalid += 1;
                pending += 1;
            }
            ReadOutcome::Row => {
                stats.processed += 1;
                pending += 1;
                let raw_country = rows.field(&rec, D::COUNTRY_COLUMN);
                match raw_country.and_then(|raw| lookup.resolve(D::KEY, raw)) {
                    None => {
                        stats.skipped_unresolved += 1;
                        warn!(
                            dataset = D::TITLE,
                            country = raw_country.unwrap_or(""),
                            "country not found, row skipped"
                        );
                    }
                    Some(country_id) => match D::transform(&rows, &rec, country_id) {
                        Ok(record) => batch.push(record),
                        Err(skip) => {
                            stats.skipped_invalid += 1;
                            debug!(dataset = D::TITLE, reason = %skip, "row dropped");
                        }
                    },
                }
            }
        }

        if pending >= batch_size {
            flush(store, &mut batch, &mut stats, D::TITLE).await;
            pending = 0;
            bar.set_position(stats.processed);
        }
    }

    flush(store, &mut batch, &mut stats, D::TITLE).await;
    bar.set_position(stats.processed);
    bar.finish();

    Ok(stats)
}

async fn flush<R: Send + Sync>(
    store: &dyn FactStore<R>,
    batch: &mut Vec<R>,
    stats: &mut LoadStats,
    title: &str,
) {
    if batch.is_empty() {
        return;
    }
    match store.insert_batch(batch).await {
        Ok(inserted) => stats.inserted += inserted,
        // Best-effort policy: the failed batch is dropped and the job keeps going.
        Err(e) => {
            error!(dataset = title, rows = batch.len(), error = %e, "batch insert failed, continuing")
        }
    }
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::datasets::covid_cases::{CovidCaseRecord, CovidCases};
    use crate::ingest::testutil::write_csv;
    use crate::store::mem::{MemCountryStore, MemFactStore};
    use crate::store::countries::CountryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HEADER: &str = "country,date,new_cases,total_cases,new_deaths,total_deaths\n";

    async fn brazil_lookup() -> CountryLookup {
        MemCountryStore::with_countries(&[("brazil", "BRA")])
            .load_lookup()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn unresolved_rows_are_dropped_not_fatal() {
        let path = write_csv(
            "cases-unresolved.csv",
            &format!(
                "{HEADER}BRA,2021-01-01,10,10,1,1\nBRA,2021-01-02,5,15,0,1\nXXX,2021-01-03,7,7,0,0\n"
            ),
        );
        let lookup = brazil_lookup().await;
        let store = MemFactStore::<CovidCaseRecord>::new();

        let stats = run_fact_import::<CovidCases>(
            &CsvSource::from_path(&path),
            &lookup,
            &store,
            &Progress::hidden(),
            DEFAULT_BATCH_SIZE,
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.skipped_unresolved, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn reimport_skips_every_duplicate() {
        let path = write_csv(
            "cases-idempotent.csv",
            &format!("{HEADER}BRA,2021-01-01,10,10,1,1\nBRA,2021-01-02,5,15,0,1\n"),
        );
        let source = CsvSource::from_path(&path);
        let lookup = brazil_lookup().await;
        let store = MemFactStore::<CovidCaseRecord>::new();
        let progress = Progress::hidden();

        let first = run_fact_import::<CovidCases>(&source, &lookup, &store, &progress, 1000)
            .await
            .unwrap();
        let second = run_fact_import::<CovidCases>(&source, &lookup, &store, &progress, 1000)
            .await
            .unwrap();

        assert_eq!(first.inserted, 2);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.processed, first.processed);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn inserted_never_exceeds_distinct_natural_keys() {
        // four rows but only two distinct (country, date) keys
        let path = write_csv(
            "cases-dupes.csv",
            &format!(
                "{HEADER}BRA,2021-01-01,10,10,1,1\nBRA,2021-01-01,11,11,1,1\nBRA,2021-01-02,5,15,0,1\nBRA,2021-01-02,6,16,0,1\n"
            ),
        );
        let lookup = brazil_lookup().await;
        let store = MemFactStore::<CovidCaseRecord>::new();

        let stats = run_fact_import::<CovidCases>(
            &CsvSource::from_path(&path),
            &lookup,
            &store,
            &Progress::hidden(),
            1000,
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 4);
        assert_eq!(stats.inserted, 2);
        assert!(stats.inserted <= stats.processed);
    }

    #[tokio::test]
    async fn invalid_dates_drop_the_row_only() {
        let path = write_csv(
            "cases-baddate.csv",
            &format!("{HEADER}BRA,not-a-date,10,10,1,1\nBRA,2021-01-02,5,15,0,1\n"),
        );
        let lookup = brazil_lookup().await;
        let store = MemFactStore::<CovidCaseRecord>::new();

        let stats = run_fact_import::<CovidCases>(
            &CsvSource::from_path(&path),
            &lookup,
            &store,
            &Progress::hidden(),
            1000,
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.skipped_invalid, 1);
    }

    /// Fails the first batch, then delegates. Exercises the best-effort
    /// batch policy.
    struct FailFirstBatch {
        inner: MemFactStore<CovidCaseRecord>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FactStore<CovidCaseRecord> for FailFirstBatch {
        async fn insert_batch(&self, rows: &[CovidCaseRecord]) -> Result<u64> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(anyhow!("connection reset"));
            }
            self.inner.insert_batch(rows).await
        }
    }

    #[tokio::test]
    async fn failed_batch_is_skipped_and_the_job_continues() {
        let path = write_csv(
            "cases-batchfail.csv",
            &format!("{HEADER}BRA,2021-01-01,1,1,0,0\nBRA,2021-01-02,2,3,0,0\nBRA,2021-01-03,3,6,0,0\n"),
        );
        let lookup = brazil_lookup().await;
        let store = FailFirstBatch {
            inner: MemFactStore::new(),
            calls: AtomicUsize::new(0),
        };

        // batch size 2: first batch (2 rows) fails, second batch (1 row) lands
        let stats = run_fact_import::<CovidCases>(
            &CsvSource::from_path(&path),
            &lookup,
            &store,
            &Progress::hidden(),
            2,
        )
        .await
        .unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.inserted, 1);
        assert_eq!(store.inner.len(), 1);
    }
}
