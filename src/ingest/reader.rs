use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use tracing::warn;

use super::error::SeedError;

/// A re-openable CSV source.
///
/// Import jobs take two passes over the same file: one to count rows for the
/// progress total, one to stream them. Both passes see the rows in file
/// order.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> Result<csv::Reader<BufReader<File>>> {
        if !self.path.exists() {
            return Err(SeedError::SourceUnavailable {
                path: self.path.clone(),
            }
            .into());
        }
        let file =
            File::open(&self.path).with_context(|| format!("open {}", self.path.display()))?;
        Ok(ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::with_capacity(1 << 20, file)))
    }

    /// Count data rows without materializing them.
    pub fn count_rows(&self) -> Result<u64> {
        let mut rdr = self.reader()?;
        let mut rec = csv::ByteRecord::new();
        let mut count = 0u64;
        while rdr.read_byte_record(&mut rec)? {
            count += 1;
        }
        Ok(count)
    }

    /// Open the streaming pass.
    pub fn open(&self) -> Result<CsvRows> {
        let mut rdr = self.reader()?;
        let headers = rdr.headers().context("read csv headers")?.clone();
        let mut index = HashMap::with_capacity(headers.len());
        for (pos, name) in headers.iter().enumerate() {
            // first occurrence wins when a header repeats
            index.entry(name.to_string()).or_insert(pos);
        }
        Ok(CsvRows { rdr, index })
    }
}

/// Streaming handle over one pass of a file, with by-name cell lookup.
pub struct CsvRows {
    rdr: csv::Reader<BufReader<File>>,
    index: HashMap<String, usize>,
}

/// What one `read_record` call produced.
pub enum ReadOutcome {
    Row,
    /// The line existed but could not be decoded; callers count it as
    /// processed-and-dropped so totals stay consistent with the count pass.
    Skipped,
    Eof,
}

impl CsvRows {
    /// Read the next data row into `rec`. Malformed records are skipped with
    /// a warning; only I/O errors abort the pass.
    pub fn read_record(&mut self, rec: &mut StringRecord) -> Result<ReadOutcome> {
        match self.rdr.read_record(rec) {
            Ok(true) => Ok(ReadOutcome::Row),
            Ok(false) => Ok(ReadOutcome::Eof),
            Err(e) if e.is_io_error() => Err(e).context("read csv record"),
            Err(e) => {
                warn!(error = %e, "skipping malformed csv record");
                Ok(ReadOutcome::Skipped)
            }
        }
    }

    /// Cell lookup by header name. Unknown headers and short rows are None.
    pub fn field<'r>(&self, rec: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.index.get(column).and_then(|&i| rec.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testutil::write_csv;

    #[test]
    fn counting_and_streaming_agree() {
        let path = write_csv(
            "counting.csv",
            "country,date,value\nBRA,2021-01-01,1\nBRA,2021-01-02,2\nXXX,2021-01-03,3\n",
        );
        let source = CsvSource::from_path(&path);
        assert_eq!(source.count_rows().unwrap(), 3);

        let mut rows = source.open().unwrap();
        let mut rec = StringRecord::new();
        let mut seen = Vec::new();
        while let ReadOutcome::Row = rows.read_record(&mut rec).unwrap() {
            seen.push(rows.field(&rec, "country").unwrap().to_string());
        }
        assert_eq!(seen, vec!["BRA", "BRA", "XXX"]);
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let source = CsvSource::from_path("/nonexistent/covid-compare/never.csv");
        let err = source.count_rows().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SeedError>(),
            Some(SeedError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn unknown_columns_are_none() {
        let path = write_csv("columns.csv", "a,b\n1,2\n");
        let source = CsvSource::from_path(&path);
        let mut rows = source.open().unwrap();
        let mut rec = StringRecord::new();
        assert!(matches!(
            rows.read_record(&mut rec).unwrap(),
            ReadOutcome::Row
        ));
        assert_eq!(rows.field(&rec, "a"), Some("1"));
        assert_eq!(rows.field(&rec, "missing"), None);
    }
}
