//! Field coercion for raw CSV cells.
//!
//! Numeric fields are nullable: empty or malformed cells become None, a
//! literal `0` stays `0`. Required fields (dates, dimension keys) drop the
//! whole row instead.

use chrono::NaiveDate;
use csv::StringRecord;

use super::error::RowSkip;
use super::reader::CsvRows;

/// Nullable float column.
pub fn float_field(rows: &CsvRows, rec: &StringRecord, column: &str) -> Option<f64> {
    rows.field(rec, column).and_then(parse_float)
}

/// Nullable integer column.
pub fn int_field(rows: &CsvRows, rec: &StringRecord, column: &str) -> Option<i64> {
    rows.field(rec, column).and_then(parse_int)
}

/// Required calendar date (`%Y-%m-%d`); a malformed date drops the row.
pub fn date_field(
    rows: &CsvRows,
    rec: &StringRecord,
    column: &'static str,
) -> Result<NaiveDate, RowSkip> {
    let raw = rows
        .field(rec, column)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RowSkip::MissingField(column))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| RowSkip::InvalidDate(column, raw.to_string()))
}

/// Required integer column (e.g. a year); a malformed value drops the row.
pub fn required_int_field(
    rows: &CsvRows,
    rec: &StringRecord,
    column: &'static str,
) -> Result<i32, RowSkip> {
    let raw = rows
        .field(rec, column)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(RowSkip::MissingField(column))?;
    raw.parse::<i32>()
        .map_err(|_| RowSkip::InvalidValue(column, raw.to_string()))
}

/// Required text column (e.g. an age-group bucket); empty drops the row.
pub fn required_text_field(
    rows: &CsvRows,
    rec: &StringRecord,
    column: &'static str,
) -> Result<String, RowSkip> {
    rows.field(rec, column)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(RowSkip::MissingField(column))
}

pub fn parse_float(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    // NaN and infinities count as malformed: the column stores NULL instead.
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_int(raw: &str) -> Option<i64> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_null_out_instead_of_zeroing() {
        assert_eq!(parse_float(""), None);
        assert_eq!(parse_float("  "), None);
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_float("0"), Some(0.0));
        assert_eq!(parse_float(" 3.14 "), Some(3.14));
    }

    #[test]
    fn ints_null_out_instead_of_zeroing() {
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("12.5"), None);
        assert_eq!(parse_int("0"), Some(0));
        assert_eq!(parse_int(" 42 "), Some(42));
    }
}
