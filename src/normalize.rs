//! Raw row normalization.
//!
//! Turns one scraped table row (text cells in page order) into an
//! `ObservationRow`: a calendar date plus the four inflow metrics.
//! Date fragments are strict; numeric cells are lenient and fall back to
//! text instead of failing.

use chrono::NaiveDate;

use crate::model::{Cell, ObservationRow, Result, RiverflowError};
use crate::stations::{DATE_COLUMN, INFLOW_METRICS, MIN_ROW_CELLS};

/// Coerces a scraped value into a number when it looks like one.
///
/// - exactly one `.`: integer part and fractional digit group are each read
///   as integers, then reassembled as a float. The fractional group is kept
///   as typed, so `"12.034"` becomes `12.034`.
/// - no `.`: parsed as an integer.
/// - anything else (`"abc"`, `""`, `"1,234"`, `"1.2.3"`) stays text.
pub fn coerce_numeric(raw: &str) -> Cell {
    let value = raw.trim();
    let parts: Vec<&str> = value.split('.').collect();
    match parts.as_slice() {
        [int_part, frac_part] => {
            let Ok(integer) = int_part.parse::<i64>() else {
                return Cell::RawText(raw.to_string());
            };
            if frac_part.is_empty() || !frac_part.chars().all(|c| c.is_ascii_digit()) {
                return Cell::RawText(raw.to_string());
            }
            match format!("{}.{}", integer, frac_part).parse::<f64>() {
                Ok(v) => Cell::Float(v),
                Err(_) => Cell::RawText(raw.to_string()),
            }
        }
        [_] => match value.parse::<i64>() {
            Ok(v) => Cell::Int(v),
            Err(_) => Cell::RawText(raw.to_string()),
        },
        _ => Cell::RawText(raw.to_string()),
    }
}

/// Re-applies `coerce_numeric` to a cell. Numbers pass through untouched.
pub fn recoerce(cell: &Cell) -> Cell {
    match cell {
        Cell::RawText(s) => coerce_numeric(s),
        numeric => numeric.clone(),
    }
}

/// Parses a "day abbreviated-month" fragment such as `"05 Mar"` into a date
/// in `year`. The fragment is rewritten to `"05-Mar-2024"` and read with
/// `%d-%b-%Y`.
pub fn parse_date_fragment(fragment: &str, year: i32) -> Result<NaiveDate> {
    let rewritten = format!("{}-{}", fragment.trim().replace(' ', "-"), year);
    NaiveDate::parse_from_str(&rewritten, "%d-%b-%Y").map_err(|_| RiverflowError::DateParse {
        fragment: fragment.to_string(),
        year,
    })
}

/// Normalizes one raw row for `year`.
///
/// The row must carry at least the date and the eight station columns;
/// trailing summary columns are ignored.
pub fn normalize_row(cells: &[String], year: i32) -> Result<ObservationRow> {
    if cells.len() < MIN_ROW_CELLS {
        return Err(RiverflowError::MalformedRow { cells: cells.len() });
    }

    let date = parse_date_fragment(&cells[DATE_COLUMN], year)?;
    let values = INFLOW_METRICS
        .each_ref()
        .map(|metric| coerce_numeric(&cells[metric.source_column]));

    Ok(ObservationRow { date, values })
}

/// Normalizes every raw row for `year`, stopping at the first failure.
pub fn normalize_rows(rows: &[Vec<String>], year: i32) -> Result<Vec<ObservationRow>> {
    rows.iter().map(|row| normalize_row(row, year)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
