/// Cell, ObservationRow, YearSeries, HistoricalSeries, RiverflowError
/// core data structures and error handling
///
/// Core data types for the river-flow reconciliation service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: only types and the small amount of logic needed to
/// keep their invariants (unique ascending dates, derived year).

use chrono::{Datelike, NaiveDate};

/// ISO date format used for the persisted `Date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// One observation value.
///
/// Scraped values are coerced leniently: anything that does not look like a
/// number is kept verbatim as `RawText` rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    RawText(String),
}

impl Cell {
    /// Numeric value as `f64`, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::RawText(_) => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{}", v),
            // Whole floats keep their ".0" so they reload as floats.
            Cell::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::RawText(s) => write!(f, "{}", s),
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A normalized scraped row: one calendar day and the four inflow metrics,
/// ordered as in `stations::INFLOW_METRICS`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    pub date: NaiveDate,
    pub values: [Cell; 4],
}

/// A row of the persisted historical series. `year` is derived from `date`
/// but stored, so it can drift until recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRow {
    pub date: NaiveDate,
    pub values: [Cell; 4],
    pub year: i32,
}

impl HistoricalRow {
    /// Builds a row from an observation, deriving `year` from the date.
    pub fn from_observation(row: ObservationRow) -> Self {
        HistoricalRow {
            year: row.date.year(),
            date: row.date,
            values: row.values,
        }
    }
}

// ---------------------------------------------------------------------------
// Series types
// ---------------------------------------------------------------------------

/// Observation rows for one calendar year, ascending by date with one row
/// per date. Only `analysis::year_series::build_year_series` and
/// `YearSeries::concat` construct non-empty values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct YearSeries {
    pub year: i32,
    rows: Vec<ObservationRow>,
}

impl YearSeries {
    /// Wraps rows that the caller has already sorted and de-duplicated.
    pub(crate) fn from_sorted(year: i32, rows: Vec<ObservationRow>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].date < w[1].date));
        YearSeries { year, rows }
    }

    pub fn empty(year: i32) -> Self {
        YearSeries { year, rows: Vec::new() }
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    /// The last `n` rows (all rows when `n >= len`).
    pub fn tail(&self, n: usize) -> YearSeries {
        let start = self.rows.len().saturating_sub(n);
        YearSeries {
            year: self.year,
            rows: self.rows[start..].to_vec(),
        }
    }

    /// Concatenates an earlier series with a later one. Rows of `later` that
    /// do not sort after the last row of `self` are dropped so the result
    /// stays strictly ascending.
    pub fn concat(&self, later: &YearSeries) -> YearSeries {
        let mut rows = self.rows.clone();
        let cutoff = self.last_date();
        rows.extend(
            later
                .rows
                .iter()
                .filter(|r| cutoff.is_none_or(|c| r.date > c))
                .cloned(),
        );
        YearSeries { year: later.year, rows }
    }
}

/// The accumulated dataset persisted between runs, keyed by date.
///
/// Dates are assumed unique and ascending on load; the reconciler keeps that
/// property for everything it produces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoricalSeries {
    rows: Vec<HistoricalRow>,
}

impl HistoricalSeries {
    pub fn new(rows: Vec<HistoricalRow>) -> Self {
        HistoricalSeries { rows }
    }

    pub fn rows(&self) -> &[HistoricalRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<HistoricalRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    /// `true` when every date is strictly greater than the one before it.
    pub fn is_strictly_ascending(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].date < w[1].date)
    }

    /// Rows with a date strictly before `boundary`.
    pub fn truncated_before(&self, boundary: NaiveDate) -> HistoricalSeries {
        HistoricalSeries {
            rows: self
                .rows
                .iter()
                .filter(|r| r.date < boundary)
                .cloned()
                .collect(),
        }
    }

    /// This series followed by `appended`.
    pub fn appended(&self, appended: Vec<HistoricalRow>) -> HistoricalSeries {
        let mut rows = self.rows.clone();
        rows.extend(appended);
        HistoricalSeries { rows }
    }

    /// Recomputes the `year` attribute of every row from its date.
    pub fn with_recomputed_years(&self) -> HistoricalSeries {
        HistoricalSeries {
            rows: self
                .rows
                .iter()
                .map(|r| HistoricalRow {
                    year: r.date.year(),
                    ..r.clone()
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that abort a reconciliation run.
#[derive(Debug, PartialEq)]
pub enum RiverflowError {
    /// A scraped date fragment did not match "day abbreviated-month".
    DateParse { fragment: String, year: i32 },
    /// A scraped row had too few cells to hold the date and inflow columns.
    MalformedRow { cells: usize },
    /// A text cell reached the unit rescale step.
    TypeMismatch { date: NaiveDate, column: String, value: String },
    /// The historical series file is missing or holds no rows.
    EmptyHistory(String),
    /// The page could not be fetched or parsed.
    Fetch(String),
    /// The persisted CSV could not be read or written.
    Csv(String),
    Io(String),
    Config(String),
}

impl std::fmt::Display for RiverflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiverflowError::DateParse { fragment, year } => {
                write!(f, "Date parse error: '{}' (year {})", fragment, year)
            }
            RiverflowError::MalformedRow { cells } => {
                write!(f, "Malformed row: expected at least 9 cells, got {}", cells)
            }
            RiverflowError::TypeMismatch { date, column, value } => write!(
                f,
                "Type mismatch on {} in '{}': cannot rescale text value '{}'",
                date.format(DATE_FORMAT),
                column,
                value
            ),
            RiverflowError::EmptyHistory(path) => {
                write!(f, "Historical series is missing or empty: {}", path)
            }
            RiverflowError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            RiverflowError::Csv(msg) => write!(f, "CSV error: {}", msg),
            RiverflowError::Io(msg) => write!(f, "I/O error: {}", msg),
            RiverflowError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for RiverflowError {}

impl From<std::io::Error> for RiverflowError {
    fn from(e: std::io::Error) -> Self {
        RiverflowError::Io(e.to_string())
    }
}

impl From<csv::Error> for RiverflowError {
    fn from(e: csv::Error) -> Self {
        RiverflowError::Csv(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RiverflowError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
