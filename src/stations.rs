/// Table schema registry for the WAPDA river-flow page.
///
/// Defines the canonical column layout of the scraped table and the four
/// inflow metrics this service keeps, along with the header names used in
/// the persisted CSV. This is the single source of truth for column
/// positions, and other modules should reference columns from here rather
/// than hardcoding indices.

// ---------------------------------------------------------------------------
// Scraped table layout
// ---------------------------------------------------------------------------

/// Column headings of the river-flow table, in page order.
pub static TABLE_COLUMNS: &[&str] = &[
    "Date",
    "LEVEL (FEET) INDUS AT TARBELA",
    "INFLOW INDUS AT TARBELA",
    "OUTFLOW INDUS AT TARBELA",
    "INFLOW KABUL AT NOWSHERA",
    "LEVEL (FEET) JEHLUM AT MANGLA",
    "INFLOW JEHLUM AT MANGLA",
    "OUTFLOW JEHLUM AT MANGLA",
    "INFLOW CHENAB AT MARALA",
    "CURRENT YEAR",
    "LAST YEAR",
    "AVG: Last 10-years",
];

/// Index of the "day abbreviated-month" fragment within a raw row.
pub const DATE_COLUMN: usize = 0;

/// Minimum cells a raw row needs: the date plus the eight station columns.
/// The trailing summary columns are dropped.
pub const MIN_ROW_CELLS: usize = 9;

// ---------------------------------------------------------------------------
// Retained metrics
// ---------------------------------------------------------------------------

/// One inflow measurement kept in the historical series.
pub struct InflowMetric {
    /// River and monitoring station, as shown on the page.
    pub station: &'static str,
    /// Position in the raw scraped row.
    pub source_column: usize,
    /// Column header in the persisted CSV.
    pub csv_header: &'static str,
}

/// The inflow metrics in persisted column order. The CSV headers are kept
/// byte-for-byte compatible with existing `riverflow.csv` files, spelling
/// included.
pub static INFLOW_METRICS: [InflowMetric; 4] = [
    InflowMetric {
        station: "Indus at Tarbela",
        source_column: 2,
        csv_header: "indus_at_tarbela (cfs)",
    },
    InflowMetric {
        station: "Kabul at Nowshera",
        source_column: 4,
        csv_header: "kabul_at_nowshera (cfs)",
    },
    InflowMetric {
        station: "Jhelum at Mangla",
        source_column: 6,
        csv_header: "jhelum_at_mangal (cfs)",
    },
    InflowMetric {
        station: "Chenab at Marala",
        source_column: 8,
        csv_header: "cheanab_at_marala (cfs)",
    },
];

/// Header of the date key column in the persisted CSV.
pub const CSV_DATE_HEADER: &str = "Date";

/// Header of the derived year column in the persisted CSV.
pub const CSV_YEAR_HEADER: &str = "Year";

/// Full persisted header row: date, the four metrics, year.
pub fn csv_headers() -> Vec<&'static str> {
    let mut headers = vec![CSV_DATE_HEADER];
    headers.extend(INFLOW_METRICS.iter().map(|m| m.csv_header));
    headers.push(CSV_YEAR_HEADER);
    headers
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
