/// WAPDA river-flow page client
///
/// Retrieves the daily river-flow table (levels, inflows and outflows at
/// Tarbela, Nowshera, Mangla and Marala) published by the Water and Power
/// Development Authority for a given year.
///
/// Page: https://www.wapda.gov.pk/river-flow

use std::time::Duration;

use scraper::{Html, Selector};

use super::{RawRow, RawTableFetcher};
use crate::logging::{Logger, Source};
use crate::stations::TABLE_COLUMNS;

/// Default page address.
pub const WAPDA_RIVER_FLOW_URL: &str = "https://www.wapda.gov.pk/river-flow";

// ============================================================================
// HTML Table Extraction
// ============================================================================

/// Extracts the body rows of the first `<table>` in `html`.
///
/// Each row is the trimmed text of its `<td>` cells. Header rows (only
/// `<th>` cells) are skipped. Rows whose cell count differs from the
/// river-flow layout are returned in `rejected` rather than the row list.
pub fn parse_table_rows(html: &str) -> Result<ParsedTable, Box<dyn std::error::Error>> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").map_err(|e| format!("Selector error: {e:?}"))?;
    let row_sel = Selector::parse("tr").map_err(|e| format!("Selector error: {e:?}"))?;
    let cell_sel = Selector::parse("td").map_err(|e| format!("Selector error: {e:?}"))?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or("No table found on page")?;

    let mut parsed = ParsedTable::default();
    for row in table.select(&row_sel) {
        let cells: RawRow = row
            .select(&cell_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();
        if cells.is_empty() {
            continue; // header row
        }
        if cells.len() == TABLE_COLUMNS.len() {
            parsed.rows.push(cells);
        } else {
            parsed.rejected.push(cells);
        }
    }

    Ok(parsed)
}

/// Rows pulled from a page, split by whether they fit the table layout.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedTable {
    pub rows: Vec<RawRow>,
    pub rejected: Vec<RawRow>,
}

/// Warns about rows dropped for not matching the table layout.
pub(crate) fn log_rejected(logger: &Logger, year: i32, parsed: &ParsedTable) {
    if parsed.rejected.is_empty() {
        return;
    }
    let context = year.to_string();
    logger.warn(
        Source::Wapda,
        Some(&context),
        &format!(
            "Skipped {} rows with unexpected cell counts",
            parsed.rejected.len()
        ),
    );
    for row in &parsed.rejected {
        logger.debug(Source::Wapda, Some(&context), &format!("skipped row: {:?}", row));
    }
}

// ============================================================================
// HTTP Fetcher
// ============================================================================

/// Fetches the page for a year with `?year=<year>` and extracts its table.
///
/// The live river-flow page is rendered client-side and picks its year from
/// a dropdown, so the server HTML usually carries no `<table>` at all. Such
/// a fetch fails with "No table found on page" and the run takes the no-data
/// path. To work from real data, save the rendered page per year and run with
/// `--replay-dir` (see `replay::ReplayFetcher`).
pub struct HttpTableFetcher {
    client: reqwest::blocking::Client,
}

impl HttpTableFetcher {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, Box<dyn std::error::Error>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpTableFetcher { client })
    }
}

impl RawTableFetcher for HttpTableFetcher {
    fn fetch(
        &self,
        url: &str,
        year: i32,
        logger: &Logger,
    ) -> Result<Vec<RawRow>, Box<dyn std::error::Error>> {
        let response = self
            .client
            .get(url)
            .query(&[("year", year)])
            .header("Accept", "text/html")
            .send()?;

        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()).into());
        }

        let body = response.text()?;
        let parsed = parse_table_rows(&body)?;
        log_rejected(logger, year, &parsed);
        Ok(parsed.rows)
    }
}

// ============================================================================
// Tests
// ============================================================================
