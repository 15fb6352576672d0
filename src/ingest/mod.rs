/// Data ingestion from the WAPDA river-flow page.
///
/// Submodules:
/// - `wapda`: live page fetch over HTTP and HTML table extraction.
/// - `replay`: serves saved pages from disk for reproducible runs.
///
/// Both implement `RawTableFetcher`, the only thing the pipeline sees.

pub mod replay;
pub mod wapda;

use crate::logging::Logger;

/// One scraped table row: text cells in page order (see
/// `stations::TABLE_COLUMNS`).
pub type RawRow = Vec<String>;

/// Source of raw table rows for a given year.
///
/// The order of the returned rows is not guaranteed. Failures are reported
/// as boxed errors; the pipeline logs them and carries on with no rows.
pub trait RawTableFetcher {
    fn fetch(
        &self,
        url: &str,
        year: i32,
        logger: &Logger,
    ) -> Result<Vec<RawRow>, Box<dyn std::error::Error>>;
}
