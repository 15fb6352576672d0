//! One reconciliation run, end to end.
//!
//! load history → fetch → normalize → build year series → reconcile → save
//!
//! # Clock injection
//! `run_at` takes `today` rather than reading the clock, which decides the
//! current and previous year. `run` is the thin wrapper that uses the local
//! date. Tests call `run_at` with fixed dates.

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::analysis::year_series::build_year_series;
use crate::config::RiverflowConfig;
use crate::ingest::RawTableFetcher;
use crate::logging::{Logger, Source};
use crate::model::{Result, YearSeries, DATE_FORMAT};
use crate::normalize::normalize_rows;
use crate::reconcile::{reconcile, select_path, MergePath};
use crate::store::{load_history, save_history};

/// Summary of a run, printable as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub current_year: i32,
    pub path: MergePath,
    pub current_rows: usize,
    /// Rows fetched for the previous year; only set on the backfill path.
    pub previous_rows: Option<usize>,
    pub appended: usize,
    pub retention_boundary: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub persisted: bool,
}

/// Everything a run produces: the report and the current-year series.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: RunReport,
    pub current: YearSeries,
}

/// Fetches, normalizes and assembles the series for one year.
///
/// A fetch failure is logged and yields an empty series. A row with a bad
/// date aborts with `DateParse`.
pub fn fetch_year_series(
    fetcher: &dyn RawTableFetcher,
    url: &str,
    year: i32,
    logger: &Logger,
) -> Result<YearSeries> {
    let ctx = year.to_string();
    let rows = match fetcher.fetch(url, year, logger) {
        Ok(rows) => rows,
        Err(e) => {
            logger.fetch_failure(year, e.as_ref());
            Vec::new()
        }
    };
    logger.info(Source::Wapda, Some(&ctx), &format!("Fetched {} table rows", rows.len()));

    let normalized = normalize_rows(&rows, year)?;
    let series = build_year_series(normalized, year);
    if series.len() < rows.len() {
        logger.debug(
            Source::Wapda,
            Some(&ctx),
            &format!("Collapsed {} duplicate dates", rows.len() - series.len()),
        );
    }
    Ok(series)
}

/// Runs one reconciliation as of `today`.
pub fn run_at(
    config: &RiverflowConfig,
    fetcher: &dyn RawTableFetcher,
    logger: &Logger,
    today: NaiveDate,
) -> Result<RunOutput> {
    let current_year = today.year();
    let previous_year = current_year - 1;
    logger.info(
        Source::System,
        None,
        &format!("The number of days since 1st of January: {}", today.ordinal0()),
    );

    let history = load_history(&config.csv_path, logger)?;
    let settings = config.reconcile_settings();

    let current = fetch_year_series(fetcher, &config.source_url, current_year, logger)?;

    let previous = match select_path(current.len(), settings.threshold_days) {
        MergePath::Backfill => {
            logger.info(
                Source::System,
                None,
                "Data available is less than the threshold days, reading the previous year",
            );
            Some(fetch_year_series(fetcher, &config.source_url, previous_year, logger)?)
        }
        _ => None,
    };

    let outcome = reconcile(&history, &current, previous.as_ref(), &settings, logger)?;

    if outcome.persist {
        save_history(&config.csv_path, &outcome.history, logger)?;
    }

    let report = RunReport {
        run_date: today,
        current_year,
        path: outcome.path,
        current_rows: current.len(),
        previous_rows: previous.as_ref().map(|p| p.len()),
        appended: outcome.appended,
        retention_boundary: outcome.boundary,
        last_date: outcome.history.last_date(),
        persisted: outcome.persist,
    };
    logger.info(
        Source::System,
        None,
        &format!(
            "Run complete: {}, appended {}, last date {}, saved: {}",
            report.path,
            report.appended,
            report
                .last_date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "-".into()),
            report.persisted
        ),
    );

    Ok(RunOutput { report, current })
}

/// Convenience wrapper that uses the local date.
/// Use `run_at` in tests to keep them deterministic.
pub fn run(config: &RiverflowConfig, fetcher: &dyn RawTableFetcher, logger: &Logger) -> Result<RunOutput> {
    run_at(config, fetcher, logger, Local::now().date_naive())
}
