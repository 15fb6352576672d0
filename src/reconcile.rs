//! Incremental merge of freshly scraped days into the historical series.
//!
//! The page only renders a short recent window reliably, so every run
//! re-splices the last `threshold_days` days instead of re-merging the
//! whole history:
//!
//! ```text
//! boundary = last historical date - threshold_days
//! result   = history[date < boundary] ++ fresh[date > boundary]
//! ```
//!
//! The boundary date itself is dropped by default. `BoundaryPolicy::Inclusive`
//! takes it from the fresh rows instead.
//!
//! Three paths, picked by how many current-year days were scraped:
//!
//! | path       | current-year rows        | fresh source                      | persists            |
//! |------------|--------------------------|-----------------------------------|---------------------|
//! | Sufficient | `> threshold_days`       | current year                      | if last date moved  |
//! | Backfill   | `1..=threshold_days`     | previous-year tail ++ current     | always              |
//! | NoData     | `0`                      | none                              | never               |
//!
//! Everything here is pure: inputs are borrowed, results are new values.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::logging::{Logger, Source};
use crate::model::{
    Cell, HistoricalRow, HistoricalSeries, ObservationRow, Result, RiverflowError, YearSeries,
    DATE_FORMAT,
};
use crate::normalize::recoerce;
use crate::stations::INFLOW_METRICS;

/// Default size of the re-spliced window, in days.
pub const DEFAULT_THRESHOLD_DAYS: usize = 60;

/// Source values are published in thousands.
pub const DEFAULT_UNIT_MULTIPLIER: i64 = 1000;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// What the rescale step does with a cell that stayed text after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPolicy {
    /// Abort the run with `RiverflowError::TypeMismatch`.
    #[default]
    Reject,
    /// Keep the text as-is, unscaled.
    PassThrough,
}

/// Which fresh rows the splice takes relative to the retention boundary.
/// History is always kept strictly before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Fresh rows strictly after the boundary; the boundary date is dropped.
    #[default]
    Exclusive,
    /// Fresh rows on or after the boundary.
    Inclusive,
}

impl BoundaryPolicy {
    fn takes(self, date: NaiveDate, boundary: NaiveDate) -> bool {
        match self {
            BoundaryPolicy::Exclusive => date > boundary,
            BoundaryPolicy::Inclusive => date >= boundary,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSettings {
    pub threshold_days: usize,
    pub unit_multiplier: i64,
    pub text_policy: TextPolicy,
    pub boundary_policy: BoundaryPolicy,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        ReconcileSettings {
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            unit_multiplier: DEFAULT_UNIT_MULTIPLIER,
            text_policy: TextPolicy::Reject,
            boundary_policy: BoundaryPolicy::Exclusive,
        }
    }
}

// ---------------------------------------------------------------------------
// Path selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePath {
    /// More than `threshold_days` current-year rows.
    Sufficient,
    /// Some current-year rows, topped up from the previous year.
    Backfill,
    /// No current-year rows at all.
    NoData,
}

impl std::fmt::Display for MergePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePath::Sufficient => write!(f, "sufficient current-year data"),
            MergePath::Backfill => write!(f, "backfill from previous year"),
            MergePath::NoData => write!(f, "no current-year data"),
        }
    }
}

/// Picks the merge path. Exactly `threshold_days` rows is not enough for
/// `Sufficient`: the comparison is strictly greater than.
pub fn select_path(current_len: usize, threshold_days: usize) -> MergePath {
    if current_len > threshold_days {
        MergePath::Sufficient
    } else if current_len > 0 {
        MergePath::Backfill
    } else {
        MergePath::NoData
    }
}

/// Number of previous-year rows needed to fill the window.
pub fn backfill_days(current_len: usize, threshold_days: usize) -> usize {
    threshold_days.saturating_sub(current_len)
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Last historical date minus `threshold_days`.
///
/// Fails with `EmptyHistory` when there is no last date to measure from.
pub fn retention_boundary(history: &HistoricalSeries, threshold_days: usize) -> Result<NaiveDate> {
    let last = history
        .last_date()
        .ok_or_else(|| RiverflowError::EmptyHistory("historical series has no rows".into()))?;
    last.checked_sub_days(Days::new(threshold_days as u64))
        .ok_or_else(|| RiverflowError::Config(format!("threshold_days {} out of range", threshold_days)))
}

fn rescale_cell(
    cell: &Cell,
    multiplier: i64,
    policy: TextPolicy,
    date: NaiveDate,
    column: &str,
) -> Result<Cell> {
    match recoerce(cell) {
        Cell::Int(v) => Ok(v
            .checked_mul(multiplier)
            .map(Cell::Int)
            .unwrap_or(Cell::Float(v as f64 * multiplier as f64))),
        Cell::Float(v) => Ok(Cell::Float(v * multiplier as f64)),
        Cell::RawText(text) => match policy {
            TextPolicy::PassThrough => Ok(Cell::RawText(text)),
            TextPolicy::Reject => Err(RiverflowError::TypeMismatch {
                date,
                column: column.to_string(),
                value: text,
            }),
        },
    }
}

/// Re-coerces every value and multiplies it by `multiplier`.
pub fn rescale_rows(
    rows: &[ObservationRow],
    multiplier: i64,
    policy: TextPolicy,
) -> Result<Vec<ObservationRow>> {
    rows.iter()
        .map(|row| {
            let mut values = row.values.clone();
            for (value, metric) in values.iter_mut().zip(INFLOW_METRICS.iter()) {
                *value = rescale_cell(value, multiplier, policy, row.date, metric.csv_header)?;
            }
            Ok(ObservationRow {
                date: row.date,
                values,
            })
        })
        .collect()
}

/// Previous-year tail followed by the current year, `threshold_days` rows
/// in total when the previous year has enough rows.
pub fn combine_with_previous_year(
    previous: &YearSeries,
    current: &YearSeries,
    threshold_days: usize,
) -> YearSeries {
    previous
        .tail(backfill_days(current.len(), threshold_days))
        .concat(current)
}

/// Result of splicing one fresh window into the history.
#[derive(Debug, Clone, PartialEq)]
pub struct Splice {
    pub history: HistoricalSeries,
    pub boundary: NaiveDate,
    pub kept: usize,
    pub appended: usize,
}

/// Keeps history strictly before the boundary and appends the rescaled
/// fresh rows after it (on it too, for `BoundaryPolicy::Inclusive`), each
/// tagged with its year.
pub fn splice(
    history: &HistoricalSeries,
    fresh: &YearSeries,
    settings: &ReconcileSettings,
) -> Result<Splice> {
    let boundary = retention_boundary(history, settings.threshold_days)?;
    let kept = history.truncated_before(boundary);

    let window: Vec<ObservationRow> = fresh
        .rows()
        .iter()
        .filter(|r| settings.boundary_policy.takes(r.date, boundary))
        .cloned()
        .collect();
    let appended: Vec<HistoricalRow> =
        rescale_rows(&window, settings.unit_multiplier, settings.text_policy)?
            .into_iter()
            .map(HistoricalRow::from_observation)
            .collect();

    let kept_len = kept.len();
    let appended_len = appended.len();
    Ok(Splice {
        history: kept.appended(appended),
        boundary,
        kept: kept_len,
        appended: appended_len,
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub path: MergePath,
    /// The merged series; the input history unchanged for `NoData`.
    pub history: HistoricalSeries,
    pub boundary: Option<NaiveDate>,
    pub appended: usize,
    /// Whether the merged series should be written back.
    pub persist: bool,
}

/// Merges the scraped series into `history`.
///
/// `previous` is only consulted on the backfill path; `None` there is
/// treated as an empty previous year.
pub fn reconcile(
    history: &HistoricalSeries,
    current: &YearSeries,
    previous: Option<&YearSeries>,
    settings: &ReconcileSettings,
    logger: &Logger,
) -> Result<Reconciliation> {
    let path = select_path(current.len(), settings.threshold_days);
    let year_ctx = current.year.to_string();
    logger.info(
        Source::Merge,
        Some(&year_ctx),
        &format!(
            "{} current-year rows, threshold {} days: {}",
            current.len(),
            settings.threshold_days,
            path
        ),
    );

    match path {
        MergePath::NoData => {
            logger.info(Source::Merge, Some(&year_ctx), "No data at all, nothing to merge");
            Ok(Reconciliation {
                path,
                history: history.clone(),
                boundary: None,
                appended: 0,
                persist: false,
            })
        }
        MergePath::Sufficient => {
            let previous_last = history.last_date();
            let spliced = splice(history, current, settings)?;
            log_splice(logger, &year_ctx, &spliced);

            let persist = current.last_date() != previous_last;
            if !persist {
                logger.info(
                    Source::Merge,
                    Some(&year_ctx),
                    "Last scraped date already stored, skipping save",
                );
            }
            Ok(Reconciliation {
                path,
                history: spliced.history,
                boundary: Some(spliced.boundary),
                appended: spliced.appended,
                persist,
            })
        }
        MergePath::Backfill => {
            let empty = YearSeries::empty(current.year - 1);
            let previous = previous.unwrap_or(&empty);
            let needed = backfill_days(current.len(), settings.threshold_days);
            let combined = combine_with_previous_year(previous, current, settings.threshold_days);
            logger.info(
                Source::Merge,
                Some(&year_ctx),
                &format!(
                    "Topping up with {} of {} wanted rows from {}",
                    combined.len().saturating_sub(current.len()),
                    needed,
                    previous.year
                ),
            );
            if previous.len() < needed {
                logger.warn(
                    Source::Merge,
                    Some(&previous.year.to_string()),
                    &format!("Previous year has only {} rows", previous.len()),
                );
            }

            let spliced = splice(history, &combined, settings)?;
            log_splice(logger, &year_ctx, &spliced);

            // Rows written before a year rollover may carry a stale year.
            let repaired = spliced.history.with_recomputed_years();
            let drifted = spliced
                .history
                .rows()
                .iter()
                .filter(|r| r.year != r.date.year())
                .count();
            if drifted > 0 {
                logger.info(
                    Source::Merge,
                    Some(&year_ctx),
                    &format!("Repaired year attribute on {} rows", drifted),
                );
            }

            Ok(Reconciliation {
                path,
                history: repaired,
                boundary: Some(spliced.boundary),
                appended: spliced.appended,
                persist: true,
            })
        }
    }
}

fn log_splice(logger: &Logger, year_ctx: &str, spliced: &Splice) {
    logger.info(
        Source::Merge,
        Some(year_ctx),
        &format!(
            "Retention boundary {}: kept {} historical rows, appended {} fresh rows",
            spliced.boundary.format(DATE_FORMAT),
            spliced.kept,
            spliced.appended
        ),
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
