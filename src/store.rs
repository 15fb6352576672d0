//! Persisted historical series.
//!
//! The series lives in one flat CSV keyed by an ISO `Date` column, with the
//! four inflow metrics and a derived `Year` column. Rows are assumed to be
//! ascending by date on load; they are never re-sorted here.
//!
//! Saves go to a sibling temporary file that is renamed over the target, so
//! a failed run never leaves a half-written series behind.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::logging::{Logger, Source};
use crate::model::{Cell, HistoricalRow, HistoricalSeries, Result, RiverflowError, DATE_FORMAT};
use crate::stations::{csv_headers, CSV_DATE_HEADER, CSV_YEAR_HEADER, INFLOW_METRICS};

/// Reads a stored value: integer, then float, else the text itself.
pub fn parse_stored_cell(raw: &str) -> Cell {
    let value = raw.trim();
    if let Ok(v) = value.parse::<i64>() {
        return Cell::Int(v);
    }
    match value.parse::<f64>() {
        Ok(v) => Cell::Float(v),
        Err(_) => Cell::RawText(raw.to_string()),
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Loads the historical series from `path`.
///
/// A missing file or a file without data rows is `EmptyHistory`: the merge
/// needs at least one stored date to place its retention boundary.
pub fn load_history(path: &Path, logger: &Logger) -> Result<HistoricalSeries> {
    let ctx = path.display().to_string();
    if !path.exists() {
        return Err(RiverflowError::EmptyHistory(ctx));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let date_idx = column_index(&headers, CSV_DATE_HEADER)
        .ok_or_else(|| RiverflowError::Csv(format!("{}: missing '{}' column", ctx, CSV_DATE_HEADER)))?;
    let metric_idx: Vec<usize> = INFLOW_METRICS
        .iter()
        .map(|m| {
            column_index(&headers, m.csv_header)
                .ok_or_else(|| RiverflowError::Csv(format!("{}: missing '{}' column", ctx, m.csv_header)))
        })
        .collect::<Result<_>>()?;
    let year_idx = column_index(&headers, CSV_YEAR_HEADER);
    if year_idx.is_none() {
        logger.warn(Source::Csv, Some(&ctx), "No 'Year' column, deriving it from dates");
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let date_text = field(date_idx);
        let date = NaiveDate::parse_from_str(date_text.trim(), DATE_FORMAT).map_err(|_| {
            RiverflowError::Csv(format!(
                "{}: row {} has invalid date '{}'",
                ctx,
                line + 2,
                date_text
            ))
        })?;

        let values = [
            parse_stored_cell(field(metric_idx[0])),
            parse_stored_cell(field(metric_idx[1])),
            parse_stored_cell(field(metric_idx[2])),
            parse_stored_cell(field(metric_idx[3])),
        ];
        let year = year_idx
            .and_then(|idx| field(idx).trim().parse::<i32>().ok())
            .unwrap_or_else(|| date.year());

        rows.push(HistoricalRow { date, values, year });
    }

    let series = HistoricalSeries::new(rows);
    if series.is_empty() {
        return Err(RiverflowError::EmptyHistory(ctx));
    }
    if !series.is_strictly_ascending() {
        logger.warn(
            Source::Csv,
            Some(&ctx),
            "Stored series is not strictly ascending by date; merging as-is",
        );
    }

    logger.info(
        Source::Csv,
        Some(&ctx),
        &format!(
            "Loaded {} rows, last date {}",
            series.len(),
            series
                .last_date()
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default()
        ),
    );
    Ok(series)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_rows(tmp: &Path, series: &HistoricalSeries) -> Result<()> {
    let mut writer = csv::Writer::from_path(tmp)?;
    writer.write_record(csv_headers())?;
    for row in series.rows() {
        let mut record = Vec::with_capacity(6);
        record.push(row.date.format(DATE_FORMAT).to_string());
        record.extend(row.values.iter().map(|v| v.to_string()));
        record.push(row.year.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `series` to `path`, replacing the previous file atomically. A
/// failed write removes the temporary file and leaves `path` untouched.
pub fn save_history(path: &Path, series: &HistoricalSeries, logger: &Logger) -> Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = write_rows(&tmp, series).and_then(|()| Ok(std::fs::rename(&tmp, path)?)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    logger.info(
        Source::Csv,
        Some(&path.display().to_string()),
        &format!("Saved {} rows", series.len()),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
