/// Integration tests for a full reconciliation run
///
/// These tests drive `pipeline::run_at` end to end:
/// 1. Sufficient current-year data splices the window and saves
/// 2. Re-running with no new days leaves the file byte-identical
/// 3. Early January tops up from the previous year
/// 4. No current-year data (or a failed fetch) is a no-op
/// 5. Missing history, bad dates and text cells abort before any write
///
/// The page is replaced by an in-memory `RawTableFetcher`; the CSV lives in
/// a temporary directory. No network access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate};
use riverflow_service::config::RiverflowConfig;
use riverflow_service::ingest::{RawRow, RawTableFetcher};
use riverflow_service::logging::{LogLevel, Logger, MemorySink};
use riverflow_service::model::{Cell, RiverflowError};
use riverflow_service::pipeline::run_at;
use riverflow_service::reconcile::{BoundaryPolicy, MergePath, TextPolicy};
use riverflow_service::store::load_history;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Serves canned rows per year; years without rows fail like a missing table.
struct CannedFetcher {
    pages: HashMap<i32, Vec<RawRow>>,
}

impl RawTableFetcher for CannedFetcher {
    fn fetch(
        &self,
        _url: &str,
        year: i32,
        _logger: &Logger,
    ) -> Result<Vec<RawRow>, Box<dyn std::error::Error>> {
        self.pages
            .get(&year)
            .cloned()
            .ok_or_else(|| format!("No table found on page for {}", year).into())
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// One raw page row, values in thousands. Inflows are `base`, `base+1`,
/// `base+2` and `base+3.5`.
fn raw_row(date: NaiveDate, base: i64) -> RawRow {
    vec![
        date.format("%d %b").to_string(),
        "1500.25".to_string(),
        base.to_string(),
        "30".to_string(),
        (base + 1).to_string(),
        "1100.10".to_string(),
        (base + 2).to_string(),
        "15".to_string(),
        format!("{}.5", base + 3),
        "55".to_string(),
        "60".to_string(),
        "58".to_string(),
    ]
}

/// Rows for `days` consecutive days from `first`, newest first, as the
/// page renders them.
fn page_rows(first: NaiveDate, days: u64) -> Vec<RawRow> {
    (0..days)
        .rev()
        .map(|i| raw_row(first + Days::new(i), 20 + i as i64))
        .collect()
}

/// Seed CSV with `days` rows ending at `last`, every value 7000.
fn write_seed(path: &Path, last: NaiveDate, days: u64) {
    let mut text = String::from(
        "Date,indus_at_tarbela (cfs),kabul_at_nowshera (cfs),jhelum_at_mangal (cfs),cheanab_at_marala (cfs),Year\n",
    );
    for back in (0..days).rev() {
        let date = last - Days::new(back);
        text.push_str(&format!(
            "{},7000,7000,7000,7000,{}\n",
            date.format("%Y-%m-%d"),
            date.year()
        ));
    }
    std::fs::write(path, text).expect("seed written");
}

fn setup(last: NaiveDate, days: u64) -> (TempDir, RiverflowConfig) {
    let dir = tempfile::tempdir().expect("temporary directory");
    let csv_path: PathBuf = dir.path().join("riverflow.csv");
    write_seed(&csv_path, last, days);
    let config = RiverflowConfig {
        csv_path,
        ..RiverflowConfig::default()
    };
    (dir, config)
}

fn fetcher(pages: Vec<(i32, Vec<RawRow>)>) -> CannedFetcher {
    CannedFetcher {
        pages: pages.into_iter().collect(),
    }
}

fn file_bytes(config: &RiverflowConfig) -> Vec<u8> {
    std::fs::read(&config.csv_path).expect("csv readable")
}

// ---------------------------------------------------------------------------
// Sufficient current-year data
// ---------------------------------------------------------------------------

#[test]
fn test_sufficient_data_splices_window_and_saves() {
    let (_dir, config) = setup(d(2024, 3, 31), 200);
    let fetcher = fetcher(vec![(2024, page_rows(d(2024, 1, 1), 100))]); // through Apr 9

    let output = run_at(&config, &fetcher, &Logger::silent(), d(2024, 4, 10)).expect("run succeeds");

    assert_eq!(output.report.path, MergePath::Sufficient);
    assert!(output.report.persisted);
    assert_eq!(output.report.retention_boundary, Some(d(2024, 1, 31)));
    assert_eq!(output.report.last_date, Some(d(2024, 4, 9)));
    assert_eq!(output.current.len(), 100);

    let stored = load_history(&config.csv_path, &Logger::silent()).expect("saved file loads");
    let dates: Vec<NaiveDate> = stored.rows().iter().map(|r| r.date).collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]), "unique and ascending");
    assert_eq!(dates.first(), Some(&(d(2024, 3, 31) - Days::new(199))));

    for row in stored.rows() {
        assert_eq!(row.year, row.date.year());
        if row.date < d(2024, 1, 31) {
            assert_eq!(row.values[0], Cell::Int(7000), "old rows untouched on {}", row.date);
        }
    }

    // Apr 9 is day index 99 of the page: base 119.
    let last = stored.rows().last().unwrap();
    assert_eq!(last.values[0], Cell::Int(119_000));
    assert_eq!(last.values[1], Cell::Int(120_000));
    assert_eq!(last.values[2], Cell::Int(121_000));
    assert_eq!(last.values[3], Cell::Float(122_500.0));
}

#[test]
fn test_boundary_date_is_dropped_by_default_and_kept_when_inclusive() {
    let (_dir, config) = setup(d(2024, 3, 31), 200);
    let fetcher = fetcher(vec![(2024, page_rows(d(2024, 1, 1), 100))]);

    run_at(&config, &fetcher, &Logger::silent(), d(2024, 4, 10)).expect("exclusive run");
    let stored = load_history(&config.csv_path, &Logger::silent()).unwrap();
    assert!(stored.rows().iter().all(|r| r.date != d(2024, 1, 31)));

    let (_dir, mut config) = setup(d(2024, 3, 31), 200);
    config.boundary_policy = BoundaryPolicy::Inclusive;
    let output = run_at(&config, &fetcher, &Logger::silent(), d(2024, 4, 10)).expect("inclusive run");
    assert_eq!(output.report.appended, 70);
    let stored = load_history(&config.csv_path, &Logger::silent()).unwrap();
    let jan_31 = stored.rows().iter().find(|r| r.date == d(2024, 1, 31)).unwrap();
    assert_eq!(jan_31.values[0], Cell::Int(50_000));
}

#[test]
fn test_window_after_a_gap_is_appended_and_old_rows_untouched() {
    let (_dir, config) = setup(d(2024, 3, 31), 200);
    let fetcher = fetcher(vec![(2024, page_rows(d(2024, 4, 5), 70))]); // through Jun 13

    let output = run_at(&config, &fetcher, &Logger::silent(), d(2024, 6, 14)).expect("run succeeds");

    assert_eq!(output.report.path, MergePath::Sufficient);
    assert_eq!(output.report.appended, 70);
    let stored = load_history(&config.csv_path, &Logger::silent()).unwrap();
    let dates: Vec<NaiveDate> = stored.rows().iter().map(|r| r.date).collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]));

    let old: Vec<_> = stored.rows().iter().filter(|r| r.date < d(2024, 1, 31)).collect();
    assert_eq!(old.len(), 200 - 61);
    assert!(old.iter().all(|r| r.values == [Cell::Int(7000), Cell::Int(7000), Cell::Int(7000), Cell::Int(7000)]));

    for i in 0..70u64 {
        let date = d(2024, 4, 5) + Days::new(i);
        let rows: Vec<_> = stored.rows().iter().filter(|r| r.date == date).collect();
        assert_eq!(rows.len(), 1, "{} stored once", date);
        assert_eq!(rows[0].values[0], Cell::Int((20 + i as i64) * 1000));
    }
    assert_eq!(stored.len(), old.len() + 70);
}

#[test]
fn test_rerun_without_new_days_leaves_file_byte_identical() {
    let (_dir, config) = setup(d(2024, 3, 31), 200);
    let fetcher = fetcher(vec![(2024, page_rows(d(2024, 1, 1), 100))]);

    run_at(&config, &fetcher, &Logger::silent(), d(2024, 4, 10)).expect("first run");
    let after_first = file_bytes(&config);

    let sink = MemorySink::new();
    let logger = Logger::new(LogLevel::Info).with_sink(sink.clone());
    let second = run_at(&config, &fetcher, &logger, d(2024, 4, 10)).expect("second run");

    assert_eq!(second.report.path, MergePath::Sufficient);
    assert!(!second.report.persisted);
    assert_eq!(file_bytes(&config), after_first);
    assert!(sink.contains("skipping save"));
    assert!(!sink.contains("Saved"));
}

// ---------------------------------------------------------------------------
// Early-year backfill
// ---------------------------------------------------------------------------

#[test]
fn test_early_january_tops_up_from_previous_year() {
    let (_dir, config) = setup(d(2024, 1, 5), 400);
    let fetcher = fetcher(vec![
        (2023, page_rows(d(2023, 9, 1), 122)), // through Dec 31
        (2024, page_rows(d(2024, 1, 1), 9)),
    ]);

    let output = run_at(&config, &fetcher, &Logger::silent(), d(2024, 1, 10)).expect("run succeeds");

    assert_eq!(output.report.path, MergePath::Backfill);
    assert!(output.report.persisted);
    assert_eq!(output.report.previous_rows, Some(122));
    assert_eq!(output.report.appended, 60);

    let stored = load_history(&config.csv_path, &Logger::silent()).expect("saved file loads");
    let dates: Vec<NaiveDate> = stored.rows().iter().map(|r| r.date).collect();
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(dates.last(), Some(&d(2024, 1, 9)));
    assert!(stored.rows().iter().all(|r| r.year == r.date.year()));

    // Previous-year rows in the window come from the 2023 page.
    let dec_31 = stored.rows().iter().find(|r| r.date == d(2023, 12, 31)).unwrap();
    assert_eq!(dec_31.values[0], Cell::Int((20 + 121) * 1000));
}

#[test]
fn test_threshold_exactly_met_still_takes_backfill_path() {
    let (_dir, config) = setup(d(2024, 2, 28), 200);
    let fetcher = fetcher(vec![(2024, page_rows(d(2024, 1, 1), 60))]);

    let output = run_at(&config, &fetcher, &Logger::silent(), d(2024, 3, 1)).expect("run succeeds");

    assert_eq!(output.report.path, MergePath::Backfill);
    assert_eq!(output.report.previous_rows, Some(0), "2023 page missing, nothing to top up");
    assert!(output.report.persisted);
}

// ---------------------------------------------------------------------------
// No data
// ---------------------------------------------------------------------------

#[test]
fn test_failed_fetch_is_a_logged_no_op() {
    let (_dir, config) = setup(d(2024, 3, 31), 100);
    let before = file_bytes(&config);
    let sink = MemorySink::new();
    let logger = Logger::new(LogLevel::Info).with_sink(sink.clone());

    let output = run_at(&config, &fetcher(vec![]), &logger, d(2024, 4, 10)).expect("no-op run");

    assert_eq!(output.report.path, MergePath::NoData);
    assert!(!output.report.persisted);
    assert!(output.current.is_empty());
    assert_eq!(file_bytes(&config), before);
    assert!(sink.contains("fetch failed"));
}

// ---------------------------------------------------------------------------
// Aborted runs
// ---------------------------------------------------------------------------

#[test]
fn test_missing_history_fails_fast_without_creating_file() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let config = RiverflowConfig {
        csv_path: dir.path().join("riverflow.csv"),
        ..RiverflowConfig::default()
    };
    let fetcher = fetcher(vec![(2024, page_rows(d(2024, 1, 1), 100))]);

    let err = run_at(&config, &fetcher, &Logger::silent(), d(2024, 4, 10)).unwrap_err();

    assert!(matches!(err, RiverflowError::EmptyHistory(_)));
    assert!(!config.csv_path.exists());
}

#[test]
fn test_bad_date_aborts_before_write() {
    let (_dir, config) = setup(d(2024, 3, 31), 100);
    let before = file_bytes(&config);
    let mut rows = page_rows(d(2024, 1, 1), 100);
    rows[3][0] = "Total".to_string();

    let err = run_at(&config, &fetcher(vec![(2024, rows)]), &Logger::silent(), d(2024, 4, 10))
        .unwrap_err();

    assert!(matches!(err, RiverflowError::DateParse { .. }));
    assert_eq!(file_bytes(&config), before);
}

#[test]
fn test_text_cell_in_window_aborts_under_reject_policy() {
    let (_dir, config) = setup(d(2024, 3, 31), 100);
    let before = file_bytes(&config);
    let mut rows = page_rows(d(2024, 1, 1), 100);
    rows[0][4] = "n/a".to_string(); // Apr 9, Kabul at Nowshera

    let err = run_at(&config, &fetcher(vec![(2024, rows)]), &Logger::silent(), d(2024, 4, 10))
        .unwrap_err();

    assert_eq!(
        err,
        RiverflowError::TypeMismatch {
            date: d(2024, 4, 9),
            column: "kabul_at_nowshera (cfs)".to_string(),
            value: "n/a".to_string(),
        }
    );
    assert_eq!(file_bytes(&config), before);
}

#[test]
fn test_text_cell_is_stored_verbatim_under_pass_through_policy() {
    let (_dir, mut config) = setup(d(2024, 3, 31), 100);
    config.text_policy = TextPolicy::PassThrough;
    let mut rows = page_rows(d(2024, 1, 1), 100);
    rows[0][4] = "n/a".to_string();

    let output = run_at(&config, &fetcher(vec![(2024, rows)]), &Logger::silent(), d(2024, 4, 10))
        .expect("pass-through run succeeds");
    assert!(output.report.persisted);

    let stored = load_history(&config.csv_path, &Logger::silent()).unwrap();
    let last = stored.rows().last().unwrap();
    assert_eq!(last.values[1], Cell::RawText("n/a".to_string()));
    assert_eq!(last.values[0], Cell::Int(119_000));
}
