//! Per-year series assembly.
//!
//! The scraper returns rows in no guaranteed order and may repeat a date
//! (the page is read top to bottom and carries header artifacts). This
//! module sorts rows ascending by date and keeps exactly one row per date.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::model::{ObservationRow, YearSeries};

/// Builds the series for `year` from normalized rows in scrape order.
///
/// Duplicate dates resolve to the last row seen: later rows overwrite
/// earlier ones.
pub fn build_year_series(rows: Vec<ObservationRow>, year: i32) -> YearSeries {
    let mut by_date: BTreeMap<NaiveDate, ObservationRow> = BTreeMap::new();
    for row in rows {
        by_date.insert(row.date, row);
    }
    YearSeries::from_sorted(year, by_date.into_values().collect())
}
