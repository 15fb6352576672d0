/// Data organization utilities for the river-flow service.
///
/// This module provides the grouping step between normalization and
/// reconciliation. Trend analysis over the persisted series is handled by
/// external notebooks that read the CSV directly.
///
/// Submodules:
/// - `year_series`: organizes flat normalized rows into a per-year series.

pub mod year_series;
