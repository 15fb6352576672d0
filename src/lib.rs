//! River-flow reconciliation service.
//!
//! Scrapes the daily river-flow table published by WAPDA (inflows at
//! Tarbela, Nowshera, Mangla and Marala), normalizes it into per-year
//! series, and splices the recent window into a historical CSV keyed by
//! date. Meant to be run periodically by an external scheduler.

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod stations;
pub mod store;

pub use model::{Result, RiverflowError};
