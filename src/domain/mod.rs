//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the raw per-day row (`CaseRecord`) and its enriched form (`EnrichedRecord`)
//! - the per-entity chart projection (`EntityProjection`, `Projection`)
//! - the fixed input/output column layouts and run configuration

pub mod types;

pub use types::*;
