//! Time-series enrichment.
//!
//! Responsibilities:
//!
//! - resolve threshold anchors per entity and metric (`anchor`)
//! - compute running totals, day-N indices and corrected dates (`series`)

pub mod anchor;
pub mod series;

pub use anchor::*;
pub use series::*;
