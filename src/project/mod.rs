//! Per-entity chart projection of the enriched stream.

pub mod projector;

pub use projector::*;
