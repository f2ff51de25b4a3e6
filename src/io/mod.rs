//! Input/output helpers.
//!
//! - raw CSV ingest + validation (`ingest`)
//! - enriched stream read/write and atomic artifact writes (`export`)
//! - projection JSON / JS rendering (`projection`)

pub mod export;
pub mod ingest;
pub mod projection;

pub use export::*;
pub use ingest::*;
pub use projection::*;
