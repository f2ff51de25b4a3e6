//! Acquisition of the raw source file.

pub mod source;

pub use source::*;
