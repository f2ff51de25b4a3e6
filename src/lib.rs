//! `covid-curves` library crate.
//!
//! The binary (`covid`) is a thin wrapper around this library so that:
//!
//! - the enrichment and projection engine is testable without spawning processes
//! - each stage (enrich, project, index) can run on its own or as one pipeline

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod index;
pub mod io;
pub mod project;
pub mod report;
