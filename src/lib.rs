//! Credit-aware enrichment of calendar-derived contacts and their companies.
//!
//! Entry points: [`enrichment::run_enrichment`] for a single in-process run,
//! and [`state::spawn_enrichment_run`] with a [`state::RunRegistry`] for a
//! background run that a caller polls.

pub mod apollo;
pub mod db;
pub mod enrichment;
pub mod error;
mod migrations;
pub mod provider;
pub mod state;
pub mod types;
pub mod util;
