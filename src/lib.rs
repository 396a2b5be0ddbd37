//! # FACEIT Export
//!
//! Exports one division of a FACEIT championship to flat CSV tables.
//!
//! ## Architecture
//!
//! - **fetch**: HTTP client with rate-limit aware retries
//! - **faceit**: API endpoints, pagination, name resolution, flattening
//! - **models**: Wire shapes and output records
//! - **calculate**: Match outcomes, aggregates and map veto rows
//! - **storage**: Table sinks (CSV)
//! - **export**: The export pipeline
//! - **init** / **diagnose**: Config bootstrap and endpoint diagnostics
//! - **config**: Configuration loading and validation

pub mod calculate;
pub mod config;
pub mod diagnose;
pub mod export;
pub mod faceit;
pub mod fetch;
pub mod init;
pub mod models;
pub mod storage;

pub use models::*;
