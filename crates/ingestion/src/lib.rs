//! Data ingestion for the idealfit system.
//!
//! This crate handles:
//! - Wide CSV tables (one `X` column, one column per series) into datasets
//! - Two-column `X`,`Y` CSV tables into observation sequences

pub mod csv_source;

pub use csv_source::{load_dataset, load_observations, read_dataset, read_observations};
