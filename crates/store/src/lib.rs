//! SQLite persistence for the idealfit system.
//!
//! This crate provides:
//! - Wide `training` / `ideal` tables mirroring the input datasets
//! - The `best_fits` table holding the latest fit table
//! - Run-stamped classification results (`runs`, `test_results`)

pub mod schema;
pub mod result_store;

pub use schema::DatasetTable;
pub use result_store::{ResultStore, RunSummary};
