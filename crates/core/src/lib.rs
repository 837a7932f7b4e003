//! Core types and configuration for the idealfit system.
//!
//! This crate provides shared types used across all other crates:
//! - Sampled datasets (reference and candidate series over one x-domain)
//! - Fit and classification results
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{AssignmentPolicy, Config, StoreConfig, ToleranceConfig};
pub use error::{Error, Result};
pub use types::*;
