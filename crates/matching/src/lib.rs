//! Best-fit selection and test-point classification for the idealfit system.
//!
//! This crate handles:
//! - Pointwise alignment of reference and candidate x-domains
//! - Least-squares candidate selection per reference series
//! - Tolerance-based assignment of observations to selected candidates

mod parallel;

pub mod deviation;
pub mod matcher;
pub mod classifier;

pub use deviation::{Alignment, Deviation};
pub use matcher::{select_best_candidates, SeriesMatcher};
pub use classifier::{classify, ClassificationStats, FitIndex, ObservationClassifier};
