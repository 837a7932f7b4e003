//! Table layout and SQL helpers.

use idealfit_core::{AssignmentPolicy, Error, Result};

/// Fixed tables, created on open.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS best_fits (
    reference TEXT PRIMARY KEY,
    candidate TEXT NOT NULL,
    ssd REAL NOT NULL,
    max_dev REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    tolerance_multiplier REAL NOT NULL,
    policy TEXT NOT NULL,
    total INTEGER NOT NULL,
    assigned INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS test_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    x REAL,
    y REAL,
    delta_y REAL,
    ideal_func TEXT,
    reference TEXT
);

CREATE INDEX IF NOT EXISTS idx_test_results_run ON test_results(run_id);
"#;

/// Name of the x column in dataset tables.
pub(crate) const X_COLUMN: &str = "X";

/// Wide tables mirroring an input dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetTable {
    /// Reference ("training") series.
    Training,
    /// Candidate ("ideal") series.
    Ideal,
}

impl DatasetTable {
    /// SQL table name.
    pub fn name(self) -> &'static str {
        match self {
            DatasetTable::Training => "training",
            DatasetTable::Ideal => "ideal",
        }
    }
}

/// Quote an identifier for SQLite, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn policy_name(policy: AssignmentPolicy) -> &'static str {
    match policy {
        AssignmentPolicy::SmallestDeviation => "smallest_deviation",
        AssignmentPolicy::FirstEligible => "first_eligible",
    }
}

pub(crate) fn parse_policy(name: &str) -> Result<AssignmentPolicy> {
    match name {
        "smallest_deviation" => Ok(AssignmentPolicy::SmallestDeviation),
        "first_eligible" => Ok(AssignmentPolicy::FirstEligible),
        other => Err(Error::database(format!("unknown assignment policy '{other}'"))),
    }
}
