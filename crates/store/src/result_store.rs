//! SQLite-backed store for datasets, fit tables and classification runs.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use idealfit_core::{
    Assignment, ClassificationRecord, Dataset, Error, FitResult, FitTable, Result,
    ToleranceConfig,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::schema::{parse_policy, policy_name, quote_ident, DatasetTable, SCHEMA, X_COLUMN};

fn db_err(err: rusqlite::Error) -> Error {
    Error::database(err.to_string())
}

/// One persisted classification run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Run id (primary key of `runs`).
    pub id: i64,
    /// When the run was saved.
    pub created_at: DateTime<Utc>,
    /// Tolerance policy the records were produced with.
    pub tolerance: ToleranceConfig,
    /// Number of records.
    pub total: u64,
    /// Number of assigned records.
    pub assigned: u64,
}

impl RunSummary {
    /// Number of unassigned records.
    pub fn unassigned(&self) -> u64 {
        self.total - self.assigned
    }
}

/// Raw `runs` row before timestamp and policy parsing.
type RunRow = (i64, String, f64, String, i64, i64);

fn read_run_row(row: &Row<'_>) -> rusqlite::Result<RunRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn run_from_row((id, created_at, multiplier, policy, total, assigned): RunRow) -> Result<RunSummary> {
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::database(format!("run {id}: bad timestamp '{created_at}': {e}")))?
        .with_timezone(&Utc);
    Ok(RunSummary {
        id,
        created_at,
        tolerance: ToleranceConfig {
            multiplier,
            policy: parse_policy(&policy)?,
        },
        total: total.max(0) as u64,
        assigned: assigned.max(0) as u64,
    })
}

const RUN_COLUMNS: &str = "id, created_at, tolerance_multiplier, policy, total, assigned";

fn write_dataset(conn: &Connection, table: DatasetTable, dataset: &Dataset) -> Result<()> {
    let mut seen = BTreeSet::from([X_COLUMN.to_ascii_lowercase()]);
    for name in dataset.series_names() {
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(Error::data(format!(
                "series '{name}' collides with another column of table '{}' (names are case-insensitive)",
                table.name()
            )));
        }
    }

    let table_name = quote_ident(table.name());
    let mut columns = vec![format!("{} REAL PRIMARY KEY", quote_ident(X_COLUMN))];
    columns.extend(
        dataset
            .series_names()
            .map(|name| format!("{} REAL NOT NULL", quote_ident(name))),
    );
    let placeholders = vec!["?"; columns.len()].join(", ");

    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table_name}; CREATE TABLE {table_name} ({});",
        columns.join(", ")
    ))
    .map_err(db_err)?;
    let mut stmt = conn
        .prepare(&format!("INSERT INTO {table_name} VALUES ({placeholders})"))
        .map_err(db_err)?;
    let series: Vec<&[f64]> = dataset.iter().map(|s| s.y).collect();
    for (pos, &x) in dataset.x_values().iter().enumerate() {
        let row = std::iter::once(x).chain(series.iter().map(|y| y[pos]));
        stmt.execute(params_from_iter(row)).map_err(db_err)?;
    }

    info!(
        table = table.name(),
        series = dataset.series_count(),
        points = dataset.point_count(),
        "saved dataset"
    );
    Ok(())
}

fn write_fit_table(conn: &Connection, fit_table: &FitTable) -> Result<()> {
    conn.execute("DELETE FROM best_fits", []).map_err(db_err)?;
    let mut stmt = conn
        .prepare("INSERT INTO best_fits (reference, candidate, ssd, max_dev) VALUES (?1, ?2, ?3, ?4)")
        .map_err(db_err)?;
    for (reference, fit) in fit_table {
        stmt.execute(params![reference, fit.candidate, fit.ssd, fit.max_deviation])
            .map_err(db_err)?;
    }

    info!(entries = fit_table.len(), "saved fit table");
    Ok(())
}

fn write_results(
    conn: &Connection,
    records: &[ClassificationRecord],
    tolerance: &ToleranceConfig,
) -> Result<RunSummary> {
    let created_at = Utc::now();
    let total = records.len() as u64;
    let assigned = records.iter().filter(|r| r.is_assigned()).count() as u64;

    conn.execute(
        "INSERT INTO runs (created_at, tolerance_multiplier, policy, total, assigned) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            created_at.to_rfc3339(),
            tolerance.multiplier,
            policy_name(tolerance.policy),
            total as i64,
            assigned as i64
        ],
    )
    .map_err(db_err)?;
    let id = conn.last_insert_rowid();
    let mut stmt = conn
        .prepare(
            "INSERT INTO test_results (run_id, x, y, delta_y, ideal_func, reference) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(db_err)?;
    for record in records {
        let reference = record.assignment.as_ref().map(|a| a.reference.as_str());
        stmt.execute(params![
            id,
            record.x,
            record.y,
            record.deviation(),
            record.candidate(),
            reference
        ])
        .map_err(db_err)?;
    }

    info!(run = id, total, assigned, "saved classification results");
    Ok(RunSummary {
        id,
        created_at,
        tolerance: *tolerance,
        total,
        assigned,
    })
}

/// Persistent store over one SQLite connection.
pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(db_err)?;
        debug!(path = %path.display(), "opened result store");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn })
    }

    /// Replace a dataset table with the contents of `dataset`.
    ///
    /// The table gets an `X` column plus one column per series, named after
    /// the series. SQLite column names are case-insensitive, so a series
    /// called `x`, or two series differing only in case, are rejected.
    pub fn save_dataset(&mut self, table: DatasetTable, dataset: &Dataset) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        write_dataset(&tx, table, dataset)?;
        tx.commit().map_err(db_err)
    }

    /// Read a dataset table back, rows in insertion order.
    pub fn load_dataset(&self, table: DatasetTable) -> Result<Dataset> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(table.name())))
            .map_err(db_err)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let x_idx = names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(X_COLUMN))
            .ok_or_else(|| Error::database(format!("table '{}' has no X column", table.name())))?;

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        let mut rows = stmt.query([]).map_err(db_err)?;
        while let Some(row) = rows.next().map_err(db_err)? {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row.get(idx).map_err(db_err)?);
            }
        }

        let x = std::mem::take(&mut columns[x_idx]);
        let series: Vec<(String, Vec<f64>)> = names
            .into_iter()
            .zip(columns)
            .enumerate()
            .filter(|(idx, _)| *idx != x_idx)
            .map(|(_, named)| named)
            .collect();
        Dataset::new(x, series)
    }

    /// Replace the stored fit table.
    pub fn save_fit_table(&mut self, fit_table: &FitTable) -> Result<()> {
        let tx = self.conn.transaction().map_err(db_err)?;
        write_fit_table(&tx, fit_table)?;
        tx.commit().map_err(db_err)
    }

    /// Read the stored fit table.
    pub fn load_fit_table(&self) -> Result<FitTable> {
        let mut stmt = self
            .conn
            .prepare("SELECT reference, candidate, ssd, max_dev FROM best_fits ORDER BY reference")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    FitResult {
                        candidate: row.get(1)?,
                        ssd: row.get(2)?,
                        max_deviation: row.get(3)?,
                    },
                ))
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<FitTable>>().map_err(db_err)
    }

    /// Store one classification run and its records, in record order.
    pub fn save_results(
        &mut self,
        records: &[ClassificationRecord],
        tolerance: &ToleranceConfig,
    ) -> Result<RunSummary> {
        let tx = self.conn.transaction().map_err(db_err)?;
        let summary = write_results(&tx, records, tolerance)?;
        tx.commit().map_err(db_err)?;
        Ok(summary)
    }

    /// Store a complete pipeline outcome in one transaction.
    ///
    /// Either both dataset tables, the fit table and the new run are all
    /// written, or the database is left as it was.
    pub fn save_run(
        &mut self,
        training: &Dataset,
        ideal: &Dataset,
        fit_table: &FitTable,
        records: &[ClassificationRecord],
        tolerance: &ToleranceConfig,
    ) -> Result<RunSummary> {
        let tx = self.conn.transaction().map_err(db_err)?;
        write_dataset(&tx, DatasetTable::Training, training)?;
        write_dataset(&tx, DatasetTable::Ideal, ideal)?;
        write_fit_table(&tx, fit_table)?;
        let summary = write_results(&tx, records, tolerance)?;
        tx.commit().map_err(db_err)?;
        Ok(summary)
    }

    /// Records of one run, in the order they were saved.
    pub fn load_results(&self, run_id: i64) -> Result<Vec<ClassificationRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT x, y, delta_y, ideal_func, reference FROM test_results WHERE run_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([run_id], |row| {
                // NaN coordinates are stored by SQLite as NULL.
                let x: Option<f64> = row.get(0)?;
                let y: Option<f64> = row.get(1)?;
                let deviation: Option<f64> = row.get(2)?;
                let candidate: Option<String> = row.get(3)?;
                let reference: Option<String> = row.get(4)?;
                let assignment = match (candidate, deviation) {
                    (Some(candidate), Some(deviation)) => Some(Assignment {
                        reference: reference.unwrap_or_default(),
                        candidate,
                        deviation,
                    }),
                    _ => None,
                };
                Ok(ClassificationRecord {
                    x: x.unwrap_or(f64::NAN),
                    y: y.unwrap_or(f64::NAN),
                    assignment,
                })
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// One run by id.
    pub fn run(&self, run_id: i64) -> Result<Option<RunSummary>> {
        let row: Option<RunRow> = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                [run_id],
                read_run_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(run_from_row).transpose()
    }

    /// Most recently saved run.
    pub fn latest_run(&self) -> Result<Option<RunSummary>> {
        let row: Option<RunRow> = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT 1"),
                [],
                read_run_row,
            )
            .optional()
            .map_err(db_err)?;
        row.map(run_from_row).transpose()
    }

    /// All runs, oldest first.
    pub fn runs(&self) -> Result<Vec<RunSummary>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id"))
            .map_err(db_err)?;
        let rows = stmt.query_map([], read_run_row).map_err(db_err)?;
        let raw: Vec<RunRow> = rows.collect::<rusqlite::Result<_>>().map_err(db_err)?;
        raw.into_iter().map(run_from_row).collect()
    }
}
