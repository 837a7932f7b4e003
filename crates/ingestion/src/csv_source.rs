//! CSV readers for datasets and observation streams.
//!
//! Header names are trimmed and upper-cased before use, so `x`, ` X ` and `X`
//! all name the shared x column.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use idealfit_core::{Dataset, Error, Observation, Result};
use tracing::{debug, info};

/// Column holding the independent variable.
const X_COLUMN: &str = "X";

/// Column holding an observation's dependent value.
const Y_COLUMN: &str = "Y";

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn csv_error(err: csv::Error) -> Error {
    Error::parse(err.to_string())
}

/// Read and normalise the header row.
fn headers<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let names: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();

    if names.is_empty() {
        return Err(Error::parse("missing header row"));
    }
    if let Some(pos) = names.iter().position(String::is_empty) {
        return Err(Error::parse(format!("header column {} is empty", pos + 1)));
    }
    Ok(names)
}

/// Index of the single column called `name`.
fn column(headers: &[String], name: &str) -> Result<usize> {
    let mut found = headers.iter().enumerate().filter(|(_, h)| h.as_str() == name);
    match (found.next(), found.next()) {
        (Some((idx, _)), None) => Ok(idx),
        (None, _) => Err(Error::parse(format!("missing '{name}' column"))),
        (Some(_), Some(_)) => Err(Error::parse(format!("duplicate '{name}' column"))),
    }
}

/// Parse one numeric cell. `line` is the 1-based line number in the file.
fn parse_cell(field: &str, line: usize, column: &str) -> Result<f64> {
    field.parse::<f64>().map_err(|_| {
        Error::parse(format!(
            "line {line}, column '{column}': '{field}' is not a number"
        ))
    })
}

/// Read a wide table: one `X` column plus one column per series.
pub fn read_dataset<R: Read>(input: R) -> Result<Dataset> {
    let mut reader = csv_reader(input);
    let headers = headers(&mut reader)?;
    let x_idx = column(&headers, X_COLUMN)?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let line = row_no + 2;
        for (col, field) in record.iter().enumerate() {
            columns[col].push(parse_cell(field, line, &headers[col])?);
        }
    }

    let x = std::mem::take(&mut columns[x_idx]);
    let series: Vec<(String, Vec<f64>)> = headers
        .into_iter()
        .zip(columns)
        .enumerate()
        .filter(|(idx, _)| *idx != x_idx)
        .map(|(_, named)| named)
        .collect();

    let dataset = Dataset::new(x, series)?;
    debug!(
        series = dataset.series_count(),
        points = dataset.point_count(),
        "parsed dataset"
    );
    Ok(dataset)
}

/// Read an `X`,`Y` table into observations, in file order.
///
/// Columns other than `X` and `Y` are ignored.
pub fn read_observations<R: Read>(input: R) -> Result<Vec<Observation>> {
    let mut reader = csv_reader(input);
    let headers = headers(&mut reader)?;
    let x_idx = column(&headers, X_COLUMN)?;
    let y_idx = column(&headers, Y_COLUMN)?;

    let mut observations = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let line = row_no + 2;
        let x = parse_cell(record.get(x_idx).unwrap_or(""), line, X_COLUMN)?;
        let y = parse_cell(record.get(y_idx).unwrap_or(""), line, Y_COLUMN)?;
        observations.push(Observation::new(x, y));
    }

    debug!(observations = observations.len(), "parsed observations");
    Ok(observations)
}

/// Load a dataset from a CSV file.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let dataset = read_dataset(File::open(path)?)?;
    info!(
        path = %path.display(),
        series = dataset.series_count(),
        points = dataset.point_count(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Load observations from a CSV file.
pub fn load_observations(path: impl AsRef<Path>) -> Result<Vec<Observation>> {
    let path = path.as_ref();
    let observations = read_observations(File::open(path)?)?;
    info!(
        path = %path.display(),
        observations = observations.len(),
        "loaded observations"
    );
    Ok(observations)
}
