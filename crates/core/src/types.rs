//! Core data types for the idealfit system.

use std::collections::btree_map::{self, BTreeMap};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Exact-match key for an x-value. `-0.0` and `0.0` compare equal.
type XKey = OrderedFloat<f64>;

/// Reference ("training") dataset.
pub type ReferenceDataset = Dataset;

/// Candidate ("ideal") dataset.
pub type CandidateDataset = Dataset;

/// A set of named series sampled over one shared x-domain.
///
/// Shape is checked once in [`Dataset::new`]: every series has one finite
/// y-value per x-value, and x-values are finite and unique. Series are
/// enumerated in lexical order of their name.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Vec<f64>,
    series: BTreeMap<String, Vec<f64>>,
    index: BTreeMap<XKey, usize>,
}

impl Dataset {
    /// Build a dataset from a shared x array and named y arrays.
    pub fn new<S, I>(x: Vec<f64>, series: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Vec<f64>)>,
    {
        let mut index = BTreeMap::new();
        for (pos, &value) in x.iter().enumerate() {
            if !value.is_finite() {
                return Err(Error::data(format!("x[{pos}] is not finite: {value}")));
            }
            if let Some(prev) = index.insert(OrderedFloat(value), pos) {
                return Err(Error::data(format!(
                    "duplicate x-value {value} at positions {prev} and {pos}"
                )));
            }
        }

        let mut map = BTreeMap::new();
        for (name, y) in series {
            let name = name.into();
            if name.is_empty() {
                return Err(Error::data("series name must not be empty"));
            }
            if y.len() != x.len() {
                return Err(Error::data(format!(
                    "series '{name}' has {} values but the x-domain has {}",
                    y.len(),
                    x.len()
                )));
            }
            if let Some(pos) = y.iter().position(|v| !v.is_finite()) {
                return Err(Error::data(format!(
                    "series '{name}' has a non-finite value at x = {}",
                    x[pos]
                )));
            }
            if map.contains_key(&name) {
                return Err(Error::data(format!("duplicate series name '{name}'")));
            }
            map.insert(name, y);
        }

        Ok(Self {
            x,
            series: map,
            index,
        })
    }

    /// Shared x-values in insertion order.
    pub fn x_values(&self) -> &[f64] {
        &self.x
    }

    /// Number of sample points per series.
    pub fn point_count(&self) -> usize {
        self.x.len()
    }

    /// Number of series.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Whether the dataset holds at least one series.
    pub fn has_series(&self) -> bool {
        !self.series.is_empty()
    }

    /// Series names in lexical order.
    pub fn series_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.series.keys().map(String::as_str)
    }

    /// y-values of a series, aligned to [`Dataset::x_values`].
    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(Vec::as_slice)
    }

    /// All series in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = SeriesView<'_>> + '_ {
        self.series.iter().map(move |(name, y)| SeriesView {
            name,
            x: &self.x,
            y,
        })
    }

    /// Position of an exact x-value.
    #[inline]
    pub fn position(&self, x: f64) -> Option<usize> {
        self.index.get(&OrderedFloat(x)).copied()
    }

    /// Value of a series at an exact x-value.
    pub fn value_at(&self, name: &str, x: f64) -> Option<f64> {
        let pos = self.position(x)?;
        self.series.get(name).map(|y| y[pos])
    }

    /// (x, position) pairs in ascending x order.
    pub fn ascending(&self) -> impl Iterator<Item = (f64, usize)> + '_ {
        self.index.iter().map(|(k, &pos)| (k.0, pos))
    }
}

/// Borrowed view of one series of a [`Dataset`].
#[derive(Debug, Clone, Copy)]
pub struct SeriesView<'a> {
    /// Series name.
    pub name: &'a str,
    /// Shared x-values.
    pub x: &'a [f64],
    /// y-values aligned to `x`.
    pub y: &'a [f64],
}

/// Best candidate selected for one reference series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    /// Selected candidate series name.
    pub candidate: String,
    /// Sum of squared deviation against the candidate.
    pub ssd: f64,
    /// Largest pointwise absolute deviation against the candidate.
    pub max_deviation: f64,
}

/// Reference-series name to [`FitResult`], enumerated in lexical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FitTable {
    entries: BTreeMap<String, FitResult>,
}

impl FitTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning any previous entry for the reference.
    pub fn insert(&mut self, reference: impl Into<String>, fit: FitResult) -> Option<FitResult> {
        self.entries.insert(reference.into(), fit)
    }

    /// Fit for a reference series.
    pub fn get(&self, reference: &str) -> Option<&FitResult> {
        self.entries.get(reference)
    }

    /// Number of reference series covered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in lexical order of the reference name.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FitResult> {
        self.entries.iter()
    }
}

impl FromIterator<(String, FitResult)> for FitTable {
    fn from_iter<I: IntoIterator<Item = (String, FitResult)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FitTable {
    type Item = (&'a String, &'a FitResult);
    type IntoIter = btree_map::Iter<'a, String, FitResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// An independent test point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
}

impl Observation {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Matched candidate for a classified observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Reference series whose fit produced the match.
    pub reference: String,
    /// Candidate series the observation is assigned to.
    pub candidate: String,
    /// |y - candidate(x)|.
    pub deviation: f64,
}

/// Classification outcome for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub x: f64,
    pub y: f64,
    /// `None` when no fitted candidate is within tolerance.
    pub assignment: Option<Assignment>,
}

impl ClassificationRecord {
    /// Record for an observation no candidate accepted.
    pub fn unassigned(observation: Observation) -> Self {
        Self {
            x: observation.x,
            y: observation.y,
            assignment: None,
        }
    }

    /// Whether a candidate was assigned.
    #[inline]
    pub fn is_assigned(&self) -> bool {
        self.assignment.is_some()
    }

    /// Assigned candidate name.
    pub fn candidate(&self) -> Option<&str> {
        self.assignment.as_ref().map(|a| a.candidate.as_str())
    }

    /// Deviation from the assigned candidate.
    pub fn deviation(&self) -> Option<f64> {
        self.assignment.as_ref().map(|a| a.deviation)
    }
}
