//! Test-point classification against selected candidates.
//!
//! An observation is eligible for a fit-table entry when its deviation from
//! the entry's candidate at the same x is within that entry's threshold
//! (maximum fitting deviation times the tolerance multiplier). Candidate
//! values are looked up by exact x; no interpolation is performed.

use std::collections::BTreeMap;

use idealfit_core::{
    Assignment, AssignmentPolicy, ClassificationRecord, Dataset, Error, FitTable, Observation,
    Result, ToleranceConfig,
};
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use tracing::{info, trace};

use crate::parallel::iter_maybe_parallel;

/// Statistics about a classification run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationStats {
    /// Observations classified.
    pub total: u64,
    /// Observations assigned to a candidate.
    pub assigned: u64,
    /// Observations no candidate accepted.
    pub unassigned: u64,
    /// Assignment count by candidate name.
    pub by_candidate: BTreeMap<String, u64>,
}

impl ClassificationStats {
    /// Summarise a result sequence.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ClassificationRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.record(record);
        }
        stats
    }

    /// Account for one record.
    pub fn record(&mut self, record: &ClassificationRecord) {
        self.total += 1;
        match record.candidate() {
            Some(candidate) => {
                self.assigned += 1;
                *self.by_candidate.entry(candidate.to_string()).or_insert(0) += 1;
            }
            None => self.unassigned += 1,
        }
    }

    /// Fraction of observations that were assigned.
    pub fn assigned_frac(&self) -> f64 {
        if self.total > 0 {
            self.assigned as f64 / self.total as f64
        } else {
            0.0
        }
    }

    /// Fraction of observations left unassigned.
    pub fn unassigned_frac(&self) -> f64 {
        if self.total > 0 {
            self.unassigned as f64 / self.total as f64
        } else {
            0.0
        }
    }
}

/// Fit-table entry resolved against the candidate dataset.
#[derive(Debug, Clone, Copy)]
struct ResolvedFit<'a> {
    reference: &'a str,
    candidate: &'a str,
    values: &'a [f64],
    threshold: f64,
}

/// A fit table checked against its candidate dataset, ready to classify.
#[derive(Debug, Clone)]
pub struct FitIndex<'a> {
    entries: Vec<ResolvedFit<'a>>,
    candidates: &'a Dataset,
    policy: AssignmentPolicy,
}

impl<'a> FitIndex<'a> {
    /// Classify a single observation.
    pub fn classify_one(&self, observation: Observation) -> ClassificationRecord {
        let Some(pos) = self.candidates.position(observation.x) else {
            trace!(x = observation.x, "no candidate sample at x");
            return ClassificationRecord::unassigned(observation);
        };

        let mut best: Option<(&ResolvedFit<'a>, f64)> = None;
        for fit in &self.entries {
            let deviation = (observation.y - fit.values[pos]).abs();
            // NaN deviations compare false and stay ineligible.
            let eligible = deviation <= fit.threshold;
            if !eligible {
                continue;
            }
            match self.policy {
                AssignmentPolicy::FirstEligible => {
                    best = Some((fit, deviation));
                    break;
                }
                AssignmentPolicy::SmallestDeviation => {
                    if best.map_or(true, |(_, current)| deviation < current) {
                        best = Some((fit, deviation));
                    }
                }
            }
        }

        ClassificationRecord {
            x: observation.x,
            y: observation.y,
            assignment: best.map(|(fit, deviation)| Assignment {
                reference: fit.reference.to_string(),
                candidate: fit.candidate.to_string(),
                deviation,
            }),
        }
    }
}

/// Assigns observations to the candidates selected for each reference series.
#[derive(Debug, Clone, Default)]
pub struct ObservationClassifier {
    tolerance: ToleranceConfig,
}

impl ObservationClassifier {
    /// Create a classifier with the given tolerance policy.
    pub fn new(tolerance: ToleranceConfig) -> Self {
        Self { tolerance }
    }

    /// Resolve every fit-table entry against `candidates`.
    ///
    /// Fails with [`Error::CandidateLookup`] on the first entry whose candidate
    /// is missing, and with [`Error::Config`] for an invalid tolerance.
    pub fn prepare<'a>(&self, fit_table: &'a FitTable, candidates: &'a Dataset) -> Result<FitIndex<'a>> {
        self.tolerance.validate()?;

        let entries = fit_table
            .iter()
            .map(|(reference, fit)| -> Result<ResolvedFit<'a>> {
                let values = candidates
                    .series(&fit.candidate)
                    .ok_or_else(|| Error::candidate_lookup(reference.as_str(), fit.candidate.as_str()))?;
                Ok(ResolvedFit {
                    reference,
                    candidate: &fit.candidate,
                    values,
                    threshold: self.tolerance.threshold(fit.max_deviation),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FitIndex {
            entries,
            candidates,
            policy: self.tolerance.policy,
        })
    }

    /// Classify a finite sequence of observations, preserving order.
    pub fn classify(
        &self,
        observations: &[Observation],
        fit_table: &FitTable,
        candidates: &Dataset,
    ) -> Result<Vec<ClassificationRecord>> {
        let index = self.prepare(fit_table, candidates)?;

        let records: Vec<ClassificationRecord> = iter_maybe_parallel!(observations)
            .map(|observation| index.classify_one(*observation))
            .collect();

        let stats = ClassificationStats::from_records(&records);
        info!(
            total = stats.total,
            assigned = stats.assigned,
            unassigned = stats.unassigned,
            "classified observations"
        );

        Ok(records)
    }

    /// Classify a lazily produced observation stream.
    pub fn classify_iter<'a, I>(
        &self,
        observations: I,
        fit_table: &'a FitTable,
        candidates: &'a Dataset,
    ) -> Result<impl Iterator<Item = ClassificationRecord> + 'a>
    where
        I: IntoIterator<Item = Observation>,
        I::IntoIter: 'a,
    {
        let index = self.prepare(fit_table, candidates)?;
        Ok(observations
            .into_iter()
            .map(move |observation| index.classify_one(observation)))
    }
}

/// Classify with the default tolerance policy.
pub fn classify(
    observations: &[Observation],
    fit_table: &FitTable,
    candidates: &Dataset,
) -> Result<Vec<ClassificationRecord>> {
    ObservationClassifier::default().classify(observations, fit_table, candidates)
}
