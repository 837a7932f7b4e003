//! Least-squares selection of one candidate series per reference series.
//!
//! For every reference series the candidate with the smallest sum of squared
//! deviation over the shared x-domain is selected, and that candidate's
//! largest absolute pointwise deviation is recorded alongside it.

use idealfit_core::{Dataset, Error, FitResult, FitTable, Result, SeriesView};
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use tracing::{debug, info, trace};

use crate::deviation::{Alignment, Deviation};
use crate::parallel::iter_maybe_parallel;

/// Selects the best-fitting candidate for each reference series.
///
/// Candidates are scanned in lexical name order and replaced only by a
/// strictly smaller SSD, so exact ties go to the lexically first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesMatcher;

impl SeriesMatcher {
    /// Create a new matcher.
    pub fn new() -> Self {
        Self
    }

    /// Build the fit table for `reference` against `candidates`.
    ///
    /// Fails with [`Error::EmptyDataset`] when either dataset has no series
    /// and with [`Error::DomainMismatch`] when the two x-domains differ.
    pub fn select_best_candidates(&self, reference: &Dataset, candidates: &Dataset) -> Result<FitTable> {
        if !reference.has_series() {
            return Err(Error::empty_dataset("reference dataset has no series"));
        }
        if !candidates.has_series() {
            return Err(Error::empty_dataset("candidate dataset has no series"));
        }

        let alignment = Alignment::between(reference, candidates)?;
        let series: Vec<SeriesView<'_>> = reference.iter().collect();

        let fits: Vec<(String, FitResult)> = iter_maybe_parallel!(series)
            .map(|r| self.best_for(r, candidates, &alignment).map(|fit| (r.name.to_string(), fit)))
            .collect::<Result<_>>()?;

        let table: FitTable = fits.into_iter().collect();

        info!(
            references = table.len(),
            candidates = candidates.series_count(),
            points = alignment.point_count(),
            "selected best-fit candidates"
        );

        Ok(table)
    }

    /// Best candidate for a single reference series.
    fn best_for(&self, reference: SeriesView<'_>, candidates: &Dataset, alignment: &Alignment) -> Result<FitResult> {
        let mut best: Option<(&str, Deviation)> = None;

        for candidate in candidates.iter() {
            let dev = alignment.deviation(reference.y, candidate.y);
            trace!(
                reference = reference.name,
                candidate = candidate.name,
                ssd = dev.ssd,
                "scored candidate"
            );

            let replace = match best {
                None => true,
                Some((_, current)) => dev.ssd < current.ssd,
            };
            if replace {
                best = Some((candidate.name, dev));
            }
        }

        let (name, dev) = best.ok_or_else(|| Error::empty_dataset("candidate dataset has no series"))?;

        debug!(
            reference = reference.name,
            candidate = name,
            ssd = dev.ssd,
            max_deviation = dev.max_abs,
            "best fit"
        );

        Ok(FitResult {
            candidate: name.to_string(),
            ssd: dev.ssd,
            max_deviation: dev.max_abs,
        })
    }
}

/// Build the fit table with a default [`SeriesMatcher`].
pub fn select_best_candidates(reference: &Dataset, candidates: &Dataset) -> Result<FitTable> {
    SeriesMatcher::new().select_best_candidates(reference, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dataset(x: &[f64], series: &[(&str, &[f64])]) -> Dataset {
        Dataset::new(
            x.to_vec(),
            series.iter().map(|(name, y)| (name.to_string(), y.to_vec())),
        )
        .unwrap()
    }

    #[test]
    fn test_identical_candidate_selected() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let reference = dataset(&x, &[("Y1", &[1.0, 2.0, 3.0, 4.0])]);
        let candidates = dataset(&x, &[("A", &[1.0, 2.0, 3.0, 4.0]), ("B", &[10.0, 20.0, 30.0, 40.0])]);

        let table = select_best_candidates(&reference, &candidates).unwrap();

        assert_eq!(table.len(), 1);
        let fit = table.get("Y1").unwrap();
        assert_eq!(fit.candidate, "A");
        assert_eq!(fit.ssd, 0.0);
        assert_eq!(fit.max_deviation, 0.0);
    }

    #[test]
    fn test_ssd_and_max_deviation_of_selected_candidate() {
        let x = [0.0, 1.0, 2.0];
        let reference = dataset(&x, &[("R", &[0.0, 0.0, 0.0])]);
        // A: ssd 3.0, max 1.0. B: ssd 4.0, max 2.0. C: ssd 2.25, max 1.5.
        let candidates = dataset(
            &x,
            &[
                ("A", &[1.0, -1.0, 1.0]),
                ("B", &[0.0, 2.0, 0.0]),
                ("C", &[0.0, 0.0, -1.5]),
            ],
        );

        let table = select_best_candidates(&reference, &candidates).unwrap();
        let fit = table.get("R").unwrap();

        assert_eq!(fit.candidate, "C");
        assert_relative_eq!(fit.ssd, 2.25);
        assert_relative_eq!(fit.max_deviation, 1.5);
    }

    #[test]
    fn test_tie_goes_to_lexically_first_candidate() {
        let x = [0.0, 1.0];
        let reference = dataset(&x, &[("R", &[0.0, 0.0])]);
        // Both candidates have ssd 1.0; insertion order puts "Z" first.
        let candidates = dataset(&x, &[("Z", &[1.0, 0.0]), ("M", &[0.0, -1.0])]);

        let first = select_best_candidates(&reference, &candidates).unwrap();
        assert_eq!(first.get("R").unwrap().candidate, "M");

        for _ in 0..10 {
            let again = select_best_candidates(&reference, &candidates).unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_every_reference_covered() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let reference_series: Vec<(String, Vec<f64>)> = (1..=4)
            .map(|k| (format!("Y{k}"), x.iter().map(|v| v * k as f64 + 0.1).collect()))
            .collect();
        let candidate_series: Vec<(String, Vec<f64>)> = (1..=12)
            .map(|k| (format!("Y{k}"), x.iter().map(|v| v * k as f64).collect()))
            .collect();
        let reference = Dataset::new(x.clone(), reference_series).unwrap();
        let candidates = Dataset::new(x, candidate_series).unwrap();

        let table = select_best_candidates(&reference, &candidates).unwrap();

        assert_eq!(table.len(), reference.series_count());
        for k in 1..=4 {
            let name = format!("Y{k}");
            let fit = table.get(&name).unwrap();
            assert_eq!(fit.candidate, name);
            assert_relative_eq!(fit.max_deviation, 0.1, epsilon = 1e-12);
            assert_relative_eq!(fit.ssd, 20.0 * 0.01, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_overflowing_ssd_still_selects() {
        let x = [0.0];
        let reference = dataset(&x, &[("R", &[1e200])]);
        let candidates = dataset(&x, &[("B", &[-1e200]), ("A", &[-1e200])]);

        let table = select_best_candidates(&reference, &candidates).unwrap();
        let fit = table.get("R").unwrap();

        assert_eq!(fit.candidate, "A");
        assert!(fit.ssd.is_infinite());
    }

    #[test]
    fn test_empty_reference_dataset() {
        let reference = Dataset::new(vec![1.0], Vec::<(String, Vec<f64>)>::new()).unwrap();
        let candidates = dataset(&[1.0], &[("A", &[1.0])]);
        let err = select_best_candidates(&reference, &candidates).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
    }

    #[test]
    fn test_empty_candidate_dataset() {
        let reference = dataset(&[1.0], &[("R", &[1.0])]);
        let candidates = Dataset::new(vec![1.0], Vec::<(String, Vec<f64>)>::new()).unwrap();
        let err = select_best_candidates(&reference, &candidates).unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
    }

    #[test]
    fn test_domain_mismatch() {
        let reference = dataset(&[1.0, 2.0], &[("R", &[1.0, 2.0])]);
        let candidates = dataset(&[1.0, 3.0], &[("A", &[1.0, 2.0])]);
        let err = select_best_candidates(&reference, &candidates).unwrap_err();
        assert!(matches!(err, Error::DomainMismatch(_)));
    }

    #[test]
    fn test_inputs_unchanged() {
        let x = [1.0, 2.0];
        let reference = dataset(&x, &[("R", &[1.0, 2.0])]);
        let candidates = dataset(&x, &[("A", &[1.5, 2.5])]);
        let (reference_before, candidates_before) = (reference.clone(), candidates.clone());

        let _ = select_best_candidates(&reference, &candidates).unwrap();

        assert_eq!(reference, reference_before);
        assert_eq!(candidates, candidates_before);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_table_matches_sequential_scan() {
        let x: Vec<f64> = (0..8).map(f64::from).collect();
        // Candidates C{2k} and C{2k+1} sit at +k and -k from x, so every
        // reference offset ties between several candidates.
        let candidate_series: Vec<(String, Vec<f64>)> = (0..40)
            .map(|k: i32| {
                let offset = f64::from(k / 2) * if k % 2 == 0 { 1.0 } else { -1.0 };
                (format!("C{k:02}"), x.iter().map(|v| v + offset).collect())
            })
            .collect();
        let reference_series: Vec<(String, Vec<f64>)> = (0..64)
            .map(|r: i32| {
                let offset = f64::from(r % 16) * 0.5 - 4.0;
                (format!("R{r:02}"), x.iter().map(|v| v + offset).collect())
            })
            .collect();
        let reference = Dataset::new(x.clone(), reference_series).unwrap();
        let candidates = Dataset::new(x, candidate_series).unwrap();

        let parallel = select_best_candidates(&reference, &candidates).unwrap();

        let matcher = SeriesMatcher::new();
        let alignment = Alignment::between(&reference, &candidates).unwrap();
        let sequential: FitTable = reference
            .iter()
            .map(|r| (r.name.to_string(), matcher.best_for(r, &candidates, &alignment).unwrap()))
            .collect();

        assert_eq!(parallel, sequential);
        // Offset 0.5 is equally far from C00, C01 and C02.
        assert_eq!(parallel.get("R09").unwrap().candidate, "C00");
    }
}
