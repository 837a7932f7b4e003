//! Pointwise deviation between two series over a shared x-domain.

use idealfit_core::{Dataset, Error, Result};

/// Squared and absolute deviation between two aligned series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    /// Sum of squared deviation.
    pub ssd: f64,
    /// Largest absolute pointwise deviation.
    pub max_abs: f64,
}

/// Position pairs matching equal x-values of a reference and a candidate dataset.
///
/// Pairs are held in ascending x order so every accumulation over them runs in
/// the same order regardless of how either dataset was laid out.
#[derive(Debug, Clone)]
pub struct Alignment {
    pairs: Vec<(usize, usize)>,
}

impl Alignment {
    /// Align two datasets by x-value.
    ///
    /// Both x-domains must be non-empty and hold exactly the same values.
    pub fn between(reference: &Dataset, candidates: &Dataset) -> Result<Self> {
        if reference.point_count() == 0 {
            return Err(Error::domain_mismatch("reference x-domain is empty"));
        }
        if candidates.point_count() == 0 {
            return Err(Error::domain_mismatch("candidate x-domain is empty"));
        }

        let mut pairs = Vec::with_capacity(reference.point_count());
        for (x, ref_pos) in reference.ascending() {
            match candidates.position(x) {
                Some(cand_pos) => pairs.push((ref_pos, cand_pos)),
                None => {
                    return Err(Error::domain_mismatch(format!(
                        "x = {x} is sampled by the reference dataset but not by the candidate dataset"
                    )))
                }
            }
        }

        // Every reference x is a candidate x; equal counts make the sets equal.
        if candidates.point_count() != pairs.len() {
            let extra = candidates
                .ascending()
                .map(|(x, _)| x)
                .find(|&x| reference.position(x).is_none())
                .unwrap_or(f64::NAN);
            return Err(Error::domain_mismatch(format!(
                "x = {extra} is sampled by the candidate dataset but not by the reference dataset"
            )));
        }

        Ok(Self { pairs })
    }

    /// Number of shared sample points.
    pub fn point_count(&self) -> usize {
        self.pairs.len()
    }

    /// Deviation of `candidate` from `reference`, both laid out like the
    /// datasets this alignment was built from.
    pub fn deviation(&self, reference: &[f64], candidate: &[f64]) -> Deviation {
        let mut ssd = 0.0;
        let mut max_abs = 0.0_f64;
        for &(r, c) in &self.pairs {
            let diff = reference[r] - candidate[c];
            ssd += diff * diff;
            max_abs = max_abs.max(diff.abs());
        }
        Deviation { ssd, max_abs }
    }
}
