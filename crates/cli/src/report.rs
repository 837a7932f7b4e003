//! Console and CSV renderings of fit tables and classification results.

use std::io::Write;

use idealfit_core::{AssignmentPolicy, ClassificationRecord, FitTable};
use idealfit_matching::ClassificationStats;
use idealfit_store::RunSummary;

/// Column headers of the result CSV.
pub const RESULT_HEADERS: [&str; 4] = ["X", "Y", "Delta Y", "No. of ideal func"];

/// One line per reference series: `Y1 -> Y42 (SSD: .., Max Dev: ..)`.
pub fn fit_table_text(fit_table: &FitTable) -> String {
    let mut out = String::from("=== Best Fitting Ideal Functions ===\n");
    for (reference, fit) in fit_table {
        out.push_str(&format!(
            "{reference} -> {} (SSD: {:.6}, Max Dev: {:.6})\n",
            fit.candidate, fit.ssd, fit.max_deviation
        ));
    }
    out
}

/// Mapped/unmapped totals followed by per-candidate counts.
pub fn summary_text(stats: &ClassificationStats) -> String {
    let mut out = format!(
        "=== Test Data Mapping ===\nTotal test points: {}\nMapped points: {} ({:.1}%)\nUnmapped points: {} ({:.1}%)\n",
        stats.total,
        stats.assigned,
        stats.assigned_frac() * 100.0,
        stats.unassigned,
        stats.unassigned_frac() * 100.0
    );
    for (candidate, count) in &stats.by_candidate {
        out.push_str(&format!("  {candidate}: {count}\n"));
    }
    out
}

/// Candidates by assignment count, most frequent first.
pub fn distribution_text(stats: &ClassificationStats) -> String {
    let mut counts: Vec<(&String, &u64)> = stats.by_candidate.iter().collect();
    // Stable sort keeps lexical order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(a.1));

    let mut out = String::from("=== Mapping Distribution by Ideal Function ===\n");
    for (candidate, count) in counts {
        out.push_str(&format!("{candidate}: {count}\n"));
    }
    out
}

fn policy_label(policy: AssignmentPolicy) -> &'static str {
    match policy {
        AssignmentPolicy::SmallestDeviation => "smallest deviation",
        AssignmentPolicy::FirstEligible => "first eligible",
    }
}

/// Header block of a stored run.
pub fn run_text(run: &RunSummary) -> String {
    format!(
        "=== Run {} ===\nSaved at: {}\nTolerance: {} x max deviation, {}\n",
        run.id,
        run.created_at.to_rfc3339(),
        run.tolerance.multiplier,
        policy_label(run.tolerance.policy)
    )
}

/// One line per stored run, oldest first.
pub fn runs_text(runs: &[RunSummary]) -> String {
    let mut out = String::from("=== Stored Runs ===\n");
    for run in runs {
        out.push_str(&format!(
            "{:>4}  {}  {}/{} mapped\n",
            run.id,
            run.created_at.to_rfc3339(),
            run.assigned,
            run.total
        ));
    }
    out
}

/// Write the result table. Unassigned rows leave the last two cells empty.
pub fn write_results_csv<W: Write>(writer: W, records: &[ClassificationRecord]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(RESULT_HEADERS)?;
    for record in records {
        csv.write_record([
            record.x.to_string(),
            record.y.to_string(),
            record.deviation().map(|d| d.to_string()).unwrap_or_default(),
            record.candidate().unwrap_or_default().to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}
