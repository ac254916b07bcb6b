//! Comparison reporting
//!
//! Joins a baseline and a candidate [`GradedRunArtifact`] by scenario id and
//! emits a self-contained markdown report plus a grades file. Works directly
//! from artifacts on disk; nothing is re-collected or re-graded.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::artifact::{GradedRunArtifact, sanitize, write_json};
use crate::error::Result;

pub mod classify;
pub mod compare;
pub mod grades_file;
pub mod markdown;

pub use classify::{Classification, classify};
pub use compare::{Comparison, Tally};
pub use grades_file::ComparisonGrades;

/// Rendered comparison outputs
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub comparison: Comparison,
    pub markdown: String,
    pub grades: ComparisonGrades,
    pub generated_at: DateTime<Utc>,
}

impl ComparisonReport {
    /// `comparison-<baseline>-vs-<candidate>-<timestamp>`
    pub fn file_stem(&self) -> String {
        format!(
            "comparison-{}-vs-{}-{}",
            sanitize(&self.comparison.baseline.label),
            sanitize(&self.comparison.candidate.label),
            self.generated_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    /// Write the markdown report and the grades file into `out_dir`.
    ///
    /// Returns the two paths, markdown first.
    pub fn write(&self, out_dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)?;

        let stem = self.file_stem();
        let report_path = out_dir.join(format!("{}.md", stem));
        let grades_path = out_dir.join(format!("{}-grades.json", stem));

        std::fs::write(&report_path, &self.markdown)?;
        write_json(&grades_path, &self.grades)?;

        tracing::info!(
            report = %report_path.display(),
            grades = %grades_path.display(),
            "wrote comparison"
        );
        Ok((report_path, grades_path))
    }
}

/// Compare two graded runs, stamped with the current time.
pub fn compare(
    baseline: &GradedRunArtifact,
    candidate: &GradedRunArtifact,
) -> Result<ComparisonReport> {
    compare_at(baseline, candidate, Utc::now())
}

/// Compare two graded runs with an explicit generation timestamp.
///
/// # Errors
///
/// Invariant errors when either artifact has duplicate ids or grade lists
/// that do not match their checks.
pub fn compare_at(
    baseline: &GradedRunArtifact,
    candidate: &GradedRunArtifact,
    generated_at: DateTime<Utc>,
) -> Result<ComparisonReport> {
    baseline.validate()?;
    candidate.validate()?;

    let comparison = Comparison::build(baseline, candidate);
    tracing::debug!(
        shared = comparison.rows.len(),
        new = comparison.new_ids.len(),
        dropped = comparison.dropped_ids.len(),
        "joined runs"
    );

    let markdown = markdown::render(&comparison, generated_at);
    let grades = ComparisonGrades::new(baseline, candidate, &comparison, generated_at);

    Ok(ComparisonReport {
        comparison,
        markdown,
        grades,
        generated_at,
    })
}

#[cfg(test)]
mod tests;
