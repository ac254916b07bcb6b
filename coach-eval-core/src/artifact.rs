//! Run artifacts: the files passed between collection, grading and comparison
//!
//! Artifacts are self-describing JSON documents, written once and never
//! modified. A scenario id may appear at most once per artifact; this is
//! checked both when writing and when loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::collector::{RetrievalConfig, SamplingConfig};
use crate::error::{EvalError, Result};
use crate::grader::{CheckGrade, Verdict};

/// Retrieval settings as used for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRecord {
    pub embedding_model: String,
    pub knowledge_store: String,
    #[serde(flatten)]
    pub config: RetrievalConfig,
}

/// Metadata shared by raw and graded artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHeader {
    pub run_id: Uuid,
    pub label: String,
    pub model: String,
    pub system_prompt: String,
    /// `None` when retrieval was disabled for the run
    pub retrieval: Option<RetrievalRecord>,
    pub sampling: SamplingConfig,
    #[serde(with = "humantime_serde")]
    pub pacing: Duration,
    pub library_version: String,
    pub library_fingerprint: String,
    pub timestamp: DateTime<Utc>,
    pub total_scenarios: usize,
}

impl RunHeader {
    pub fn uses_retrieval(&self) -> bool {
        self.retrieval.is_some()
    }

    /// File stem like `run-finetune-rag-20250601T120000Z-1a2b3c4d`
    pub fn file_stem(&self, kind: &str) -> String {
        let short_id: String = self.run_id.simple().to_string().chars().take(8).collect();
        format!(
            "{}-{}-{}-{}",
            kind,
            sanitize(&self.label),
            self.timestamp.format("%Y%m%dT%H%M%SZ"),
            short_id
        )
    }
}

pub(crate) fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Outcome of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub category: String,
    /// User prompt as delivered (after any truncation)
    pub prompt: String,
    pub checks: Vec<String>,
    pub response: String,
    pub tokens_in: usize,
    pub tokens_out: usize,
    pub latency_seconds: f64,
    /// Empty on success
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub is_new_scenario: bool,
    /// Present (possibly empty) only for retrieval-enabled runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_chunks: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prompt_truncated: bool,
}

impl ResponseRecord {
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Collection statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenarios: usize,
    pub errors: usize,
    pub retrieval_failures: usize,
    pub tokens_in: usize,
    pub tokens_out: usize,
    pub mean_latency_seconds: f64,
    pub estimated_cost_usd: f64,
}

impl RunSummary {
    /// Totals over the records; cost is supplied by the caller's rate card
    pub fn from_records(records: &[ResponseRecord], estimated_cost_usd: f64) -> Self {
        let scenarios = records.len();
        let total_latency: f64 = records.iter().map(|r| r.latency_seconds).sum();
        Self {
            scenarios,
            errors: records.iter().filter(|r| r.has_error()).count(),
            retrieval_failures: records
                .iter()
                .filter(|r| r.retrieval_error.is_some())
                .count(),
            tokens_in: records.iter().map(|r| r.tokens_in).sum(),
            tokens_out: records.iter().map(|r| r.tokens_out).sum(),
            mean_latency_seconds: if scenarios == 0 {
                0.0
            } else {
                total_latency / scenarios as f64
            },
            estimated_cost_usd,
        }
    }
}

/// Output of the collection phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    #[serde(flatten)]
    pub header: RunHeader,
    pub results: Vec<ResponseRecord>,
    pub summary: RunSummary,
}

impl RunArtifact {
    pub fn validate(&self) -> Result<()> {
        ensure_unique_ids(self.results.iter().map(|r| r.id.as_str()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        write_json(path.as_ref(), self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let artifact: Self = read_json(path.as_ref())?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn default_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref()
            .join(format!("{}.json", self.header.file_stem("run")))
    }

    pub fn get(&self, id: &str) -> Option<&ResponseRecord> {
        self.results.iter().find(|r| r.id == id)
    }
}

/// A response paired with its grades
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedResult {
    #[serde(flatten)]
    pub record: ResponseRecord,
    pub grades: Vec<CheckGrade>,
    pub passed: usize,
    pub total_checks: usize,
    /// Zero-check scenario: collected but not graded
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ungraded: bool,
}

impl GradedResult {
    pub fn new(record: ResponseRecord, grades: Vec<CheckGrade>) -> Self {
        let passed = grades.iter().filter(|g| g.result == Verdict::Pass).count();
        let total_checks = grades.len();
        let ungraded = record.checks.is_empty();
        Self {
            record,
            grades,
            passed,
            total_checks,
            ungraded,
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Percentage of checks passed; `None` for ungraded scenarios
    pub fn pass_pct(&self) -> Option<f64> {
        if self.total_checks == 0 {
            None
        } else {
            Some(100.0 * self.passed as f64 / self.total_checks as f64)
        }
    }
}

/// Grading statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingSummary {
    pub graded_scenarios: usize,
    pub ungraded_scenarios: usize,
    pub passed_checks: usize,
    pub total_checks: usize,
    /// Percent of checks passed across graded scenarios
    pub pass_rate: f64,
    pub judge_tokens_in: usize,
    pub judge_tokens_out: usize,
    pub judge_cost_usd: f64,
    /// Scenarios that fell back to all-FAIL after judge failures
    pub grader_errors: usize,
}

/// Output of the grading phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradedRunArtifact {
    #[serde(flatten)]
    pub header: RunHeader,
    pub graded_at: DateTime<Utc>,
    pub judge_model: String,
    pub results: Vec<GradedResult>,
    pub summary: RunSummary,
    pub grading: GradingSummary,
}

impl GradedRunArtifact {
    pub fn validate(&self) -> Result<()> {
        ensure_unique_ids(self.results.iter().map(|r| r.id()))?;
        for result in &self.results {
            if result.grades.len() != result.record.checks.len() {
                return Err(EvalError::Invariant(format!(
                    "scenario '{}' has {} grades for {} checks",
                    result.id(),
                    result.grades.len(),
                    result.record.checks.len()
                )));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        write_json(path.as_ref(), self)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let artifact: Self = read_json(path.as_ref())?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn default_path(&self, dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref()
            .join(format!("{}.json", self.header.file_stem("graded")))
    }

    pub fn get(&self, id: &str) -> Option<&GradedResult> {
        self.results.iter().find(|r| r.id() == id)
    }
}

fn ensure_unique_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(EvalError::Invariant(format!(
                "scenario id '{}' appears more than once",
                id
            )));
        }
    }
    Ok(())
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    tracing::debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
