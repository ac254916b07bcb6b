//! Joining two graded runs by scenario id
//!
//! Everything the markdown report and the grades file show is computed here,
//! so both outputs agree on the same numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use super::classify::{self, Classification};
use crate::artifact::{GradedResult, GradedRunArtifact};
use crate::grader::{CheckGrade, Verdict};
use crate::scenarios::Category;

/// Passed checks over total checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub total: usize,
}

impl Tally {
    pub fn of<'a>(results: impl IntoIterator<Item = &'a GradedResult>) -> Self {
        let mut tally = Tally::default();
        for result in results {
            tally.add(result);
        }
        tally
    }

    fn add(&mut self, result: &GradedResult) {
        self.passed += result.passed;
        self.total += result.total_checks;
    }

    /// `None` when no checks were graded
    pub fn pct(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(100.0 * self.passed as f64 / self.total as f64)
        }
    }
}

fn delta(baseline: Tally, candidate: Tally) -> Option<f64> {
    Some(candidate.pct()? - baseline.pct()?)
}

/// Identity and overall numbers of one side of the comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSide {
    pub run_id: Uuid,
    pub label: String,
    pub model: String,
    pub judge_model: String,
    pub timestamp: DateTime<Utc>,
    pub library_version: String,
    pub library_fingerprint: String,
    pub uses_retrieval: bool,
    pub scenarios: usize,
    pub overall: Tally,
}

impl RunSide {
    fn from_artifact(artifact: &GradedRunArtifact) -> Self {
        Self {
            run_id: artifact.header.run_id,
            label: artifact.header.label.clone(),
            model: artifact.header.model.clone(),
            judge_model: artifact.judge_model.clone(),
            timestamp: artifact.header.timestamp,
            library_version: artifact.header.library_version.clone(),
            library_fingerprint: artifact.header.library_fingerprint.clone(),
            uses_retrieval: artifact.header.uses_retrieval(),
            scenarios: artifact.results.len(),
            overall: Tally::of(&artifact.results),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub category: String,
    pub baseline: Tally,
    pub candidate: Tally,
}

impl CategoryRow {
    pub fn delta(&self) -> Option<f64> {
        delta(self.baseline, self.candidate)
    }
}

/// One shared, graded scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub id: String,
    pub category: String,
    pub baseline: Tally,
    pub candidate: Tally,
    pub delta: f64,
    pub classification: Classification,
    /// Generation error on either side; the row is labelled from the
    /// candidate percentage only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioRow {
    pub fn baseline_pct(&self) -> f64 {
        self.baseline.pct().unwrap_or(0.0)
    }

    pub fn candidate_pct(&self) -> f64 {
        self.candidate.pct().unwrap_or(0.0)
    }

    pub fn delta_classified(&self) -> bool {
        self.error.is_none()
    }
}

/// A check that passed in the baseline and fails in the candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flip {
    pub check: String,
    pub baseline_reason: String,
    pub candidate_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub id: String,
    pub category: String,
    pub delta: f64,
    pub flips: Vec<Flip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub id: String,
    pub category: String,
    pub delta: f64,
    /// Chunks retrieved for the candidate response, when it used retrieval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCount {
    pub id: String,
    pub count: usize,
}

/// Retrieved-chunk frequencies per side; `None` for a side without retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalAnalysis {
    pub baseline: Option<Vec<ChunkCount>>,
    pub candidate: Option<Vec<ChunkCount>>,
    pub baseline_failures: usize,
    pub candidate_failures: usize,
}

/// Check-level verdicts of both runs for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckPair {
    pub check: String,
    pub baseline: Option<Verdict>,
    pub candidate: Verdict,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalScenario {
    pub id: String,
    pub classification: Classification,
    pub checks: Vec<CheckPair>,
}

/// Detail for a category where wrong answers are harmful
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalBlock {
    pub category: String,
    pub baseline: Tally,
    pub candidate: Tally,
    pub scenarios: Vec<CriticalScenario>,
}

/// The joined view of a baseline and a candidate run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub baseline: RunSide,
    pub candidate: RunSide,
    /// Shared and graded on both sides
    pub shared_baseline: Tally,
    pub shared_candidate: Tally,
    /// Candidate-only scenarios
    pub new_subset: Tally,
    pub categories: Vec<CategoryRow>,
    pub critical: Vec<CriticalBlock>,
    /// Candidate order
    pub rows: Vec<ScenarioRow>,
    pub regressions: Vec<Regression>,
    pub improvements: Vec<Improvement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalAnalysis>,
    pub new_ids: Vec<String>,
    pub dropped_ids: Vec<String>,
    /// Zero-check scenarios on either side
    pub ungraded_ids: Vec<String>,
}

impl Comparison {
    /// Join `candidate` against `baseline` on scenario id.
    pub fn build(baseline: &GradedRunArtifact, candidate: &GradedRunArtifact) -> Self {
        let base_by_id: HashMap<&str, &GradedResult> =
            baseline.results.iter().map(|r| (r.id(), r)).collect();
        let cand_ids: HashSet<&str> = candidate.results.iter().map(|r| r.id()).collect();

        let mut rows = Vec::new();
        let mut pairs = Vec::new();
        let mut new_ids = Vec::new();
        let mut ungraded_ids = Vec::new();
        let mut new_subset = Tally::default();

        for cand in &candidate.results {
            let Some(base) = base_by_id.get(cand.id()).copied() else {
                new_ids.push(cand.id().to_string());
                if cand.ungraded {
                    ungraded_ids.push(cand.id().to_string());
                } else {
                    new_subset.add(cand);
                }
                continue;
            };
            if cand.ungraded || base.ungraded {
                ungraded_ids.push(cand.id().to_string());
                continue;
            }
            rows.push(scenario_row(base, cand));
            pairs.push((base, cand));
        }

        let dropped_ids: Vec<String> = baseline
            .results
            .iter()
            .filter(|r| !cand_ids.contains(r.id()))
            .map(|r| r.id().to_string())
            .collect();
        for base in &baseline.results {
            if base.ungraded && !cand_ids.contains(base.id()) {
                ungraded_ids.push(base.id().to_string());
            }
        }

        let shared_baseline = Tally::of(pairs.iter().map(|(b, _)| *b));
        let shared_candidate = Tally::of(pairs.iter().map(|(_, c)| *c));
        let categories = category_rows(&pairs);

        let regressions = rows
            .iter()
            .zip(&pairs)
            .filter(|(row, _)| row.classification == Classification::Regression)
            .map(|(row, (base, cand))| Regression {
                id: row.id.clone(),
                category: row.category.clone(),
                delta: row.delta,
                flips: flips(base, cand),
            })
            .collect();

        let candidate_retrieves = candidate.header.uses_retrieval();
        let improvements = rows
            .iter()
            .zip(&pairs)
            .filter(|(row, _)| row.classification == Classification::Improved)
            .map(|(row, (_, cand))| Improvement {
                id: row.id.clone(),
                category: row.category.clone(),
                delta: row.delta,
                chunks: if candidate_retrieves {
                    Some(cand.record.retrieved_chunks.clone().unwrap_or_default())
                } else {
                    None
                },
            })
            .collect();

        let critical = critical_blocks(&categories, &rows, &pairs);

        let retrieval = (baseline.header.uses_retrieval() || candidate_retrieves).then(|| {
            RetrievalAnalysis {
                baseline: chunk_counts(baseline),
                candidate: chunk_counts(candidate),
                baseline_failures: retrieval_failures(baseline),
                candidate_failures: retrieval_failures(candidate),
            }
        });

        Self {
            baseline: RunSide::from_artifact(baseline),
            candidate: RunSide::from_artifact(candidate),
            shared_baseline,
            shared_candidate,
            new_subset,
            categories,
            critical,
            rows,
            regressions,
            improvements,
            retrieval,
            new_ids,
            dropped_ids,
            ungraded_ids,
        }
    }

    pub fn overall_delta(&self) -> Option<f64> {
        delta(self.baseline.overall, self.candidate.overall)
    }

    pub fn shared_delta(&self) -> Option<f64> {
        delta(self.shared_baseline, self.shared_candidate)
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.rows
            .iter()
            .filter(|r| r.classification == classification)
            .count()
    }

    pub fn row(&self, id: &str) -> Option<&ScenarioRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Whether the two runs were collected against different libraries
    pub fn library_changed(&self) -> bool {
        self.baseline.library_fingerprint != self.candidate.library_fingerprint
    }
}

fn scenario_row(base: &GradedResult, cand: &GradedResult) -> ScenarioRow {
    let baseline = Tally::of([base]);
    let candidate = Tally::of([cand]);
    let base_pct = baseline.pct().unwrap_or(0.0);
    let cand_pct = candidate.pct().unwrap_or(0.0);
    let delta = cand_pct - base_pct;

    let error = match (base.record.has_error(), cand.record.has_error()) {
        (_, true) => Some(format!("candidate generation error: {}", cand.record.error)),
        (true, false) => Some(format!("baseline generation error: {}", base.record.error)),
        (false, false) => None,
    };
    let classification = if error.is_some() {
        classify::absolute(cand_pct)
    } else {
        classify::classify(delta, cand_pct)
    };

    ScenarioRow {
        id: cand.id().to_string(),
        category: cand.record.category.clone(),
        baseline,
        candidate,
        delta,
        classification,
        error,
    }
}

/// Checks that were PASS in the baseline and are FAIL in the candidate,
/// in candidate check order.
fn flips(base: &GradedResult, cand: &GradedResult) -> Vec<Flip> {
    cand.grades
        .iter()
        .zip(paired_grades(base, cand))
        .filter_map(|(g, b)| match b {
            Some(b) if b.result == Verdict::Pass && g.result == Verdict::Fail => Some(Flip {
                check: g.check.clone(),
                baseline_reason: b.reason.clone(),
                candidate_reason: g.reason.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// The baseline grade matching each candidate grade. Identical check lists
/// pair by position; otherwise each candidate check takes the first unused
/// baseline grade with the same text.
fn paired_grades<'a>(base: &'a GradedResult, cand: &GradedResult) -> Vec<Option<&'a CheckGrade>> {
    let same_checks = base.grades.len() == cand.grades.len()
        && base
            .grades
            .iter()
            .zip(&cand.grades)
            .all(|(b, c)| b.check == c.check);
    if same_checks {
        return base.grades.iter().map(Some).collect();
    }

    let mut used = vec![false; base.grades.len()];
    cand.grades
        .iter()
        .map(|g| {
            let index = (0..base.grades.len()).find(|&i| !used[i] && base.grades[i].check == g.check)?;
            used[index] = true;
            Some(&base.grades[index])
        })
        .collect()
}

/// Known categories in their canonical order, then unknown names alphabetically
fn category_order(name: &str) -> (bool, Option<Category>, String) {
    let known = Category::from_name(name);
    (known.is_none(), known, name.to_string())
}

fn category_rows(pairs: &[(&GradedResult, &GradedResult)]) -> Vec<CategoryRow> {
    let mut by_name: BTreeMap<&str, (Tally, Tally)> = BTreeMap::new();
    for (base, cand) in pairs {
        let entry = by_name.entry(cand.record.category.as_str()).or_default();
        entry.0.add(base);
        entry.1.add(cand);
    }

    let mut rows: Vec<CategoryRow> = by_name
        .into_iter()
        .map(|(category, (baseline, candidate))| CategoryRow {
            category: category.to_string(),
            baseline,
            candidate,
        })
        .collect();
    rows.sort_by_key(|row| category_order(&row.category));
    rows
}

fn critical_blocks(
    categories: &[CategoryRow],
    rows: &[ScenarioRow],
    pairs: &[(&GradedResult, &GradedResult)],
) -> Vec<CriticalBlock> {
    categories
        .iter()
        .filter(|c| Category::from_name(&c.category).is_some_and(Category::is_critical))
        .map(|c| CriticalBlock {
            category: c.category.clone(),
            baseline: c.baseline,
            candidate: c.candidate,
            scenarios: rows
                .iter()
                .zip(pairs)
                .filter(|(row, _)| row.category == c.category)
                .map(|(row, (base, cand))| CriticalScenario {
                    id: row.id.clone(),
                    classification: row.classification,
                    checks: cand
                        .grades
                        .iter()
                        .zip(paired_grades(base, cand))
                        .map(|(g, b)| CheckPair {
                            check: g.check.clone(),
                            baseline: b.map(|b| b.result),
                            candidate: g.result,
                            reason: g.reason.clone(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

/// Frequency of every retrieved chunk id, most frequent first, ties by id
fn chunk_counts(artifact: &GradedRunArtifact) -> Option<Vec<ChunkCount>> {
    if !artifact.header.uses_retrieval() {
        return None;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for result in &artifact.results {
        for chunk in result.record.retrieved_chunks.iter().flatten() {
            *counts.entry(chunk.as_str()).or_default() += 1;
        }
    }
    let mut counts: Vec<ChunkCount> = counts
        .into_iter()
        .map(|(id, count)| ChunkCount {
            id: id.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id.cmp(&b.id)));
    Some(counts)
}

fn retrieval_failures(artifact: &GradedRunArtifact) -> usize {
    artifact
        .results
        .iter()
        .filter(|r| r.record.retrieval_error.is_some())
        .count()
}
