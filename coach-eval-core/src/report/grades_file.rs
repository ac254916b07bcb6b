//! Machine-readable companion to the markdown report
//!
//! Every check grade of both runs, without response text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classify::Classification;
use super::compare::Comparison;
use crate::artifact::GradedRunArtifact;
use crate::grader::CheckGrade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioGrades {
    pub id: String,
    pub category: String,
    pub passed: usize,
    pub total_checks: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub grades: Vec<CheckGrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunGrades {
    pub run_id: Uuid,
    pub label: String,
    pub model: String,
    pub judge_model: String,
    pub pass_rate: f64,
    pub scenarios: Vec<ScenarioGrades>,
}

impl RunGrades {
    fn from_artifact(artifact: &GradedRunArtifact) -> Self {
        Self {
            run_id: artifact.header.run_id,
            label: artifact.header.label.clone(),
            model: artifact.header.model.clone(),
            judge_model: artifact.judge_model.clone(),
            pass_rate: artifact.grading.pass_rate,
            scenarios: artifact
                .results
                .iter()
                .map(|r| ScenarioGrades {
                    id: r.id().to_string(),
                    category: r.record.category.clone(),
                    passed: r.passed,
                    total_checks: r.total_checks,
                    error: r.record.error.clone(),
                    grades: r.grades.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedScenario {
    pub id: String,
    pub classification: Classification,
    /// `None` when a generation error suppressed delta classification
    pub delta: Option<f64>,
}

/// Grades of both runs plus the shared-scenario classifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonGrades {
    pub generated_at: DateTime<Utc>,
    pub baseline: RunGrades,
    pub candidate: RunGrades,
    pub classifications: Vec<ClassifiedScenario>,
}

impl ComparisonGrades {
    pub fn new(
        baseline: &GradedRunArtifact,
        candidate: &GradedRunArtifact,
        comparison: &Comparison,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            generated_at,
            baseline: RunGrades::from_artifact(baseline),
            candidate: RunGrades::from_artifact(candidate),
            classifications: comparison
                .rows
                .iter()
                .map(|row| ClassifiedScenario {
                    id: row.id.clone(),
                    classification: row.classification,
                    delta: row.delta_classified().then_some(row.delta),
                })
                .collect(),
        }
    }
}
