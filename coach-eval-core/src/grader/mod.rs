//! LLM-as-judge grading
//!
//! Each scenario gets exactly one judge call per attempt: the rubric, the user
//! prompt, the candidate response and the numbered checks. The judge must
//! answer with a JSON list of `{check, result, reason}`. Output is recovered
//! with bounded repair; after the configured number of attempts every check
//! falls back to FAIL. The resulting grade list always has exactly one entry
//! per check, in check order.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::artifact::{GradedResult, GradedRunArtifact, GradingSummary, ResponseRecord, RunArtifact};
use crate::config::JudgeConfig;
use crate::error::{EvalError, Result};
use crate::llm::{LLMProvider, LLMRequest, RetryConfig, TokenUsage, with_retry};
use crate::metrics::LLMCostCalculator;
use crate::parsing::{JsonParser, OutputParser};

pub mod rubric;

/// Reason recorded for checks the judge skipped
pub const NOT_EVALUATED: &str = "grader did not evaluate";

/// Per-check outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Case-insensitive `PASS` / `FAIL`
    pub fn parse(value: &str) -> Option<Verdict> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PASS" => Some(Verdict::Pass),
            "FAIL" => Some(Verdict::Fail),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

/// Grade for one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckGrade {
    pub check: String,
    pub result: Verdict,
    pub reason: String,
}

impl CheckGrade {
    pub fn pass(check: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            result: Verdict::Pass,
            reason: reason.into(),
        }
    }

    pub fn fail(check: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            result: Verdict::Fail,
            reason: reason.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.result == Verdict::Pass
    }
}

/// Grades for one scenario plus judge diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioGrade {
    pub scenario_id: String,
    pub grades: Vec<CheckGrade>,
    /// Judge tokens across all attempts
    pub usage: TokenUsage,
    /// Set when every attempt failed and the all-FAIL fallback applied
    pub judge_error: Option<String>,
}

impl ScenarioGrade {
    pub fn passed(&self) -> usize {
        self.grades.iter().filter(|g| g.passed()).count()
    }

    pub fn total(&self) -> usize {
        self.grades.len()
    }
}

/// Grader settings
#[derive(Debug, Clone)]
pub struct GraderConfig {
    /// Judge calls before the all-FAIL fallback (at least 2)
    pub max_attempts: usize,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub max_tokens: usize,
    /// Treat zero-check scenarios as an invariant violation
    pub strict: bool,
    pub concurrency: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
            max_tokens: 1024,
            strict: false,
            concurrency: 1,
        }
    }
}

impl GraderConfig {
    pub fn from_judge(judge: &JudgeConfig, timeout: Duration) -> Self {
        Self {
            max_attempts: judge.max_attempts,
            retry_delay: judge.retry_delay,
            timeout,
            max_tokens: judge.max_tokens,
            ..Self::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn retry(&self) -> RetryConfig {
        RetryConfig::fixed(self.max_attempts.max(2), self.retry_delay)
    }
}

/// Grades responses with a judge model
pub struct Grader {
    judge: Arc<dyn LLMProvider>,
    config: GraderConfig,
    parser: JsonParser,
    costs: LLMCostCalculator,
}

impl Grader {
    pub fn new(judge: Arc<dyn LLMProvider>, config: GraderConfig) -> Self {
        Self {
            judge,
            config,
            parser: JsonParser::list(),
            costs: LLMCostCalculator::new(),
        }
    }

    pub fn with_cost_calculator(mut self, costs: LLMCostCalculator) -> Self {
        self.costs = costs;
        self
    }

    /// Grade one response against its checks.
    ///
    /// # Errors
    ///
    /// Only in strict mode, for a scenario without checks. Judge failures
    /// never surface as errors; they produce the all-FAIL fallback.
    pub async fn grade(&self, record: &ResponseRecord) -> Result<ScenarioGrade> {
        let checks = &record.checks;

        if checks.is_empty() {
            if self.config.strict {
                return Err(EvalError::Invariant(format!(
                    "scenario '{}' has no checks and cannot be graded in strict mode",
                    record.id
                )));
            }
            return Ok(ScenarioGrade {
                scenario_id: record.id.clone(),
                grades: Vec::new(),
                usage: TokenUsage::default(),
                judge_error: None,
            });
        }

        if record.has_error() {
            let reason = format!("generation error: {}", record.error);
            return Ok(ScenarioGrade {
                scenario_id: record.id.clone(),
                grades: all_fail(checks, &reason),
                usage: TokenUsage::default(),
                judge_error: None,
            });
        }

        let request = LLMRequest::from_prompt(rubric::judge_prompt(
            &record.prompt,
            &record.response,
            checks,
        ));
        let request = LLMRequest {
            temperature: Some(0.0),
            max_tokens: Some(self.config.max_tokens),
            ..request
        };

        let usage = Mutex::new(TokenUsage::default());
        let outcome = with_retry(&self.config.retry(), || self.judge_once(&request, &usage)).await;
        let usage = usage.into_inner().unwrap_or_default();

        let (grades, judge_error) = match outcome {
            Ok(verdicts) => (reconcile(&record.id, checks, verdicts), None),
            Err(e) => {
                tracing::warn!(scenario = %record.id, error = %e, "judge failed, grading all checks FAIL");
                let reason = format!("grader error: {}", e);
                (all_fail(checks, &reason), Some(e.to_string()))
            }
        };

        Ok(ScenarioGrade {
            scenario_id: record.id.clone(),
            grades,
            usage,
            judge_error,
        })
    }

    async fn judge_once(
        &self,
        request: &LLMRequest,
        usage: &Mutex<TokenUsage>,
    ) -> Result<Vec<serde_json::Value>> {
        let response = tokio::time::timeout(self.config.timeout, self.judge.generate_request(request))
            .await
            .map_err(|_| EvalError::timeout("judge", self.config.timeout))??;

        if let (Some(spent), Ok(mut total)) = (response.usage, usage.lock()) {
            *total += spent;
        }

        match self.parser.parse(&response.content)? {
            serde_json::Value::Array(items) => Ok(items),
            _ => Err(EvalError::Other("judge output is not a list".to_string())),
        }
    }

    /// Grade every record of a run artifact, preserving its order.
    ///
    /// Prints one progress line per scenario to stdout.
    pub async fn grade_run(&self, artifact: &RunArtifact) -> Result<GradedRunArtifact> {
        artifact.validate()?;
        let total = artifact.results.len();
        let judge_info = self.judge.model_info();
        tracing::info!(
            run = %artifact.header.label,
            judge = %judge_info.model_name,
            scenarios = total,
            "starting grading"
        );

        let mut pending = stream::iter(artifact.results.iter())
            .map(|record| async move { (record, self.grade(record).await) })
            .buffered(self.config.concurrency);

        let mut results = Vec::with_capacity(total);
        let mut usage = TokenUsage::default();
        let mut grader_errors = 0;

        while let Some((record, grade)) = pending.next().await {
            let grade = grade?;
            usage += grade.usage;
            if grade.judge_error.is_some() {
                grader_errors += 1;
            }
            let result = GradedResult::new(record.clone(), grade.grades);
            println!("{}", progress_line(results.len() + 1, total, &result));
            results.push(result);
        }

        let mut grading = summarize(&results);
        grading.judge_tokens_in = usage.prompt_tokens;
        grading.judge_tokens_out = usage.completion_tokens;
        grading.judge_cost_usd = self.costs.calculate_cost(&judge_info, &usage);
        grading.grader_errors = grader_errors;

        tracing::info!(
            run = %artifact.header.label,
            pass_rate = grading.pass_rate,
            grader_errors,
            "grading finished"
        );

        let graded = GradedRunArtifact {
            header: artifact.header.clone(),
            graded_at: Utc::now(),
            judge_model: judge_info.model_name,
            results,
            summary: artifact.summary.clone(),
            grading,
        };
        graded.validate()?;
        Ok(graded)
    }
}

fn all_fail(checks: &[String], reason: &str) -> Vec<CheckGrade> {
    checks
        .iter()
        .map(|check| CheckGrade::fail(check.clone(), reason))
        .collect()
}

/// Align judge output with the checks: one grade per check, in order.
/// Missing entries are back-filled as FAIL; extra entries are dropped.
fn reconcile(scenario_id: &str, checks: &[String], verdicts: Vec<serde_json::Value>) -> Vec<CheckGrade> {
    if verdicts.len() != checks.len() {
        tracing::warn!(
            scenario = %scenario_id,
            expected = checks.len(),
            received = verdicts.len(),
            "judge returned a different number of verdicts than checks"
        );
    }

    let mut verdicts = verdicts.into_iter();
    checks
        .iter()
        .map(|check| match verdicts.next() {
            Some(value) => read_verdict(check, &value),
            None => CheckGrade::fail(check.clone(), NOT_EVALUATED),
        })
        .collect()
}

fn read_verdict(check: &str, value: &serde_json::Value) -> CheckGrade {
    let raw_result = value
        .get("result")
        .or_else(|| value.get("verdict"))
        .and_then(|v| v.as_str());
    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    match raw_result.map(|r| (r, Verdict::parse(r))) {
        Some((_, Some(verdict))) => CheckGrade {
            check: check.to_string(),
            result: verdict,
            reason,
        },
        Some((bad, None)) => CheckGrade::fail(check, format!("invalid verdict '{}'", bad.trim())),
        None => CheckGrade::fail(check, "invalid verdict: missing result"),
    }
}

/// Aggregate pass counts over graded (non-empty) results
pub fn summarize(results: &[GradedResult]) -> GradingSummary {
    let graded: Vec<&GradedResult> = results.iter().filter(|r| r.total_checks > 0).collect();
    let passed_checks: usize = graded.iter().map(|r| r.passed).sum();
    let total_checks: usize = graded.iter().map(|r| r.total_checks).sum();

    GradingSummary {
        graded_scenarios: graded.len(),
        ungraded_scenarios: results.len() - graded.len(),
        passed_checks,
        total_checks,
        pass_rate: if total_checks == 0 {
            0.0
        } else {
            100.0 * passed_checks as f64 / total_checks as f64
        },
        ..GradingSummary::default()
    }
}

fn progress_line(position: usize, total: usize, result: &GradedResult) -> String {
    let width = total.to_string().len();
    let outcome = if result.ungraded {
        "not graded".to_string()
    } else {
        format!("{}/{}", result.passed, result.total_checks)
    };
    format!(
        "[{:>width$}/{}] {} ({}) {}",
        position,
        total,
        result.id(),
        result.record.category,
        outcome,
        width = width
    )
}
