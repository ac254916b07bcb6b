//! Tests for comparison reporting

use super::*;
use crate::artifact::{GradedResult, GradingSummary, ResponseRecord, RetrievalRecord, RunHeader, RunSummary};
use crate::collector::{RetrievalConfig, SamplingConfig};
use crate::grader::{self, CheckGrade, Verdict};
use chrono::TimeZone;
use std::time::Duration;
use uuid::Uuid;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
}

fn header(label: &str, retrieval: bool) -> RunHeader {
    RunHeader {
        run_id: Uuid::nil(),
        label: label.to_string(),
        model: format!("{}-model", label),
        system_prompt: "coach".to_string(),
        retrieval: retrieval.then(|| RetrievalRecord {
            embedding_model: "hashing-64".to_string(),
            knowledge_store: "memory".to_string(),
            config: RetrievalConfig::default(),
        }),
        sampling: SamplingConfig::default(),
        pacing: Duration::ZERO,
        library_version: "2025.3".to_string(),
        library_fingerprint: "f00dfeedcafe0123".to_string(),
        timestamp: at(10),
        total_scenarios: 0,
    }
}

/// `verdicts` holds one `(check, pass)` pair per check
fn graded(id: &str, category: &str, verdicts: &[(&str, bool)]) -> GradedResult {
    let record = ResponseRecord {
        id: id.to_string(),
        category: category.to_string(),
        prompt: format!("prompt {}", id),
        checks: verdicts.iter().map(|(c, _)| c.to_string()).collect(),
        response: format!("SECRET RESPONSE TEXT {}", id),
        tokens_in: 10,
        tokens_out: 20,
        latency_seconds: 1.0,
        error: String::new(),
        is_new_scenario: false,
        retrieved_chunks: None,
        retrieval_error: None,
        prompt_truncated: false,
    };
    let grades = verdicts
        .iter()
        .map(|(check, pass)| {
            if *pass {
                CheckGrade::pass(*check, format!("{} covered", check))
            } else {
                CheckGrade::fail(*check, format!("{} missing", check))
            }
        })
        .collect();
    GradedResult::new(record, grades)
}

fn run(label: &str, retrieval: bool, results: Vec<GradedResult>) -> GradedRunArtifact {
    let records: Vec<ResponseRecord> = results.iter().map(|r| r.record.clone()).collect();
    let mut header = header(label, retrieval);
    header.total_scenarios = results.len();
    GradedRunArtifact {
        header,
        graded_at: at(11),
        judge_model: "judge-1".to_string(),
        grading: grader::summarize(&results),
        summary: RunSummary::from_records(&records, 0.0),
        results,
    }
}

const SLED: [&str; 4] = [
    "states 50 m total",
    "mentions four 12.5 m lengths",
    "notes the sled weight depends on division",
    "suggests driving with low hips",
];

fn sled(passes: [bool; 4]) -> GradedResult {
    let verdicts: Vec<(&str, bool)> = SLED.iter().copied().zip(passes).collect();
    graded("race-facts-sled-distance", "Race Facts", &verdicts)
}

#[test]
fn sled_regression_lists_exactly_the_flipped_check() {
    let baseline = run("base", false, vec![sled([true, true, true, true])]);
    let candidate = run("cand", false, vec![sled([true, false, true, true])]);

    let report = compare_at(&baseline, &candidate, at(12)).unwrap();
    let c = &report.comparison;

    let row = c.row("race-facts-sled-distance").unwrap();
    assert!((row.delta + 25.0).abs() < 1e-9);
    assert_eq!(row.classification, Classification::Regression);

    assert_eq!(c.regressions.len(), 1);
    let flips = &c.regressions[0].flips;
    assert_eq!(flips.len(), 1);
    assert_eq!(flips[0].check, "mentions four 12.5 m lengths");
    assert_eq!(flips[0].baseline_reason, "mentions four 12.5 m lengths covered");
    assert_eq!(flips[0].candidate_reason, "mentions four 12.5 m lengths missing");

    assert!(report.markdown.contains("### race-facts-sled-distance (Race Facts, -25.0 pp)"));
    assert!(report.markdown.contains("  - candidate FAIL: mentions four 12.5 m lengths missing"));
    assert!(report.markdown.contains("Regressions in critical areas: `race-facts-sled-distance`."));
}

#[test]
fn repeated_check_text_pairs_by_position() {
    let check = "cites a study for the claim";
    let baseline = run(
        "base",
        false,
        vec![graded("caffeine", "Supplements", &[(check, false), (check, true)])],
    );
    let candidate = run(
        "cand",
        false,
        vec![graded("caffeine", "Supplements", &[(check, false), (check, false)])],
    );

    let c = compare_at(&baseline, &candidate, at(12)).unwrap().comparison;

    assert_eq!(c.regressions.len(), 1);
    assert_eq!(c.regressions[0].flips.len(), 1);

    let critical = c.critical.iter().find(|b| b.category == "Supplements").unwrap();
    let pairs = &critical.scenarios[0].checks;
    assert_eq!(pairs[0].baseline, Some(Verdict::Fail));
    assert_eq!(pairs[1].baseline, Some(Verdict::Pass));
}

#[test]
fn edited_check_lists_fall_back_to_text_matching() {
    let baseline = run(
        "base",
        false,
        vec![graded("taper", "Recovery", &[("a", true), ("b", true)])],
    );
    let candidate = run(
        "cand",
        false,
        vec![graded("taper", "Recovery", &[("b", false), ("a", true), ("c", false)])],
    );

    let c = compare_at(&baseline, &candidate, at(12)).unwrap().comparison;

    assert_eq!(c.regressions.len(), 1);
    let flips: Vec<&str> = c.regressions[0].flips.iter().map(|f| f.check.as_str()).collect();
    assert_eq!(flips, vec!["b"]);
}

#[test]
fn generation_error_skips_delta_classification() {
    let baseline = run(
        "base",
        false,
        vec![graded("booster", "Supplements", &[("a", true), ("b", true)])],
    );
    let mut failed = graded("booster", "Supplements", &[("a", false), ("b", false)]);
    failed.record.error = "Provider error: 503".to_string();
    failed.record.response.clear();
    let candidate = run("cand", false, vec![failed]);

    let report = compare_at(&baseline, &candidate, at(12)).unwrap();
    let row = report.comparison.row("booster").unwrap();

    assert_eq!(row.classification, Classification::NeedsWork);
    assert!(!row.delta_classified());
    assert!(row.error.as_deref().unwrap().contains("503"));
    assert!(report.comparison.regressions.is_empty());
    assert_eq!(report.grades.classifications[0].delta, None);
    assert!(report
        .markdown
        .contains("| booster | Supplements | 100.0% | 0.0% | n/a | NEEDS-WORK | candidate generation error: Provider error: 503 |"));
}

#[test]
fn shared_subset_follows_candidate_order_and_matches_baseline_column() {
    let baseline = run(
        "base",
        false,
        vec![
            graded("a", "Nutrition", &[("x", true), ("y", false)]),
            graded("gone", "Recovery", &[("x", true)]),
            graded("b", "Recovery", &[("x", false)]),
        ],
    );
    let candidate = run(
        "cand",
        false,
        vec![
            graded("b", "Recovery", &[("x", true)]),
            graded("fresh", "Coaching Style", &[("x", true), ("y", true)]),
            graded("a", "Nutrition", &[("x", true), ("y", true)]),
            graded("empty", "Nutrition", &[]),
        ],
    );

    let c = compare_at(&baseline, &candidate, at(12)).unwrap().comparison;

    let order: Vec<&str> = c.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(order, vec!["b", "a"]);
    assert_eq!(c.new_ids, vec!["fresh", "empty"]);
    assert_eq!(c.dropped_ids, vec!["gone"]);
    assert_eq!(c.ungraded_ids, vec!["empty"]);

    let baseline_column = Tally {
        passed: c.rows.iter().map(|r| r.baseline.passed).sum(),
        total: c.rows.iter().map(|r| r.baseline.total).sum(),
    };
    assert_eq!(baseline_column, c.shared_baseline);
    assert_eq!(c.shared_baseline, Tally { passed: 1, total: 3 });
    assert_eq!(c.shared_candidate, Tally { passed: 3, total: 3 });
    assert_eq!(c.new_subset, Tally { passed: 2, total: 2 });
    assert_eq!(c.baseline.overall, Tally { passed: 2, total: 4 });

    let categories: Vec<&str> = c.categories.iter().map(|r| r.category.as_str()).collect();
    assert_eq!(categories, vec!["Nutrition", "Recovery"]);
}

#[test]
fn retrieval_improvements_list_their_chunks() {
    let baseline = run(
        "finetune",
        false,
        vec![graded("skierg", "Training Programming", &[("benchmark", false), ("pacing", true)])],
    );
    let mut improved = graded("skierg", "Training Programming", &[("benchmark", true), ("pacing", true)]);
    improved.record.retrieved_chunks = Some(vec!["bench-skierg-1000".to_string(), "pacing-erg".to_string()]);
    let mut other = graded("sled", "Race Facts", &[("a", true)]);
    other.record.retrieved_chunks = Some(vec!["pacing-erg".to_string()]);
    let candidate = run("finetune-rag", true, vec![improved, other]);

    let report = compare_at(&baseline, &candidate, at(12)).unwrap();
    let c = &report.comparison;

    assert_eq!(c.improvements.len(), 1);
    assert_eq!(
        c.improvements[0].chunks,
        Some(vec!["bench-skierg-1000".to_string(), "pacing-erg".to_string()])
    );

    let analysis = c.retrieval.as_ref().unwrap();
    assert!(analysis.baseline.is_none());
    let counts = analysis.candidate.as_ref().unwrap();
    assert_eq!(counts[0].id, "pacing-erg");
    assert_eq!(counts[0].count, 2);

    assert!(report.markdown.contains("## Retrieval Analysis"));
    assert!(report
        .markdown
        .contains("- `skierg` (Training Programming, +50.0 pp), retrieved: `bench-skierg-1000`, `pacing-erg`"));
}

#[test]
fn report_sections_appear_in_order() {
    let baseline = run("base", true, vec![sled([true; 4])]);
    let candidate = run("cand", true, vec![sled([true; 4])]);
    let md = compare_at(&baseline, &candidate, at(12)).unwrap().markdown;

    let headings = [
        "# Coach Evaluation: base vs cand",
        "## Summary",
        "## By Category",
        "## Critical Areas",
        "## Scenario Comparison",
        "## Regressions",
        "## Improvements",
        "## Retrieval Analysis",
        "## Methodology",
        "## Conclusion",
    ];
    let positions: Vec<usize> = headings.iter().map(|h| md.find(h).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn report_is_stable_apart_from_the_timestamp() {
    let baseline = run("base", false, vec![sled([true, true, false, true])]);
    let candidate = run("cand", false, vec![sled([true, true, true, true])]);

    let first = compare_at(&baseline, &candidate, at(12)).unwrap();
    let second = compare_at(&baseline, &candidate, at(12)).unwrap();
    assert_eq!(first.markdown, second.markdown);

    let later = compare_at(&baseline, &candidate, at(13)).unwrap();
    let strip = |md: &str| {
        md.lines()
            .filter(|l| !l.starts_with("**Generated:**"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(strip(&first.markdown), strip(&later.markdown));
}

#[test]
fn outputs_are_written_without_response_text() {
    let dir = tempfile::tempdir().unwrap();
    let baseline = run("base", false, vec![sled([true; 4])]);
    let candidate = run("cand", false, vec![sled([false, true, true, true])]);

    let report = compare_at(&baseline, &candidate, at(12)).unwrap();
    let (md_path, grades_path) = report.write(dir.path().join("out")).unwrap();

    assert_eq!(
        md_path.file_name().unwrap().to_str().unwrap(),
        "comparison-base-vs-cand-20250601T120000Z.md"
    );
    let grades = std::fs::read_to_string(&grades_path).unwrap();
    assert!(!grades.contains("SECRET RESPONSE TEXT"));
    assert!(grades.contains("\"result\": \"FAIL\""));

    let parsed: ComparisonGrades = serde_json::from_str(&grades).unwrap();
    assert_eq!(parsed.baseline.scenarios[0].grades.len(), 4);
    assert_eq!(parsed.candidate.scenarios[0].passed, 3);
}

#[test]
fn mismatched_grade_lists_are_rejected() {
    let baseline = run("base", false, vec![sled([true; 4])]);
    let mut candidate = run("cand", false, vec![sled([true; 4])]);
    candidate.results[0].grades.pop();

    assert!(matches!(
        compare_at(&baseline, &candidate, at(12)),
        Err(crate::error::EvalError::Invariant(_))
    ));
}

#[test]
fn summary_uses_default_grading_when_empty() {
    let empty = run("base", false, Vec::new());
    assert_eq!(empty.grading, GradingSummary::default());
    let report = compare_at(&empty, &empty, at(12)).unwrap();
    assert!(report.markdown.contains("The runs share no graded scenarios."));
}
