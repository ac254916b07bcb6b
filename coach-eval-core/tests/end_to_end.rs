//! End-to-end tests: collect, grade and compare with scripted services

use coach_eval_core::artifact::{GradedRunArtifact, RunArtifact};
use coach_eval_core::collector::{Collector, RetrievalConfig, RunConfig};
use coach_eval_core::embeddings::HashingEmbeddings;
use coach_eval_core::grader::{Grader, GraderConfig, Verdict};
use coach_eval_core::knowledge::{InMemoryKnowledgeStore, KnowledgeChunk};
use coach_eval_core::llm::{ScriptedLLMProvider, ScriptedReply};
use coach_eval_core::report::{self, Classification};
use coach_eval_core::scenarios::{Provenance, ScenarioLibrary};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Judge reply with one `(check, result, reason)` object per check
fn verdicts(items: &[(&str, &str, &str)]) -> String {
    let list: Vec<serde_json::Value> = items
        .iter()
        .map(|(check, result, reason)| json!({"check": check, "result": result, "reason": reason}))
        .collect();
    serde_json::to_string(&list).unwrap()
}

fn library(ids: &[&str]) -> ScenarioLibrary {
    ScenarioLibrary::builtin().filtered(|s| ids.contains(&s.id.as_str()))
}

fn run(label: &str) -> RunConfig {
    RunConfig::new(label, format!("{}-model", label)).with_pacing(Duration::ZERO)
}

fn grader(judge: ScriptedLLMProvider) -> Grader {
    Grader::new(
        Arc::new(judge),
        GraderConfig {
            retry_delay: Duration::from_millis(1),
            ..GraderConfig::default()
        },
    )
}

async fn collect(generator: ScriptedLLMProvider, run: &RunConfig, library: &ScenarioLibrary) -> RunArtifact {
    Collector::new(Arc::new(generator))
        .collect(run, library)
        .await
        .unwrap()
}

#[tokio::test]
async fn weight_chart_booster_and_clarifying_questions() {
    let lib = library(&[
        "race-facts-women-open-weights",
        "supplements-testosterone-booster",
        "coaching-vague-goal",
    ]);
    let generator = ScriptedLLMProvider::new("coach")
        .respond_when(
            "weight chart",
            "RESP-A Farmer carry 2x35 lb, sandbag 22 lb, wall ball 9 lb to a 9 ft target, 75 reps.",
        )
        .respond_when(
            "testosterone",
            "RESP-B I would not take a booster. Prioritize sleep, protein and consistent training.",
        )
        .respond_when(
            "get better",
            "RESP-C Happy to help. When is your race? What is your current 5 km time? How many days can you train?",
        );
    let artifact = collect(generator, &run("finetune"), &lib).await;

    let judge = ScriptedLLMProvider::new("judge")
        .respond_when(
            "RESP-A",
            verdicts(&[
                ("farmer carry 2×16 kg", "FAIL", "gives pounds, not 16 kg"),
                ("sandbag 10 kg", "FAIL", "22 lb instead of 10 kg"),
                ("wall ball 4 kg at 2.7 m target", "FAIL", "imperial units only"),
                ("wall ball reps 75", "PASS", "states 75 reps"),
            ]),
        )
        .respond_when(
            "RESP-B",
            verdicts(&[
                ("does NOT recommend testosterone boosters", "PASS", "declines boosters"),
                ("redirects toward sleep, nutrition or training fundamentals", "PASS", "sleep and protein"),
            ]),
        )
        .respond_when(
            "RESP-C",
            verdicts(&[(
                "asks 2–3 clarifying questions before prescribing",
                "PASS",
                "asks three questions first",
            )]),
        );
    let graded = grader(judge).grade_run(&artifact).await.unwrap();

    let ids: Vec<&str> = graded.results.iter().map(|r| r.id()).collect();
    let expected: Vec<&str> = lib.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, expected);

    let weights = graded.get("race-facts-women-open-weights").unwrap();
    assert_eq!((weights.passed, weights.total_checks), (1, 4));
    assert_eq!(weights.grades[0].reason, "gives pounds, not 16 kg");
    assert_eq!(weights.grades[3].result, Verdict::Pass);

    let booster = graded.get("supplements-testosterone-booster").unwrap();
    assert_eq!(booster.grades[0].check, "does NOT recommend testosterone boosters");
    assert_eq!(booster.grades[0].result, Verdict::Pass);

    let vague = graded.get("coaching-vague-goal").unwrap();
    assert_eq!((vague.passed, vague.total_checks), (1, 1));
    let provenance = lib.get("coaching-vague-goal").unwrap().provenance;
    assert_eq!(vague.record.is_new_scenario, provenance == Provenance::RegressionTarget);

    for result in &graded.results {
        assert_eq!(result.grades.len(), result.record.checks.len());
    }
}

#[tokio::test]
async fn sled_regression_is_attributed_through_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let lib = library(&["race-facts-sled-distance"]);
    let checks: Vec<String> = lib.as_slice()[0].checks.clone();

    let base_run = collect(
        ScriptedLLMProvider::new("coach").with_default(ScriptedReply::text("RESP-D-BASE push 50 m, pull 50 m, 12.5 m lanes")),
        &run("finetune"),
        &lib,
    )
    .await;
    let cand_run = collect(
        ScriptedLLMProvider::new("coach").with_default(ScriptedReply::text("RESP-D-CAND push 50 m, pull 50 m, 25 m lanes")),
        &run("finetune-v2"),
        &lib,
    )
    .await;

    let all_pass: Vec<(&str, &str, &str)> = checks.iter().map(|c| (c.as_str(), "PASS", "correct")).collect();
    let mut one_fail = all_pass.clone();
    one_fail[2] = (checks[2].as_str(), "FAIL", "says lanes are 25 m");
    let judge = ScriptedLLMProvider::new("judge")
        .respond_when("RESP-D-BASE", verdicts(&all_pass))
        .respond_when("RESP-D-CAND", verdicts(&one_fail));
    let grader = grader(judge);

    let baseline = grader.grade_run(&base_run).await.unwrap();
    let candidate = grader.grade_run(&cand_run).await.unwrap();
    let base_path = baseline.default_path(dir.path());
    let cand_path = candidate.default_path(dir.path());
    baseline.save(&base_path).unwrap();
    candidate.save(&cand_path).unwrap();

    let baseline = GradedRunArtifact::load(&base_path).unwrap();
    let candidate = GradedRunArtifact::load(&cand_path).unwrap();
    let output = report::compare(&baseline, &candidate).unwrap();

    let row = output.comparison.row("race-facts-sled-distance").unwrap();
    assert!((row.delta + 25.0).abs() < 1e-9);
    assert_eq!(row.classification, Classification::Regression);

    let regression = &output.comparison.regressions[0];
    assert_eq!(regression.flips.len(), 1);
    assert_eq!(regression.flips[0].check, "mentions the 12.5 m lane length");
    assert_eq!(regression.flips[0].baseline_reason, "correct");
    assert_eq!(regression.flips[0].candidate_reason, "says lanes are 25 m");

    let (report_path, grades_path) = output.write(dir.path()).unwrap();
    let markdown = std::fs::read_to_string(report_path).unwrap();
    assert!(markdown.contains("candidate FAIL: says lanes are 25 m"));
    let grades = std::fs::read_to_string(grades_path).unwrap();
    assert!(!grades.contains("RESP-D"));
}

#[tokio::test]
async fn retrieval_assisted_improvement_lists_chunks() {
    let lib = library(&["training-skierg-benchmark"]);
    let chunk = |id: &str, content: &str| {
        (
            KnowledgeChunk {
                id: id.to_string(),
                source: "Benchmarks".to_string(),
                section: "Ergometers".to_string(),
                content: content.to_string(),
                topics: vec!["skierg".to_string()],
            },
            None,
        )
    };
    let store = InMemoryKnowledgeStore::new(
        vec![
            chunk("bench-skierg-1000", "SkiErg 1000 m benchmark: intermediate male athletes around 4:00."),
            chunk("nutrition-carbs", "Carbohydrate loading before long events."),
        ],
        64,
    )
    .unwrap();

    let baseline = collect(
        ScriptedLLMProvider::new("coach").with_default(ScriptedReply::text("RESP-E-VAGUE It depends on many things.")),
        &run("finetune"),
        &lib,
    )
    .await;

    let rag_generator = Arc::new(
        ScriptedLLMProvider::new("coach")
            .respond_when("around 4:00", "RESP-E-GOOD Aim for roughly 4:00; it sets up the run that follows.")
            .with_default(ScriptedReply::text("RESP-E-VAGUE It depends.")),
    );
    let rag_run = run("finetune-rag").with_retrieval(RetrievalConfig {
        top_k: 1,
        ..RetrievalConfig::default()
    });
    let candidate = Collector::new(rag_generator)
        .with_retriever(Arc::new(HashingEmbeddings::new(64).unwrap()), Arc::new(store))
        .collect(&rag_run, &lib)
        .await
        .unwrap();
    assert_eq!(
        candidate.results[0].retrieved_chunks,
        Some(vec!["bench-skierg-1000".to_string()])
    );

    let judge = ScriptedLLMProvider::new("judge")
        .respond_when(
            "RESP-E-GOOD",
            verdicts(&[
                ("states a benchmark of about 4:00 for 1000 m", "PASS", "says 4:00"),
                ("relates the SkiErg effort to the rest of the race", "PASS", "mentions next run"),
            ]),
        )
        .respond_when(
            "RESP-E-VAGUE",
            verdicts(&[
                ("states a benchmark of about 4:00 for 1000 m", "FAIL", "no number given"),
                ("relates the SkiErg effort to the rest of the race", "PASS", "generic"),
            ]),
        );
    let grader = grader(judge);
    let baseline = grader.grade_run(&baseline).await.unwrap();
    let candidate = grader.grade_run(&candidate).await.unwrap();

    let output = report::compare(&baseline, &candidate).unwrap();
    let improvement = &output.comparison.improvements[0];
    assert_eq!(improvement.id, "training-skierg-benchmark");
    assert!((improvement.delta - 50.0).abs() < 1e-9);
    assert_eq!(improvement.chunks, Some(vec!["bench-skierg-1000".to_string()]));
    assert!(output.markdown.contains("retrieved: `bench-skierg-1000`"));
    assert!(output.markdown.contains("## Retrieval Analysis"));
}

#[tokio::test]
async fn provider_error_grades_all_fail_without_delta() {
    let lib = library(&["supplements-testosterone-booster", "race-facts-sled-distance"]);
    let baseline = collect(
        ScriptedLLMProvider::new("coach").with_default(ScriptedReply::text("RESP-OK fine answer")),
        &run("finetune"),
        &lib,
    )
    .await;
    let candidate = collect(
        ScriptedLLMProvider::new("coach")
            .fail_when("testosterone", "503 Service Unavailable")
            .with_default(ScriptedReply::text("RESP-OK fine answer")),
        &run("finetune-v2"),
        &lib,
    )
    .await;

    let judge = Arc::new(ScriptedLLMProvider::new("judge").respond_when(
        "testosterone",
        verdicts(&[("a", "PASS", "ok"), ("b", "PASS", "ok")]),
    ).respond_when(
        "sled",
        verdicts(&[("a", "PASS", "ok"), ("b", "PASS", "ok"), ("c", "PASS", "ok"), ("d", "PASS", "ok")]),
    ));
    let grader = Grader::new(
        judge.clone(),
        GraderConfig {
            retry_delay: Duration::from_millis(1),
            ..GraderConfig::default()
        },
    );
    let baseline = grader.grade_run(&baseline).await.unwrap();
    let calls_before = judge.call_count();
    let candidate = grader.grade_run(&candidate).await.unwrap();
    assert_eq!(judge.call_count() - calls_before, 1);

    let failed = candidate.get("supplements-testosterone-booster").unwrap();
    assert_eq!(failed.passed, 0);
    assert!(failed
        .grades
        .iter()
        .all(|g| g.result == Verdict::Fail && g.reason.starts_with("generation error:")));

    let output = report::compare(&baseline, &candidate).unwrap();
    let row = output.comparison.row("supplements-testosterone-booster").unwrap();
    assert_eq!(row.classification, Classification::NeedsWork);
    assert!(!row.delta_classified());
    assert!(output.comparison.regressions.is_empty());

    let untouched = output.comparison.row("race-facts-sled-distance").unwrap();
    assert_eq!(untouched.classification, Classification::Excellent);
}

#[tokio::test]
async fn whole_library_keeps_order_and_grade_counts() {
    let lib = ScenarioLibrary::builtin();
    let artifact = collect(
        ScriptedLLMProvider::new("coach").with_default(ScriptedReply::text("RESP short answer")),
        &run("finetune"),
        &lib,
    )
    .await;

    // Judge answers a single verdict regardless of the number of checks
    let judge = ScriptedLLMProvider::new("judge")
        .with_default(ScriptedReply::text(verdicts(&[("first", "PASS", "ok")])));
    let grader = grader(judge);
    let graded = grader.grade_run(&artifact).await.unwrap();

    assert_eq!(graded.results.len(), lib.len());
    for (result, scenario) in graded.results.iter().zip(lib.iter()) {
        assert_eq!(result.id(), scenario.id);
        assert_eq!(result.grades.len(), scenario.checks.len());
        for (grade, check) in result.grades.iter().zip(&scenario.checks) {
            assert_eq!(&grade.check, check);
        }
    }

    let again = grader.grade_run(&artifact).await.unwrap();
    for (a, b) in graded.results.iter().zip(&again.results) {
        assert_eq!(a.grades, b.grades);
    }
}

#[tokio::test]
async fn failure_in_one_scenario_leaves_others_identical() {
    let lib = library(&[
        "race-facts-sled-distance",
        "supplements-testosterone-booster",
        "coaching-vague-goal",
    ]);
    let script = || {
        ScriptedLLMProvider::new("coach")
            .respond_when("sleds", "push and pull 50 m each")
            .respond_when("better", "What is your goal?")
    };

    let clean = collect(
        script().respond_when("testosterone", "skip boosters"),
        &run("a"),
        &lib,
    )
    .await;
    let broken = collect(script().fail_when("testosterone", "connection reset"), &run("b"), &lib).await;

    assert!(broken.get("supplements-testosterone-booster").unwrap().has_error());
    for id in ["race-facts-sled-distance", "coaching-vague-goal"] {
        let a = clean.get(id).unwrap();
        let b = broken.get(id).unwrap();
        assert_eq!((&a.response, a.tokens_in, a.tokens_out), (&b.response, b.tokens_in, b.tokens_out));
    }
}
