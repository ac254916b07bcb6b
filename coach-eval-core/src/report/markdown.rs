//! Markdown rendering of a [`Comparison`]
//!
//! Output depends only on the comparison and the generation timestamp; every
//! collection is iterated in a fixed order and floats use fixed precision.

use chrono::{DateTime, Utc};

use super::classify::{self, Classification};
use super::compare::{ChunkCount, Comparison, Tally};
use crate::grader::Verdict;
use crate::scenarios::Category;

/// Rows shown in each most-retrieved chunk table
const TOP_CHUNKS: usize = 10;

fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v),
        None => "n/a".to_string(),
    }
}

fn signed(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.1} pp", v),
        None => "n/a".to_string(),
    }
}

fn tally(t: Tally) -> String {
    format!("{} ({}/{})", pct(t.pct()), t.passed, t.total)
}

/// Table-safe cell text
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn verdict(v: Option<Verdict>) -> &'static str {
    match v {
        Some(v) => v.as_str(),
        None => "n/a",
    }
}

fn id_list(ids: &[String]) -> String {
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.iter()
            .map(|id| format!("`{}`", id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Render the full comparison report.
pub fn render(comparison: &Comparison, generated_at: DateTime<Utc>) -> String {
    let mut md = String::new();
    header(&mut md, comparison, generated_at);
    summary(&mut md, comparison);
    categories(&mut md, comparison);
    critical(&mut md, comparison);
    scenarios(&mut md, comparison);
    regressions(&mut md, comparison);
    improvements(&mut md, comparison);
    retrieval(&mut md, comparison);
    methodology(&mut md, comparison);
    conclusion(&mut md, comparison);
    md
}

fn header(md: &mut String, c: &Comparison, generated_at: DateTime<Utc>) {
    md.push_str(&format!(
        "# Coach Evaluation: {} vs {}\n\n",
        c.baseline.label, c.candidate.label
    ));
    md.push_str(&format!(
        "**Generated:** {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for (role, side) in [("Baseline", &c.baseline), ("Candidate", &c.candidate)] {
        md.push_str(&format!(
            "- **{}:** `{}` model `{}`, collected {}, {} scenarios{}\n",
            role,
            side.label,
            side.model,
            side.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            side.scenarios,
            if side.uses_retrieval { ", retrieval enabled" } else { "" }
        ));
    }
    md.push('\n');
}

fn summary(md: &mut String, c: &Comparison) {
    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Baseline | Candidate | Delta |\n");
    md.push_str("|--------|----------|-----------|-------|\n");
    md.push_str(&format!(
        "| Overall pass rate | {} | {} | {} |\n",
        tally(c.baseline.overall),
        tally(c.candidate.overall),
        signed(c.overall_delta())
    ));
    md.push_str(&format!(
        "| Shared scenarios ({}) | {} | {} | {} |\n",
        c.rows.len(),
        tally(c.shared_baseline),
        tally(c.shared_candidate),
        signed(c.shared_delta())
    ));
    md.push_str(&format!(
        "| New scenarios ({}) | n/a | {} | n/a |\n",
        c.new_ids.len(),
        tally(c.new_subset)
    ));
    md.push('\n');
    md.push_str(&format!(
        "Classification of shared scenarios: {} IMPROVED, {} REGRESSION, {} EXCELLENT, {} GOOD, {} NEEDS-WORK.\n\n",
        c.count(Classification::Improved),
        c.count(Classification::Regression),
        c.count(Classification::Excellent),
        c.count(Classification::Good),
        c.count(Classification::NeedsWork),
    ));
}

fn categories(md: &mut String, c: &Comparison) {
    md.push_str("## By Category\n\n");
    if c.categories.is_empty() {
        md.push_str("No shared graded scenarios.\n\n");
        return;
    }
    md.push_str("| Category | Baseline | Candidate | Delta |\n");
    md.push_str("|----------|----------|-----------|-------|\n");
    for row in &c.categories {
        let critical = Category::from_name(&row.category).is_some_and(Category::is_critical);
        md.push_str(&format!(
            "| {}{} | {} | {} | {} |\n",
            cell(&row.category),
            if critical { " *" } else { "" },
            tally(row.baseline),
            tally(row.candidate),
            signed(row.delta())
        ));
    }
    md.push_str("\n\\* critical area\n\n");
}

fn critical(md: &mut String, c: &Comparison) {
    md.push_str("## Critical Areas\n\n");
    if c.critical.is_empty() {
        md.push_str("No shared scenarios in critical categories.\n\n");
        return;
    }
    for block in &c.critical {
        md.push_str(&format!(
            "### {}\n\nBaseline {} -> Candidate {}\n\n",
            block.category,
            tally(block.baseline),
            tally(block.candidate)
        ));
        for scenario in &block.scenarios {
            md.push_str(&format!(
                "**{}** ({})\n\n",
                scenario.id, scenario.classification
            ));
            for check in &scenario.checks {
                md.push_str(&format!(
                    "- [{}] {} (baseline {}): {}\n",
                    check.candidate.as_str(),
                    check.check,
                    verdict(check.baseline),
                    check.reason
                ));
            }
            md.push('\n');
        }
    }
}

fn scenarios(md: &mut String, c: &Comparison) {
    md.push_str("## Scenario Comparison\n\n");
    if c.rows.is_empty() {
        md.push_str("No shared graded scenarios.\n\n");
        return;
    }
    md.push_str("| Scenario | Category | Baseline | Candidate | Delta | Classification | Notes |\n");
    md.push_str("|----------|----------|----------|-----------|-------|----------------|-------|\n");
    for row in &c.rows {
        let delta = if row.delta_classified() {
            signed(Some(row.delta))
        } else {
            "n/a".to_string()
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            cell(&row.id),
            cell(&row.category),
            pct(Some(row.baseline_pct())),
            pct(Some(row.candidate_pct())),
            delta,
            row.classification,
            cell(row.error.as_deref().unwrap_or(""))
        ));
    }
    md.push('\n');
}

fn regressions(md: &mut String, c: &Comparison) {
    md.push_str("## Regressions\n\n");
    if c.regressions.is_empty() {
        md.push_str("None.\n\n");
        return;
    }
    for regression in &c.regressions {
        md.push_str(&format!(
            "### {} ({}, {:+.1} pp)\n\n",
            regression.id, regression.category, regression.delta
        ));
        if regression.flips.is_empty() {
            md.push_str("No individual check flipped from PASS to FAIL.\n\n");
            continue;
        }
        for flip in &regression.flips {
            md.push_str(&format!("- **{}**\n", flip.check));
            md.push_str(&format!("  - baseline PASS: {}\n", flip.baseline_reason));
            md.push_str(&format!("  - candidate FAIL: {}\n", flip.candidate_reason));
        }
        md.push('\n');
    }
}

fn improvements(md: &mut String, c: &Comparison) {
    md.push_str("## Improvements\n\n");
    if c.improvements.is_empty() {
        md.push_str("None.\n\n");
        return;
    }
    for improvement in &c.improvements {
        md.push_str(&format!(
            "- `{}` ({}, {:+.1} pp)",
            improvement.id, improvement.category, improvement.delta
        ));
        if let Some(chunks) = &improvement.chunks {
            md.push_str(&format!(", retrieved: {}", id_list(chunks)));
        }
        md.push('\n');
    }
    md.push('\n');
}

fn chunk_table(md: &mut String, title: &str, counts: &[ChunkCount], failures: usize) {
    md.push_str(&format!("### {}\n\n", title));
    if counts.is_empty() {
        md.push_str("No chunks retrieved.\n\n");
    } else {
        md.push_str("| Chunk | Times retrieved |\n");
        md.push_str("|-------|-----------------|\n");
        for count in counts.iter().take(TOP_CHUNKS) {
            md.push_str(&format!("| `{}` | {} |\n", cell(&count.id), count.count));
        }
        md.push('\n');
    }
    if failures > 0 {
        md.push_str(&format!("Retrieval failed for {} scenario(s).\n\n", failures));
    }
}

fn retrieval(md: &mut String, c: &Comparison) {
    let Some(analysis) = &c.retrieval else {
        return;
    };
    md.push_str("## Retrieval Analysis\n\n");
    if let Some(counts) = &analysis.baseline {
        chunk_table(md, "Baseline most-retrieved chunks", counts, analysis.baseline_failures);
    }
    if let Some(counts) = &analysis.candidate {
        chunk_table(md, "Candidate most-retrieved chunks", counts, analysis.candidate_failures);
    }
}

fn methodology(md: &mut String, c: &Comparison) {
    md.push_str("## Methodology\n\n");
    md.push_str(&format!(
        "- Library: baseline `{}` (`{}`), candidate `{}` (`{}`){}\n",
        c.baseline.library_version,
        short(&c.baseline.library_fingerprint),
        c.candidate.library_version,
        short(&c.candidate.library_fingerprint),
        if c.library_changed() {
            "; the scenario library changed between runs"
        } else {
            ""
        }
    ));
    md.push_str(&format!(
        "- Judge: baseline `{}`, candidate `{}`\n",
        c.baseline.judge_model, c.candidate.judge_model
    ));
    md.push_str(&format!(
        "- Scenarios are joined by id; deltas use the shared subset only. Thresholds: IMPROVED above {:+.0} pp, REGRESSION below {:+.0} pp, otherwise EXCELLENT at {:.0}% or more, GOOD at {:.0}% or more, else NEEDS-WORK.\n",
        classify::IMPROVED_THRESHOLD,
        classify::REGRESSION_THRESHOLD,
        classify::EXCELLENT_THRESHOLD,
        classify::GOOD_THRESHOLD
    ));
    md.push_str(
        "- Scenarios with a generation error on either side are labelled from the candidate score only.\n",
    );
    md.push_str(&format!("- New scenarios (candidate only): {}\n", id_list(&c.new_ids)));
    md.push_str(&format!("- Dropped scenarios (baseline only): {}\n", id_list(&c.dropped_ids)));
    md.push_str(&format!("- Ungraded scenarios (no checks): {}\n\n", id_list(&c.ungraded_ids)));
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

fn conclusion(md: &mut String, c: &Comparison) {
    md.push_str("## Conclusion\n\n");
    match c.shared_delta() {
        Some(d) if d > 0.0 => md.push_str(&format!(
            "`{}` improves on `{}` by {:.1} pp across {} shared scenarios.",
            c.candidate.label,
            c.baseline.label,
            d,
            c.rows.len()
        )),
        Some(d) if d < 0.0 => md.push_str(&format!(
            "`{}` trails `{}` by {:.1} pp across {} shared scenarios.",
            c.candidate.label,
            c.baseline.label,
            -d,
            c.rows.len()
        )),
        Some(_) => md.push_str(&format!(
            "`{}` matches `{}` across {} shared scenarios.",
            c.candidate.label,
            c.baseline.label,
            c.rows.len()
        )),
        None => md.push_str("The runs share no graded scenarios."),
    }
    md.push_str(&format!(
        " {} improved, {} regressed.",
        c.count(Classification::Improved),
        c.count(Classification::Regression)
    ));

    let critical_regressions: Vec<String> = c
        .regressions
        .iter()
        .filter(|r| Category::from_name(&r.category).is_some_and(Category::is_critical))
        .map(|r| format!("`{}`", r.id))
        .collect();
    if !critical_regressions.is_empty() {
        md.push_str(&format!(
            " Regressions in critical areas: {}.",
            critical_regressions.join(", ")
        ));
    }
    if let Some(new_pct) = c.new_subset.pct() {
        md.push_str(&format!(
            " On {} new scenarios the candidate scored {:.1}%, reported separately.",
            c.new_ids.len(),
            new_pct
        ));
    }
    md.push('\n');
}
