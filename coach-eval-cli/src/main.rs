//! Coach Eval CLI - collect, grade and compare evaluation runs

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use coach_eval_core::artifact::{GradedRunArtifact, RunArtifact};
use coach_eval_core::collector::{Collector, RunConfig};
use coach_eval_core::config::HarnessConfig;
use coach_eval_core::embeddings::EmbeddingProviderFactory;
use coach_eval_core::grader::{Grader, GraderConfig};
use coach_eval_core::knowledge::KnowledgeStoreFactory;
use coach_eval_core::llm::LLMProviderFactory;
use coach_eval_core::metrics::LLMCostCalculator;
use coach_eval_core::report::{self, Classification};
use coach_eval_core::scenarios::{Category, Provenance, ScenarioLibrary};

#[derive(Parser)]
#[command(name = "coach-eval")]
#[command(about = "Offline evaluation harness for a fine-tuned coaching assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or YAML) used instead of coach-eval.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for artifacts and reports (overrides output_dir)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the scenario library
    Scenarios {
        /// Only this category (display name or snake_case)
        #[arg(long)]
        category: Option<String>,
        /// Only this provenance (baseline, regression_target)
        #[arg(long)]
        provenance: Option<String>,
        /// Scenario file instead of the built-in library
        #[arg(long)]
        scenarios: Option<PathBuf>,
    },
    /// Generate one response per scenario for a configured run
    Collect {
        /// Run preset label from the configuration
        #[arg(long)]
        run: String,
        /// Scenario file instead of the built-in library
        #[arg(long)]
        scenarios: Option<PathBuf>,
        /// Artifact path (default: <output_dir>/run-<label>-<time>-<id>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Grade a run artifact with the judge model
    Grade {
        /// Run artifact produced by `collect`
        artifact: PathBuf,
        /// Fail on scenarios that have no checks
        #[arg(long)]
        strict: bool,
        /// Graded artifact path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare two graded run artifacts
    Compare {
        baseline: PathBuf,
        candidate: PathBuf,
        /// Directory for the report and grades file
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Collect, grade and optionally compare against a baseline
    Run {
        #[arg(long)]
        run: String,
        #[arg(long)]
        scenarios: Option<PathBuf>,
        /// Graded baseline artifact to compare against
        #[arg(long)]
        baseline: Option<PathBuf>,
        #[arg(long)]
        strict: bool,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Progress lines and summaries own stdout; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("coach-eval {}", env!("CARGO_PKG_VERSION"));
            println!("coach-eval-core {}", coach_eval_core::VERSION);
            println!(
                "scenario library {}",
                coach_eval_core::scenarios::LIBRARY_VERSION
            );
        }
        Commands::Scenarios {
            category,
            provenance,
            scenarios,
        } => {
            let library = load_library(scenarios.as_deref())?;
            list_scenarios(&library, category.as_deref(), provenance.as_deref())?;
        }
        Commands::Collect {
            run,
            scenarios,
            out,
        } => {
            let config = load_config(cli.config.as_deref(), cli.output_dir)?;
            let library = load_library(scenarios.as_deref())?;
            let (run, collector) = build_collector(&config, &run)?;
            let artifact = collector.collect(&run, &library).await?;
            let path = out.unwrap_or_else(|| artifact.default_path(&config.output_dir));
            artifact
                .save(&path)
                .with_context(|| format!("Failed to write run artifact {}", path.display()))?;
            print_run_summary(&artifact, &path);
        }
        Commands::Grade {
            artifact,
            strict,
            out,
        } => {
            let config = load_config(cli.config.as_deref(), cli.output_dir)?;
            let run = RunArtifact::load(&artifact)
                .with_context(|| format!("Failed to read run artifact {}", artifact.display()))?;
            let grader = build_grader(&config, strict)?;
            let graded = grader.grade_run(&run).await?;
            let path = out.unwrap_or_else(|| graded.default_path(&config.output_dir));
            graded
                .save(&path)
                .with_context(|| format!("Failed to write graded artifact {}", path.display()))?;
            print_grading_summary(&graded, &path);
        }
        Commands::Compare {
            baseline,
            candidate,
            out_dir,
        } => {
            let config = load_config(cli.config.as_deref(), cli.output_dir)?;
            let out_dir = out_dir.unwrap_or(config.output_dir);
            ensure_writable(&out_dir)?;
            let baseline = load_graded(&baseline, "baseline")?;
            let candidate = load_graded(&candidate, "candidate")?;
            compare(&baseline, &candidate, &out_dir)?;
        }
        Commands::Run {
            run,
            scenarios,
            baseline,
            strict,
        } => {
            let config = load_config(cli.config.as_deref(), cli.output_dir)?;
            let library = load_library(scenarios.as_deref())?;
            run_pipeline(&config, &run, &library, baseline.as_deref(), strict).await?;
        }
    }

    Ok(())
}

/// Load and validate configuration, then make sure the output directory is usable
fn load_config(path: Option<&Path>, output_dir: Option<PathBuf>) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file {} does not exist", path.display());
            }
            HarnessConfig::from_file(path)
        }
        None => HarnessConfig::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    ensure_writable(&config.output_dir)?;
    Ok(config)
}

fn ensure_writable(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create output directory {}", dir.display()))?;
    let probe = dir.join(".coach-eval-write-check");
    std::fs::write(&probe, b"")
        .with_context(|| format!("Output directory {} is not writable", dir.display()))?;
    std::fs::remove_file(&probe).ok();
    Ok(())
}

fn load_library(path: Option<&Path>) -> Result<ScenarioLibrary> {
    match path {
        Some(path) => ScenarioLibrary::from_file(path)
            .with_context(|| format!("Failed to load scenarios from {}", path.display())),
        None => Ok(ScenarioLibrary::builtin()),
    }
}

fn list_scenarios(
    library: &ScenarioLibrary,
    category: Option<&str>,
    provenance: Option<&str>,
) -> Result<()> {
    let category = category
        .map(|name| {
            Category::from_name(name).with_context(|| format!("Unknown category '{}'", name))
        })
        .transpose()?;
    let provenance = provenance
        .map(|name| {
            Provenance::from_name(name).with_context(|| format!("Unknown provenance '{}'", name))
        })
        .transpose()?;

    let selected = library.filtered(|s| {
        category.is_none_or(|c| s.category == c) && provenance.is_none_or(|p| s.provenance == p)
    });

    println!(
        "Scenario library {} ({}), {} of {} scenarios",
        library.version(),
        &library.fingerprint()[..12],
        selected.len(),
        library.len()
    );
    for scenario in selected.iter() {
        println!(
            "{:<40} {:<22} {:>2} checks{}",
            scenario.id,
            scenario.category.display_name(),
            scenario.checks.len(),
            if scenario.provenance == Provenance::RegressionTarget {
                "  [regression target]"
            } else {
                ""
            }
        );
    }
    Ok(())
}

/// Collect, grade and optionally compare. Every provider and input is
/// resolved before the first scenario is sent.
async fn run_pipeline(
    config: &HarnessConfig,
    label: &str,
    library: &ScenarioLibrary,
    baseline: Option<&Path>,
    strict: bool,
) -> Result<()> {
    let (run, collector) = build_collector(config, label)?;
    let grader = build_grader(config, strict)?;
    let baseline = baseline
        .map(|path| load_graded(path, "baseline"))
        .transpose()?;

    let artifact = collector.collect(&run, library).await?;
    let run_path = artifact.default_path(&config.output_dir);
    artifact
        .save(&run_path)
        .with_context(|| format!("Failed to write run artifact {}", run_path.display()))?;
    print_run_summary(&artifact, &run_path);

    let graded = grader.grade_run(&artifact).await?;
    let graded_path = graded.default_path(&config.output_dir);
    graded
        .save(&graded_path)
        .with_context(|| format!("Failed to write graded artifact {}", graded_path.display()))?;
    print_grading_summary(&graded, &graded_path);

    if let Some(baseline) = baseline {
        compare(&baseline, &graded, &config.output_dir)?;
    }
    Ok(())
}

fn build_collector(config: &HarnessConfig, label: &str) -> Result<(RunConfig, Collector)> {
    let run = config.run_config(label)?;
    let generator =
        LLMProviderFactory::create(&config.generation_for(&run), config.timeouts.generation)
            .context("Failed to create generation provider")?;

    let mut collector = Collector::new(generator)
        .with_timeouts(config.timeouts)
        .with_concurrency(config.concurrency)
        .with_cost_calculator(LLMCostCalculator::with_overrides(&config.pricing));

    if run.retrieval.is_some() {
        let embedder = EmbeddingProviderFactory::create(&config.embeddings, config.timeouts.embedding)
            .context("Failed to create embedding provider")?;
        let store = KnowledgeStoreFactory::create(
            &config.knowledge,
            config.timeouts.retrieval,
            embedder.dimension(),
        )
        .context("Failed to create knowledge store")?;
        collector = collector.with_retriever(embedder, store);
    }

    Ok((run, collector))
}

fn build_grader(config: &HarnessConfig, strict: bool) -> Result<Grader> {
    let judge = LLMProviderFactory::create(&config.judge.provider_config(), config.timeouts.judge)
        .context("Failed to create judge provider")?;
    Ok(Grader::new(
        judge,
        GraderConfig::from_judge(&config.judge, config.timeouts.judge)
            .strict(strict)
            .with_concurrency(config.concurrency),
    )
    .with_cost_calculator(LLMCostCalculator::with_overrides(&config.pricing)))
}

fn load_graded(path: &Path, role: &str) -> Result<GradedRunArtifact> {
    GradedRunArtifact::load(path)
        .with_context(|| format!("Failed to read {} {}", role, path.display()))
}

fn compare(baseline: &GradedRunArtifact, candidate: &GradedRunArtifact, out_dir: &Path) -> Result<()> {
    let output = report::compare(baseline, candidate)?;
    let (report_path, grades_path) = output
        .write(out_dir)
        .with_context(|| format!("Failed to write comparison into {}", out_dir.display()))?;

    let comparison = &output.comparison;
    println!();
    println!(
        "Comparison {} -> {}: shared pass rate {} -> {}",
        comparison.baseline.label,
        comparison.candidate.label,
        format_pct(comparison.shared_baseline.pct()),
        format_pct(comparison.shared_candidate.pct()),
    );
    println!(
        "  improved {}, regressed {}, new {}, dropped {}",
        comparison.count(Classification::Improved),
        comparison.count(Classification::Regression),
        comparison.new_ids.len(),
        comparison.dropped_ids.len()
    );
    println!("  report: {}", report_path.display());
    println!("  grades: {}", grades_path.display());
    Ok(())
}

fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v))
}

fn print_run_summary(artifact: &RunArtifact, path: &Path) {
    let summary = &artifact.summary;
    println!();
    println!(
        "Run {} ({}): {} scenarios, {} errors, {} retrieval failures",
        artifact.header.label,
        artifact.header.model,
        summary.scenarios,
        summary.errors,
        summary.retrieval_failures
    );
    println!(
        "  tokens in {}, out {}, mean latency {:.2}s, estimated cost ${:.4}",
        summary.tokens_in, summary.tokens_out, summary.mean_latency_seconds, summary.estimated_cost_usd
    );
    println!("  artifact: {}", path.display());
}

fn print_grading_summary(graded: &GradedRunArtifact, path: &Path) {
    let grading = &graded.grading;
    println!();
    println!(
        "Graded {} with {}: pass rate {:.1}% ({}/{} checks)",
        graded.header.label,
        graded.judge_model,
        grading.pass_rate,
        grading.passed_checks,
        grading.total_checks
    );
    println!(
        "  {} graded, {} ungraded, {} judge fallbacks; judge tokens in {}, out {}, cost ${:.4}",
        grading.graded_scenarios,
        grading.ungraded_scenarios,
        grading.grader_errors,
        grading.judge_tokens_in,
        grading.judge_tokens_out,
        grading.judge_cost_usd
    );
    println!("  artifact: {}", path.display());
}
