//! # Coach Eval - offline evaluation for a fine-tuned coaching assistant
//!
//! Runs a fixed library of domain scenarios through a model configuration,
//! grades every response against per-scenario checks with an LLM judge, and
//! compares two graded runs into a markdown report.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coach_eval_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = HarnessConfig::load()?;
//!     let library = ScenarioLibrary::builtin();
//!
//!     let run = config.run_config("finetune")?;
//!     let generator = LLMProviderFactory::create(&config.generation_for(&run), config.timeouts.generation)?;
//!     let artifact = Collector::new(generator).collect(&run, &library).await?;
//!
//!     let judge = LLMProviderFactory::create(&config.judge.provider_config(), config.timeouts.judge)?;
//!     let grader = Grader::new(judge, GraderConfig::from_judge(&config.judge, config.timeouts.judge));
//!     let graded = grader.grade_run(&artifact).await?;
//!     graded.save(graded.default_path(&config.output_dir))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Phases
//!
//! - **Collect** ([`collector`]): one generation per scenario, optionally with
//!   hybrid retrieval from a knowledge store; failures are recorded per record.
//! - **Grade** ([`grader`]): one judge call per scenario, bounded repair and
//!   retries, deterministic all-FAIL fallback.
//! - **Compare** ([`report`]): joins runs by scenario id and classifies deltas.
//!
//! ## Feature Flags
//!
//! - `llm-openai`: OpenAI-compatible chat completions provider
//! - `llm-anthropic`: Anthropic Messages API provider

pub mod artifact;
pub mod collector;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod grader;
pub mod knowledge;
pub mod llm;
pub mod metrics;
pub mod parsing;
pub mod report;
pub mod scenarios;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::artifact::{
        GradedResult, GradedRunArtifact, GradingSummary, ResponseRecord, RunArtifact, RunHeader,
        RunSummary,
    };
    pub use crate::collector::{Collector, RetrievalConfig, RunConfig, SamplingConfig};
    pub use crate::config::{
        EmbeddingsConfig, HarnessConfig, JudgeConfig, KnowledgeConfig, LLMProviderConfig,
        LLMProviderKind, TimeoutConfig,
    };
    pub use crate::embeddings::{EmbeddingProvider, EmbeddingProviderFactory, HashingEmbeddings};
    pub use crate::error::{EvalError, Result};
    pub use crate::grader::{CheckGrade, Grader, GraderConfig, ScenarioGrade, Verdict};
    pub use crate::knowledge::{
        InMemoryKnowledgeStore, KnowledgeChunk, KnowledgeStore, KnowledgeStoreFactory,
    };
    pub use crate::llm::{
        LLMConfig, LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, ScriptedLLMProvider,
        ScriptedReply, TokenUsage,
    };
    pub use crate::metrics::LLMCostCalculator;
    pub use crate::parsing::{JsonParser, OutputParser, ParseError};
    pub use crate::report::{Classification, Comparison, ComparisonReport, compare};
    pub use crate::scenarios::{Category, Provenance, Scenario, ScenarioLibrary};
}
