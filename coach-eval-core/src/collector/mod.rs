//! Response collection
//!
//! Runs every scenario of a library against the model under test and records
//! what came back. Failures inside the loop become data on the record; they
//! never stop the run.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::artifact::{ResponseRecord, RetrievalRecord, RunArtifact, RunHeader, RunSummary};
use crate::config::TimeoutConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{EvalError, Result};
use crate::knowledge::{HybridQuery, KnowledgeStore, NO_KNOWLEDGE_SENTINEL, format_context};
use crate::llm::{LLMConfig, LLMProvider, LLMRequest, TokenUsage};
use crate::metrics::LLMCostCalculator;
use crate::scenarios::{Provenance, Scenario, ScenarioLibrary};

pub mod prompt;

use prompt::CONTEXT_SLOT;

/// Hybrid retrieval parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub full_text_weight: f64,
    pub semantic_weight: f64,
    pub rrf_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            full_text_weight: 1.0,
            semantic_weight: 1.0,
            rrf_k: 50,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(EvalError::Configuration("retrieval.top_k must be positive".to_string()));
        }
        if self.rrf_k == 0 {
            return Err(EvalError::Configuration("retrieval.rrf_k must be positive".to_string()));
        }
        if self.full_text_weight < 0.0 || self.semantic_weight < 0.0 {
            return Err(EvalError::Configuration(
                "retrieval weights must not be negative".to_string(),
            ));
        }
        if self.full_text_weight == 0.0 && self.semantic_weight == 0.0 {
            return Err(EvalError::Configuration(
                "at least one retrieval weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sampling settings for the model under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl SamplingConfig {
    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig::new()
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

/// Everything that defines one collection pass
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub label: String,
    pub model: String,
    /// Static prompt, or a template containing `{retrieved_context}` when
    /// retrieval is enabled
    pub system_prompt: String,
    pub retrieval: Option<RetrievalConfig>,
    pub sampling: SamplingConfig,
    pub pacing: Duration,
    pub max_prompt_chars: Option<usize>,
}

impl RunConfig {
    pub fn new(label: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            model: model.into(),
            system_prompt: prompt::DEFAULT_SYSTEM_PROMPT.to_string(),
            retrieval: None,
            sampling: SamplingConfig::default(),
            pacing: Duration::from_millis(300),
            max_prompt_chars: None,
        }
    }

    /// Enable retrieval with the default context-slot prompt
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = Some(retrieval);
        if !self.system_prompt.contains(CONTEXT_SLOT) {
            self.system_prompt = prompt::DEFAULT_RAG_SYSTEM_PROMPT.to_string();
        }
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_max_prompt_chars(mut self, max_chars: usize) -> Self {
        self.max_prompt_chars = Some(max_chars);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(EvalError::Configuration(format!(
                "run '{}' has no model",
                self.label
            )));
        }
        match &self.retrieval {
            Some(retrieval) => {
                retrieval.validate()?;
                if !self.system_prompt.contains(CONTEXT_SLOT) {
                    return Err(EvalError::Configuration(format!(
                        "run '{}' enables retrieval but its system prompt has no {} slot",
                        self.label, CONTEXT_SLOT
                    )));
                }
            }
            None => {
                if self.system_prompt.contains(CONTEXT_SLOT) {
                    return Err(EvalError::Configuration(format!(
                        "run '{}' has a {} slot but retrieval is disabled",
                        self.label, CONTEXT_SLOT
                    )));
                }
            }
        }
        if self.max_prompt_chars == Some(0) {
            return Err(EvalError::Configuration(
                "max_prompt_chars must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Embedder and store used by retrieval-enabled runs
#[derive(Clone)]
pub struct Retriever {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn KnowledgeStore>,
}

struct Retrieved {
    context: String,
    chunk_ids: Vec<String>,
    error: Option<String>,
}

/// Collects responses for a run
pub struct Collector {
    generator: Arc<dyn LLMProvider>,
    retriever: Option<Retriever>,
    timeouts: TimeoutConfig,
    concurrency: usize,
    costs: LLMCostCalculator,
}

impl Collector {
    pub fn new(generator: Arc<dyn LLMProvider>) -> Self {
        Self {
            generator,
            retriever: None,
            timeouts: TimeoutConfig::default(),
            concurrency: 1,
            costs: LLMCostCalculator::new(),
        }
    }

    pub fn with_retriever(
        mut self,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        self.retriever = Some(Retriever { embedder, store });
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Scenarios in flight at once; results stay in library order
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cost_calculator(mut self, costs: LLMCostCalculator) -> Self {
        self.costs = costs;
        self
    }

    /// Collect one response per scenario, in library order.
    ///
    /// Prints one progress line per scenario to stdout.
    ///
    /// # Errors
    ///
    /// Fails before any scenario runs when the run config is invalid or
    /// retrieval is requested without a retriever. Per-scenario failures are
    /// recorded on the records instead.
    pub async fn collect(&self, run: &RunConfig, library: &ScenarioLibrary) -> Result<RunArtifact> {
        run.validate()?;
        let retrieval = match (&run.retrieval, &self.retriever) {
            (Some(config), Some(retriever)) => Some(RetrievalRecord {
                embedding_model: retriever.embedder.model_name().to_string(),
                knowledge_store: retriever.store.describe(),
                config: config.clone(),
            }),
            (Some(_), None) => {
                return Err(EvalError::Configuration(format!(
                    "run '{}' enables retrieval but no knowledge store is configured",
                    run.label
                )));
            }
            (None, _) => None,
        };

        let total = library.len();
        tracing::info!(
            run = %run.label,
            model = %run.model,
            scenarios = total,
            retrieval = retrieval.is_some(),
            concurrency = self.concurrency,
            "starting collection"
        );

        let mut results = Vec::with_capacity(total);
        let mut usage = TokenUsage::default();
        // Paced on the source stream: request starts are spaced across all workers
        let pacing = run.pacing;
        let pending = stream::iter(library.iter().enumerate())
            .then(move |(index, scenario)| async move {
                if index > 0 && !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
                scenario
            })
            .map(|scenario| self.collect_one(run, scenario))
            .buffered(self.concurrency);
        let mut pending = std::pin::pin!(pending);

        while let Some(record) = pending.next().await {
            println!("{}", progress_line(results.len() + 1, total, &record));
            usage += TokenUsage::new(record.tokens_in, record.tokens_out);
            results.push(record);
        }

        let cost = self.costs.calculate_cost(&self.generator.model_info(), &usage);
        let summary = RunSummary::from_records(&results, cost);
        tracing::info!(
            run = %run.label,
            errors = summary.errors,
            retrieval_failures = summary.retrieval_failures,
            tokens_out = summary.tokens_out,
            "collection finished"
        );

        Ok(RunArtifact {
            header: RunHeader {
                run_id: Uuid::new_v4(),
                label: run.label.clone(),
                model: run.model.clone(),
                system_prompt: run.system_prompt.clone(),
                retrieval,
                sampling: run.sampling.clone(),
                pacing: run.pacing,
                library_version: library.version().to_string(),
                library_fingerprint: library.fingerprint(),
                timestamp: Utc::now(),
                total_scenarios: total,
            },
            results,
            summary,
        })
    }

    async fn collect_one(&self, run: &RunConfig, scenario: &Scenario) -> ResponseRecord {
        let (user_prompt, prompt_truncated) = match run.max_prompt_chars {
            Some(limit) => prompt::truncate_chars(&scenario.prompt, limit),
            None => (scenario.prompt.clone(), false),
        };

        let (system_prompt, retrieved) = match (&run.retrieval, &self.retriever) {
            (Some(config), Some(retriever)) => {
                let retrieved = self.retrieve(retriever, config, &scenario.id, &user_prompt).await;
                (prompt::render(&run.system_prompt, &retrieved.context), Some(retrieved))
            }
            _ => (run.system_prompt.clone(), None),
        };

        let request = LLMRequest::with_system_prompt(system_prompt, user_prompt.clone())
            .sampled(&run.sampling.llm_config());

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeouts.generation,
            self.generator.generate_request(&request),
        )
        .await;
        let latency_seconds = started.elapsed().as_secs_f64();

        let (response, usage, error) = match outcome {
            Ok(Ok(reply)) => (reply.content, reply.usage.unwrap_or_default(), String::new()),
            Ok(Err(e)) => (String::new(), TokenUsage::default(), e.to_string()),
            Err(_) => (
                String::new(),
                TokenUsage::default(),
                EvalError::timeout("generation", self.timeouts.generation).to_string(),
            ),
        };

        if !error.is_empty() {
            tracing::warn!(scenario = %scenario.id, error = %error, "generation failed");
        } else {
            tracing::debug!(
                scenario = %scenario.id,
                latency_ms = (latency_seconds * 1000.0) as u64,
                "generation complete"
            );
        }

        let (retrieved_chunks, retrieval_error) = match retrieved {
            Some(r) => (Some(r.chunk_ids), r.error),
            None => (None, None),
        };

        ResponseRecord {
            id: scenario.id.clone(),
            category: scenario.category.to_string(),
            prompt: user_prompt,
            checks: scenario.checks.clone(),
            response,
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
            latency_seconds,
            error,
            is_new_scenario: scenario.provenance == Provenance::RegressionTarget,
            retrieved_chunks,
            retrieval_error,
            prompt_truncated,
        }
    }

    async fn retrieve(
        &self,
        retriever: &Retriever,
        config: &RetrievalConfig,
        scenario_id: &str,
        text: &str,
    ) -> Retrieved {
        let attempt = async {
            let embedding = tokio::time::timeout(
                self.timeouts.embedding,
                retriever.embedder.embed(text),
            )
            .await
            .map_err(|_| EvalError::timeout("embedding", self.timeouts.embedding))??;

            let query = HybridQuery {
                text: text.to_string(),
                embedding,
                top_k: config.top_k,
                full_text_weight: config.full_text_weight,
                semantic_weight: config.semantic_weight,
                rrf_k: config.rrf_k,
            };

            let chunks = tokio::time::timeout(
                self.timeouts.retrieval,
                retriever.store.hybrid_search(&query),
            )
            .await
            .map_err(|_| EvalError::timeout("retrieval", self.timeouts.retrieval))??;
            Ok::<_, EvalError>(chunks)
        };

        match attempt.await {
            Ok(chunks) => {
                tracing::debug!(scenario = %scenario_id, chunks = chunks.len(), "retrieved context");
                Retrieved {
                    context: format_context(&chunks),
                    chunk_ids: chunks.into_iter().map(|c| c.id).collect(),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(scenario = %scenario_id, error = %e, "retrieval failed, continuing without context");
                Retrieved {
                    context: NO_KNOWLEDGE_SENTINEL.to_string(),
                    chunk_ids: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// `[ 3/31] race-facts-sled-distance (Race Facts) tokens_out=182 latency=2.41s`
fn progress_line(position: usize, total: usize, record: &ResponseRecord) -> String {
    let width = total.to_string().len();
    let mut line = format!(
        "[{:>width$}/{}] {} ({}) tokens_out={} latency={:.2}s",
        position,
        total,
        record.id,
        record.category,
        record.tokens_out,
        record.latency_seconds,
        width = width
    );
    if record.has_error() {
        line.push_str(&format!(" ERROR: {}", record.error));
    }
    if record.retrieval_error.is_some() {
        line.push_str(" (retrieval failed)");
    }
    line
}
