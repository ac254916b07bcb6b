//! Configuration types for the evaluation harness

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::collector::{RetrievalConfig, RunConfig, SamplingConfig, prompt};
use crate::error::{EvalError, Result};
use crate::metrics::ModelPricing;

/// Default config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "coach-eval.toml";

/// Environment variable naming an additional config file
pub const CONFIG_PATH_ENV: &str = "COACH_EVAL_CONFIG_PATH";

/// Prefix for environment overrides (`COACH_EVAL_JUDGE__MODEL=...`)
pub const ENV_PREFIX: &str = "COACH_EVAL_";

/// Top-level harness configuration.
///
/// Read once at startup and treated as immutable for the rest of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory receiving run artifacts, graded artifacts and reports
    pub output_dir: PathBuf,

    /// Provider serving the model under test
    pub generation: LLMProviderConfig,

    /// Provider and retry policy for the grading judge
    pub judge: JudgeConfig,

    /// Embedding service used by retrieval-enabled runs
    pub embeddings: EmbeddingsConfig,

    /// Knowledge store used by retrieval-enabled runs
    pub knowledge: KnowledgeConfig,

    /// Bounds on every external call
    pub timeouts: TimeoutConfig,

    /// Scenarios processed in parallel (1 = sequential)
    pub concurrency: usize,

    /// Minimum spacing between scenario starts, across all workers
    #[serde(with = "humantime_serde")]
    pub pacing: Duration,

    /// Named run presets, selected with `--run <label>`
    pub runs: BTreeMap<String, RunPreset>,

    /// Rate card overrides keyed by `provider:model`
    pub pricing: BTreeMap<String, ModelPricing>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut runs = BTreeMap::new();
        runs.insert("finetune".to_string(), RunPreset::default());
        runs.insert(
            "finetune-rag".to_string(),
            RunPreset {
                retrieval: Some(RetrievalConfig::default()),
                ..RunPreset::default()
            },
        );

        Self {
            output_dir: PathBuf::from("./eval-output"),
            generation: LLMProviderConfig::default(),
            judge: JudgeConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            knowledge: KnowledgeConfig::default(),
            timeouts: TimeoutConfig::default(),
            concurrency: 1,
            pacing: Duration::from_millis(300),
            runs,
            pricing: BTreeMap::new(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProviderKind,

    /// Model name
    pub model: String,

    /// API key (prefer the provider's environment variable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL for compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for LLMProviderConfig {
    fn default() -> Self {
        Self {
            provider: LLMProviderKind::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProviderKind {
    OpenAI,
    Anthropic,
}

impl LLMProviderKind {
    /// Environment variable holding this provider's API key
    pub fn api_key_env(self) -> &'static str {
        match self {
            LLMProviderKind::OpenAI => "OPENAI_API_KEY",
            LLMProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LLMProviderKind::OpenAI => "openai",
            LLMProviderKind::Anthropic => "anthropic",
        }
    }
}

/// Judge model and its retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    pub provider: LLMProviderKind,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Judge calls per scenario before the all-FAIL fallback (at least 2)
    pub max_attempts: usize,

    /// Delay between judge attempts
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Output token limit for a verdict list
    pub max_tokens: usize,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: LLMProviderKind::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            base_url: None,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            max_tokens: 1024,
        }
    }
}

impl JudgeConfig {
    /// Provider settings for the factory
    pub fn provider_config(&self) -> LLMProviderConfig {
        LLMProviderConfig {
            provider: self.provider,
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint
    OpenAI,
    /// Local feature hashing, no network
    Hashing,
}

/// Embeddings configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub dimension: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAI,
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: None,
            dimension: 1536,
        }
    }
}

/// Knowledge store location: a hybrid-search RPC endpoint or a local chunk file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Base URL of the PostgREST-style service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// RPC function name performing hybrid search
    pub function: String,

    /// Service key; falls back to `KNOWLEDGE_STORE_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// JSON chunk file for the in-memory store (takes precedence over `url`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_path: Option<PathBuf>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            url: None,
            function: "hybrid_search".to_string(),
            api_key: None,
            chunks_path: None,
        }
    }
}

impl KnowledgeConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.chunks_path.is_some()
    }
}

/// Timeouts for external calls
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    #[serde(with = "humantime_serde")]
    pub generation: Duration,
    #[serde(with = "humantime_serde")]
    pub embedding: Duration,
    #[serde(with = "humantime_serde")]
    pub retrieval: Duration,
    #[serde(with = "humantime_serde")]
    pub judge: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation: Duration::from_secs(120),
            embedding: Duration::from_secs(30),
            retrieval: Duration::from_secs(30),
            judge: Duration::from_secs(120),
        }
    }
}

/// A named run: which model, which prompt, with or without retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunPreset {
    /// Model id; defaults to `generation.model`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System prompt or template; defaults to the built-in coach prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalConfig>,

    pub sampling: SamplingConfig,

    /// Overrides the harness-wide pacing
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub pacing: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prompt_chars: Option<usize>,
}

impl Default for RunPreset {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            retrieval: None,
            sampling: SamplingConfig::default(),
            pacing: None,
            max_prompt_chars: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Defaults
    /// 2. `coach-eval.toml` in the working directory
    /// 3. The file named by `COACH_EVAL_CONFIG_PATH` (TOML, or YAML by extension)
    /// 4. `COACH_EVAL_*` environment variables, nested keys split on `__`
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is invalid or validation fails.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml, Yaml},
        };

        let mut figment = Figment::from(Serialized::defaults(HarnessConfig::default()))
            .merge(Toml::file(CONFIG_FILE_NAME));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = if is_yaml(Path::new(&path)) {
                figment.merge(Yaml::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["config_path"])
                .split("__"),
        );

        let config: HarnessConfig = figment.extract().map_err(|e| {
            EvalError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml, Yaml},
        };

        let path = path.as_ref();
        let figment = Figment::from(Serialized::defaults(HarnessConfig::default()));
        let figment = if is_yaml(path) {
            figment.merge(Yaml::file(path))
        } else {
            figment.merge(Toml::file(path))
        };

        let config: HarnessConfig = figment.extract().map_err(|e| {
            EvalError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first inconsistent setting.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(EvalError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.judge.max_attempts < 2 {
            return Err(EvalError::Configuration(format!(
                "judge.max_attempts must be at least 2 (got {})",
                self.judge.max_attempts
            )));
        }
        if self.embeddings.dimension == 0 {
            return Err(EvalError::Configuration(
                "embeddings.dimension must be positive".to_string(),
            ));
        }
        for (label, preset) in &self.runs {
            if let Some(retrieval) = &preset.retrieval {
                retrieval.validate().map_err(|e| {
                    EvalError::Configuration(format!("runs.{}: {}", label, e))
                })?;
            }
        }
        Ok(())
    }

    /// Resolve a named preset into a concrete [`RunConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown label, or when a retrieval run has no
    /// knowledge store or a prompt without the context slot.
    pub fn run_config(&self, label: &str) -> Result<RunConfig> {
        let preset = self.runs.get(label).ok_or_else(|| {
            let known: Vec<&str> = self.runs.keys().map(String::as_str).collect();
            EvalError::Configuration(format!(
                "Unknown run '{}' (configured: {})",
                label,
                known.join(", ")
            ))
        })?;

        if preset.retrieval.is_some() && !self.knowledge.is_configured() {
            return Err(EvalError::Configuration(format!(
                "run '{}' enables retrieval but knowledge.url / knowledge.chunks_path is not set",
                label
            )));
        }

        let system_prompt = preset.system_prompt.clone().unwrap_or_else(|| {
            if preset.retrieval.is_some() {
                prompt::DEFAULT_RAG_SYSTEM_PROMPT.to_string()
            } else {
                prompt::DEFAULT_SYSTEM_PROMPT.to_string()
            }
        });

        let run = RunConfig {
            label: label.to_string(),
            model: preset
                .model
                .clone()
                .unwrap_or_else(|| self.generation.model.clone()),
            system_prompt,
            retrieval: preset.retrieval.clone(),
            sampling: preset.sampling.clone(),
            pacing: preset.pacing.unwrap_or(self.pacing),
            max_prompt_chars: preset.max_prompt_chars,
        };
        run.validate()?;
        Ok(run)
    }

    /// Provider settings for generation under a specific model id
    pub fn generation_for(&self, run: &RunConfig) -> LLMProviderConfig {
        LLMProviderConfig {
            model: run.model.clone(),
            ..self.generation.clone()
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pacing, Duration::from_millis(300));
        assert_eq!(config.timeouts.generation, Duration::from_secs(120));
        assert_eq!(config.timeouts.embedding, Duration::from_secs(30));
        assert!(config.runs.contains_key("finetune"));
        assert!(config.runs.contains_key("finetune-rag"));
    }

    #[test]
    fn test_from_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
output_dir = "/tmp/evals"
concurrency = 4
pacing = "1s"

[judge]
model = "claude-opus"
retry_delay = "250ms"

[runs.v2]
model = "ft:gpt-4o-mini-2024-07-18:coach::v2"

[runs.v2.sampling]
temperature = 0.2
max_tokens = 600
"#
        )
        .unwrap();

        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/evals"));
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.pacing, Duration::from_secs(1));
        assert_eq!(config.judge.model, "claude-opus");
        assert_eq!(config.judge.max_attempts, 3);
        assert_eq!(config.judge.retry_delay, Duration::from_millis(250));

        let run = config.run_config("v2").unwrap();
        assert_eq!(run.model, "ft:gpt-4o-mini-2024-07-18:coach::v2");
        assert_eq!(run.sampling.max_tokens, 600);
        assert_eq!(run.pacing, Duration::from_secs(1));
        assert!(run.retrieval.is_none());
    }

    #[test]
    fn test_judge_attempts_lower_bound() {
        let mut config = HarnessConfig::default();
        config.judge.max_attempts = 1;
        assert!(matches!(
            config.validate(),
            Err(EvalError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_run_label() {
        let config = HarnessConfig::default();
        let err = config.run_config("nope").unwrap_err();
        assert!(err.to_string().contains("finetune"));
    }

    #[test]
    fn test_retrieval_run_requires_knowledge_store() {
        let mut config = HarnessConfig::default();
        assert!(config.run_config("finetune-rag").is_err());

        config.knowledge.chunks_path = Some(PathBuf::from("chunks.json"));
        let run = config.run_config("finetune-rag").unwrap();
        assert!(run.retrieval.is_some());
        assert!(run.system_prompt.contains(prompt::CONTEXT_SLOT));
    }

    #[test]
    fn test_yaml_detection() {
        assert!(is_yaml(Path::new("conf.yaml")));
        assert!(is_yaml(Path::new("conf.yml")));
        assert!(!is_yaml(Path::new("conf.toml")));
    }
}
