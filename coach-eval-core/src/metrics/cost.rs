//! LLM cost calculation

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::llm::{ModelInfo, TokenUsage};

/// USD per 1M tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (usage.prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Fallback when neither the model nor its provider is priced
const UNKNOWN_MODEL: ModelPricing = ModelPricing::new(1.0, 2.0);

/// Rate card keyed by `provider:model`.
///
/// Lookup order: exact key, fine-tuned base (`ft:<base>:...` priced as
/// `provider:ft:<base>`), longest key that prefixes the model (dated
/// snapshots), `provider:*`, then a flat default.
/// Prices are approximate and may vary by region/time.
pub struct LLMCostCalculator {
    pricing: HashMap<String, ModelPricing>,
}

impl LLMCostCalculator {
    /// Create a new cost calculator with default pricing
    pub fn new() -> Self {
        let mut pricing = HashMap::new();

        // OpenAI
        pricing.insert("openai:gpt-4o".to_string(), ModelPricing::new(2.5, 10.0));
        pricing.insert("openai:gpt-4o-mini".to_string(), ModelPricing::new(0.15, 0.6));
        pricing.insert("openai:gpt-4.1".to_string(), ModelPricing::new(2.0, 8.0));
        pricing.insert("openai:gpt-4.1-mini".to_string(), ModelPricing::new(0.4, 1.6));
        // Fine-tuned inference is billed at a premium over the base model
        pricing.insert("openai:ft:gpt-4o-mini".to_string(), ModelPricing::new(0.3, 1.2));
        pricing.insert("openai:ft:gpt-4o".to_string(), ModelPricing::new(3.75, 15.0));
        pricing.insert("openai:ft:gpt-4.1-mini".to_string(), ModelPricing::new(0.8, 3.2));

        // Anthropic
        pricing.insert("anthropic:claude-sonnet-4".to_string(), ModelPricing::new(3.0, 15.0));
        pricing.insert("anthropic:claude-3-5-sonnet".to_string(), ModelPricing::new(3.0, 15.0));
        pricing.insert("anthropic:claude-3-5-haiku".to_string(), ModelPricing::new(0.8, 4.0));
        pricing.insert("anthropic:claude-opus-4".to_string(), ModelPricing::new(15.0, 75.0));

        // Offline providers
        pricing.insert("scripted:*".to_string(), ModelPricing::new(0.0, 0.0));

        Self { pricing }
    }

    /// Default rate card with `provider:model` overrides applied
    pub fn with_overrides(overrides: &BTreeMap<String, ModelPricing>) -> Self {
        let mut calculator = Self::new();
        for (key, pricing) in overrides {
            calculator.pricing.insert(key.clone(), *pricing);
        }
        calculator
    }

    /// Resolve the rate applying to a model
    pub fn pricing_for(&self, provider: &str, model: &str) -> ModelPricing {
        let exact = format!("{}:{}", provider, model);
        if let Some(pricing) = self.pricing.get(&exact) {
            return *pricing;
        }

        let normalized = match model.strip_prefix("ft:") {
            Some(rest) => format!("ft:{}", rest.split(':').next().unwrap_or(rest)),
            None => model.to_string(),
        };
        let key = format!("{}:{}", provider, normalized);
        if let Some(pricing) = self.pricing.get(&key) {
            return *pricing;
        }

        let best_prefix = self
            .pricing
            .iter()
            .filter(|(candidate, _)| !candidate.ends_with(":*") && key.starts_with(candidate.as_str()))
            .max_by_key(|(candidate, _)| candidate.len());
        if let Some((_, pricing)) = best_prefix {
            return *pricing;
        }

        self.pricing
            .get(&format!("{}:*", provider))
            .copied()
            .unwrap_or(UNKNOWN_MODEL)
    }

    /// Calculate cost for token usage
    pub fn calculate_cost(&self, model_info: &ModelInfo, usage: &TokenUsage) -> f64 {
        self.pricing_for(&model_info.provider, &model_info.model_name)
            .cost(usage)
    }

    /// Add or update pricing for a model
    pub fn set_pricing(
        &mut self,
        provider: &str,
        model: &str,
        input_cost_per_million: f64,
        output_cost_per_million: f64,
    ) {
        let key = format!("{}:{}", provider, model);
        self.pricing.insert(
            key,
            ModelPricing::new(input_cost_per_million, output_cost_per_million),
        );
    }
}

impl Default for LLMCostCalculator {
    fn default() -> Self {
        Self::new()
    }
}
