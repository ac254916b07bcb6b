//! Token cost accounting for run and grading summaries

pub mod cost;

pub use cost::{LLMCostCalculator, ModelPricing};
