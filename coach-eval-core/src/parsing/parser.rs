//! Parser trait and error types

use thiserror::Error;

/// Why a model reply could not be turned into structured output
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty input")]
    EmptyInput,

    /// No structure of the requested shape in the input
    #[error("No JSON {0} found in output")]
    NotFound(&'static str),

    #[error("Failed to repair malformed output: {0}")]
    RepairFailed(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Turns raw model text into a typed value
pub trait OutputParser: Send + Sync {
    type Output;

    fn parse(&self, raw: &str) -> ParseResult<Self::Output>;
}
