//! Structured Output Parsing
//!
//! Recovery of JSON from judge-model replies.
//!
//! Judge replies are supposed to be a bare JSON list, but models routinely wrap
//! them in prose or code fences, leave trailing commas, or use single quotes.
//! [`JsonParser`] extracts the first bracketed list and applies a bounded set
//! of repairs before giving up.
//!
//! # Example
//!
//! ```rust
//! use coach_eval_core::parsing::{JsonParser, OutputParser};
//!
//! let parser = JsonParser::list();
//! let value = parser.parse("Verdicts:\n[{'check': 'a', 'result': 'PASS',}]").unwrap();
//! assert_eq!(value[0]["result"], "PASS");
//! ```

mod json;
mod parser;

pub use json::JsonParser;
pub use parser::{OutputParser, ParseError, ParseResult};
