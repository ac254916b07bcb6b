//! Recovery of a JSON list from judge replies

use regex::Regex;
use std::sync::LazyLock;

use super::parser::{OutputParser, ParseError, ParseResult};

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").unwrap());

static TRAILING_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Finds the first bracketed list in a reply, repairing it when needed
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl JsonParser {
    pub fn list() -> Self {
        Self
    }

    /// Slice from the first `[` to its matching `]`, ignoring brackets inside
    /// strings. An unterminated list yields the rest of the input so repair
    /// still gets a chance at it.
    pub fn extract(&self, input: &str) -> Option<String> {
        let start = input.find('[')?;
        let tail = &input[start..];

        let mut depth = 0i32;
        let mut in_string = false;
        let mut escaped = false;
        for (i, c) in tail.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '[' | '{' if !in_string => depth += 1,
                ']' | '}' if !in_string => {
                    depth -= 1;
                    if depth == 0 && c == ']' {
                        return Some(tail[..=i].to_string());
                    }
                }
                _ => {}
            }
        }
        Some(tail.to_string())
    }

    /// Bounded repairs: control characters become spaces, trailing commas
    /// before a closing bracket are dropped, single quotes become double.
    pub fn repair(&self, input: &str) -> String {
        let cleaned: String = input
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        let cleaned = TRAILING_COMMA_RE.replace_all(&cleaned, "$1");
        requote(&cleaned)
    }
}

/// Rewrites single-quoted strings as double-quoted, escaping embedded `"`
fn requote(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '"' if in_single => out.push_str("\\\""),
            '"' => {
                in_double = !in_double;
                out.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                out.push('"');
            }
            _ => out.push(c),
        }
    }
    out
}

fn as_list(candidate: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .filter(serde_json::Value::is_array)
}

impl OutputParser for JsonParser {
    type Output = serde_json::Value;

    fn parse(&self, raw: &str) -> ParseResult<Self::Output> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        let input = CODE_FENCE_RE
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map_or(trimmed, |m| m.as_str());

        if let Some(value) = as_list(input) {
            return Ok(value);
        }

        let extracted = self.extract(input).ok_or(ParseError::NotFound("list"))?;
        if let Some(value) = as_list(&extracted) {
            return Ok(value);
        }

        as_list(&self.repair(&extracted)).ok_or_else(|| {
            ParseError::RepairFailed("JSON list still invalid after repair".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_list() {
        let parser = JsonParser::list();
        let result = parser
            .parse(r#"[{"check": "a", "result": "PASS", "reason": "ok"}]"#)
            .unwrap();
        assert_eq!(result[0]["result"], "PASS");
    }

    #[test]
    fn test_parse_list_with_prose_and_fence() {
        let parser = JsonParser::list();
        let input = "Here are the verdicts:\n```json\n[{\"check\": \"a\", \"result\": \"FAIL\"}]\n```\nThanks!";
        let result = parser.parse(input).unwrap();
        assert_eq!(result[0]["result"], "FAIL");
    }

    #[test]
    fn test_leading_object_is_skipped() {
        let parser = JsonParser::list();
        let result = parser.parse(r#"{"note": "ignore"} then [1, 2]"#).unwrap();
        assert_eq!(result.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_trailing_comma() {
        let parser = JsonParser::list();
        let result = parser.parse(r#"[{"result": "PASS",},]"#).unwrap();
        assert_eq!(result[0]["result"], "PASS");
    }

    #[test]
    fn test_parse_single_quotes() {
        let parser = JsonParser::list();
        let result = parser
            .parse(r#"[{'check': 'says "hi"', 'result': 'PASS'}]"#)
            .unwrap();
        assert_eq!(result[0]["check"], "says \"hi\"");
    }

    #[test]
    fn test_parse_control_characters() {
        let parser = JsonParser::list();
        let input = "[{\"reason\": \"line one\u{0007}\nline two\", \"result\": \"PASS\"}]";
        let result = parser.parse(input).unwrap();
        assert_eq!(result[0]["result"], "PASS");
    }

    #[test]
    fn test_brackets_inside_strings() {
        let parser = JsonParser::list();
        let input = r#"[{"reason": "mentions [A] and ]"}] trailing ]"#;
        let result = parser.parse(input).unwrap();
        assert_eq!(result[0]["reason"], "mentions [A] and ]");
    }

    #[test]
    fn test_parse_empty_input() {
        let parser = JsonParser::list();
        assert!(matches!(parser.parse("  "), Err(ParseError::EmptyInput)));
    }

    #[test]
    fn test_no_list_found() {
        let parser = JsonParser::list();
        assert_eq!(
            parser.parse("I cannot grade this."),
            Err(ParseError::NotFound("list"))
        );
    }

    #[test]
    fn test_bare_object_is_not_a_list() {
        let parser = JsonParser::list();
        assert_eq!(
            parser.parse(r#"{"result": "PASS"}"#),
            Err(ParseError::NotFound("list"))
        );
    }

    #[test]
    fn test_unrepairable() {
        let parser = JsonParser::list();
        let result = parser.parse(r#"[{"result": PASS}]"#);
        assert!(matches!(result, Err(ParseError::RepairFailed(_))));
    }
}
