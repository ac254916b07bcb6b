//! Judge prompt construction

/// Fixed domain rubric given to the judge ahead of every scenario
pub const RUBRIC: &str = "You are grading answers from an AI coach for fitness races \
(8 x 1 km runs alternating with 8 workout stations). Judge each check independently \
against the candidate response.

Grading rules:
- Be generous with wording: a check passes when the response conveys the same fact or \
behavior in different words.
- Numbers match approximately: \"~150\" passes a check asking for \"152\", and equivalent \
units pass only when the check does not demand a specific unit or phrasing.
- Judge style and tone checks by their spirit, not by exact phrases.
- For checks of the form \"does NOT ...\", PASS means the response avoided the forbidden \
behavior; FAIL means it did the forbidden thing.
- An empty or missing response fails every check.";

/// Build the single judge prompt for one scenario
pub fn judge_prompt(user_prompt: &str, response: &str, checks: &[String]) -> String {
    let numbered = checks
        .iter()
        .enumerate()
        .map(|(i, check)| format!("{}. {}", i + 1, check))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{rubric}

## User prompt
{user_prompt}

## Candidate response
{response}

## Checks
{numbered}

Return a JSON list with exactly {count} objects, one per check, in the same order:
[{{\"check\": \"<check text>\", \"result\": \"PASS\" or \"FAIL\", \"reason\": \"<at most 10 words>\"}}]
Output only the JSON list, with no text before or after it.",
        rubric = RUBRIC,
        user_prompt = user_prompt.trim(),
        response = if response.trim().is_empty() {
            "(empty response)"
        } else {
            response.trim()
        },
        numbered = numbered,
        count = checks.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_all_parts() {
        let checks = vec![
            "states the sled push distance is 50 m".to_string(),
            "does NOT confuse push and pull".to_string(),
        ];
        let prompt = judge_prompt("How far is the sled push?", "It is 50 m.", &checks);

        assert!(prompt.starts_with(RUBRIC));
        assert!(prompt.contains("## User prompt\nHow far is the sled push?"));
        assert!(prompt.contains("## Candidate response\nIt is 50 m."));
        assert!(prompt.contains("1. states the sled push distance is 50 m\n2. does NOT confuse push and pull"));
        assert!(prompt.contains("exactly 2 objects"));
        assert!(prompt.contains(r#""result": "PASS" or "FAIL""#));
    }

    #[test]
    fn test_empty_response_is_marked() {
        let prompt = judge_prompt("q", "   ", &["c".to_string()]);
        assert!(prompt.contains("(empty response)"));
    }
}
