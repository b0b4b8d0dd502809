use crate::traits::stringify_value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const FENCE: &str = "```";
const DECISION_KEYS: [&str; 4] = ["thought", "action", "action_input", "final_answer"];

/// The structured fields extracted from one LLM response.
///
/// Every field defaults to the empty string; a well-formed response sets
/// exactly one of `action` and `final_answer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub thought: String,
    pub action: String,
    pub action_input: String,
    pub final_answer: String,
}

impl Decision {
    /// A decision carrying only a final answer.
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            final_answer: text.into(),
            ..Default::default()
        }
    }

    /// Builds a decision from a decoded JSON object. Missing or `null` keys
    /// become empty strings; non-string values are kept as compact JSON.
    /// Only `action` is trimmed.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let field = |key: &str| object.get(key).map(stringify_value).unwrap_or_default();

        Self {
            thought: field("thought"),
            action: field("action").trim().to_string(),
            action_input: field("action_input"),
            final_answer: field("final_answer"),
        }
    }

    pub fn has_action(&self) -> bool {
        !self.action.is_empty()
    }

    /// A whitespace-only answer does not count.
    pub fn has_final_answer(&self) -> bool {
        !self.final_answer.trim().is_empty()
    }

    /// Both empty, or both set.
    pub fn is_malformed(&self) -> bool {
        self.has_action() == self.has_final_answer()
    }
}

/// Parses raw model output into a [`Decision`]. Never fails: text with no
/// decodable object becomes a final answer holding the trimmed text.
///
/// Order: the whole text as one object, then the first fenced block, then
/// the first embedded object that carries a decision key.
pub fn parse(raw: &str) -> Decision {
    let object = decode_whole(raw)
        .or_else(|| fenced_object(raw))
        .or_else(|| first_embedded_object(raw));

    match object {
        Some(object) => {
            let decision = Decision::from_object(&object);
            debug!(
                action = %decision.action,
                has_final_answer = decision.has_final_answer(),
                "Parsed LLM response"
            );
            decision
        }
        None => {
            warn!("LLM response has no JSON object, treating it as the final answer");
            Decision::answer(raw.trim())
        }
    }
}

fn decode_whole(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Object held by the first fenced block. A fence inside a JSON string
/// does not close the block: each later fence is tried as the closer until
/// the interior decodes. An unclosed fence runs to the end of the text.
fn fenced_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find(FENCE)?;
    let after_open = &text[start + FENCE.len()..];

    let closers = after_open
        .match_indices(FENCE)
        .map(|(end, _)| end)
        .chain(std::iter::once(after_open.len()));

    for end in closers {
        if let Some(object) = decode_whole(strip_language_tag(&after_open[..end])) {
            return Some(object);
        }
    }
    None
}

fn strip_language_tag(body: &str) -> &str {
    let tag_len = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+')))
        .unwrap_or(body.len());

    if tag_len > 0 && body[tag_len..].starts_with(char::is_whitespace) {
        &body[tag_len..]
    } else {
        body
    }
}

fn is_decision_object(object: &Map<String, Value>) -> bool {
    DECISION_KEYS.iter().any(|key| object.contains_key(*key))
}

/// Scans for the first balanced `{...}` span that decodes as a JSON object
/// with at least one decision key. Other objects are prose.
fn first_embedded_object(text: &str) -> Option<Map<String, Value>> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                    && let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&text[s..=i])
                    && is_decision_object(&object)
                {
                    return Some(object);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_with_language_tag() {
        let raw = r#"```json {"thought":"t","action":"","action_input":"","final_answer":"42"} ```"#;
        let decision = parse(raw);
        assert_eq!(decision.final_answer, "42");
        assert_eq!(decision.thought, "t");
        assert!(decision.action.is_empty());
        assert!(decision.action_input.is_empty());
    }

    #[test]
    fn fenced_block_without_tag_across_lines() {
        let raw = "Let me check.\n```\n{\"thought\": \"need time\", \"action\": \"current_time\"}\n```\nthanks";
        let decision = parse(raw);
        assert_eq!(decision.action, "current_time");
        assert_eq!(decision.thought, "need time");
        assert!(decision.final_answer.is_empty());
    }

    #[test]
    fn bare_json() {
        let decision = parse(r#"{"action": "calculator", "action_input": "2 + 2"}"#);
        assert_eq!(decision.action, "calculator");
        assert_eq!(decision.action_input, "2 + 2");
    }

    #[test]
    fn free_text_becomes_final_answer() {
        let decision = parse("I think the answer is 7");
        assert_eq!(decision, Decision::answer("I think the answer is 7"));
    }

    #[test]
    fn free_text_is_trimmed() {
        let decision = parse("\n  The answer is 7.  \n");
        assert_eq!(decision.final_answer, "The answer is 7.");
    }

    #[test]
    fn object_embedded_in_prose() {
        let raw = r#"Sure! {"thought": "say \"hi\" {ok}", "final_answer": "hi"} Hope that helps."#;
        let decision = parse(raw);
        assert_eq!(decision.final_answer, "hi");
        assert_eq!(decision.thought, r#"say "hi" {ok}"#);
    }

    #[test]
    fn structured_action_input_is_kept_as_json() {
        let raw = r#"{"action": "write_file", "action_input": {"path": "a.txt", "content": "x"}}"#;
        let decision = parse(raw);
        let input: Value = serde_json::from_str(&decision.action_input).unwrap();
        assert_eq!(input["path"], "a.txt");
    }

    #[test]
    fn null_and_missing_fields_default_to_empty() {
        let decision = parse(r#"{"thought": null}"#);
        assert_eq!(decision, Decision::default());
        assert!(decision.is_malformed());
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        let decision = parse("```json\n{\"final_answer\": \"done\"}");
        assert_eq!(decision.final_answer, "done");
    }

    #[test]
    fn both_fields_set_is_malformed() {
        let decision = parse(r#"{"action": "x", "final_answer": "y"}"#);
        assert!(decision.is_malformed());
    }

    #[test]
    fn bare_json_answer_may_contain_a_code_fence() {
        let raw = r#"{"thought":"done","action":"","action_input":"","final_answer":"Here:\n```rust\nfn main() {}\n```"}"#;
        let decision = parse(raw);
        assert_eq!(decision.thought, "done");
        assert_eq!(decision.final_answer, "Here:\n```rust\nfn main() {}\n```");
        assert!(!decision.is_malformed());
    }

    #[test]
    fn fence_inside_fenced_answer_does_not_close_the_block() {
        let raw = "```json\n{\"final_answer\": \"use ```ls``` here\"}\n```";
        let decision = parse(raw);
        assert_eq!(decision.final_answer, "use ```ls``` here");
    }

    #[test]
    fn fenced_block_that_is_not_json_falls_back_to_embedded_object() {
        let raw = "```\nnotes {\"action\": \"echo\", \"action_input\": \"x\"}\n```";
        let decision = parse(raw);
        assert_eq!(decision.action, "echo");
    }

    #[test]
    fn prose_with_unrelated_object_is_the_answer() {
        let raw = r#"The config should look like {"port": 8080}."#;
        assert_eq!(parse(raw), Decision::answer(raw));
    }

    #[test]
    fn embedded_scan_skips_objects_without_decision_keys() {
        let raw = r#"Given {"port": 8080}, I'll use {"action": "echo", "action_input": "8080"}"#;
        let decision = parse(raw);
        assert_eq!(decision.action, "echo");
        assert_eq!(decision.action_input, "8080");
    }

    #[test]
    fn only_action_is_trimmed() {
        let raw = r#"{"action": " write_file ", "action_input": "  indented\n"}"#;
        let decision = parse(raw);
        assert_eq!(decision.action, "write_file");
        assert_eq!(decision.action_input, "  indented\n");
    }

    #[test]
    fn whitespace_only_answer_is_not_an_answer() {
        let decision = parse(r#"{"final_answer": "   "}"#);
        assert!(!decision.has_final_answer());
        assert!(decision.is_malformed());
    }

    #[test]
    fn empty_text_yields_empty_decision() {
        assert_eq!(parse("   "), Decision::default());
    }
}
