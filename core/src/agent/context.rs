use crate::agent::step::Step;
use crate::traits::ToolSpec;
use std::fmt::Write;

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

const RESPONSE_PROTOCOL: &str = r#"## Response Protocol

Think step by step. Reply with a single JSON object inside a ```json fenced block:

```json
{"thought": "what you are thinking", "action": "tool_name", "action_input": "input for the tool", "final_answer": ""}
```

Set exactly one of "action" or "final_answer":
- To use a tool, set "action" to its name and "action_input" to its input, and leave "final_answer" empty.
- When you know the answer, set "final_answer" and leave "action" empty.

Tool results appear as "Observation" lines in the history below. If a tool fails, the error is shown there; adjust and try again."#;

/// Renders the prompt for one iteration: protocol, tools, task, history.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    pub preamble: Option<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text placed ahead of the response protocol, e.g. a persona.
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    pub fn build_prompt(&self, task: &str, tools: &[ToolSpec], history: &[Step]) -> String {
        let mut parts = vec![];

        if let Some(preamble) = self.preamble.as_deref().filter(|p| !p.trim().is_empty()) {
            parts.push(preamble.trim().to_string());
        }

        parts.push(RESPONSE_PROTOCOL.to_string());
        parts.push(self.get_tool_section(tools));
        parts.push(format!("## Task\n\n{}", task.trim()));

        if let Some(history) = self.get_history_section(history) {
            parts.push(history);
        }

        parts.join(SECTION_SEPARATOR)
    }

    fn get_tool_section(&self, tools: &[ToolSpec]) -> String {
        if tools.is_empty() {
            return "## Available Tools\n\nNo tools are available. Answer directly with \"final_answer\"."
                .to_string();
        }

        let mut section = String::from("## Available Tools\n\n");
        for tool in tools {
            let _ = writeln!(section, "- **{}**: {}", tool.name, tool.description);
        }
        section.trim_end().to_string()
    }

    fn get_history_section(&self, history: &[Step]) -> Option<String> {
        if history.is_empty() {
            return None;
        }

        let mut section = String::from("## History\n\n");
        for step in history {
            section.push_str(&step.render());
            section.push('\n');
        }
        Some(section.trim_end().to_string())
    }
}
