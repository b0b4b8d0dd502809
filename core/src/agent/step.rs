use crate::agent::parser::Decision;
use serde::Serialize;
use std::fmt::Write;

/// Why a dispatched tool produced no observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub tool: String,
    pub message: String,
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tool '{}' failed: {}", self.tool, self.message)
    }
}

/// One loop iteration. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    index: usize,
    decision: Decision,
    observation: Option<String>,
    error: Option<StepError>,
}

impl Step {
    /// The terminal step of a finished run.
    pub fn answered(index: usize, decision: Decision) -> Self {
        Self {
            index,
            decision,
            observation: None,
            error: None,
        }
    }

    pub fn observed(index: usize, decision: Decision, observation: impl Into<String>) -> Self {
        Self {
            index,
            decision,
            observation: Some(observation.into()),
            error: None,
        }
    }

    pub fn failed(index: usize, decision: Decision, error: StepError) -> Self {
        Self {
            index,
            decision,
            observation: None,
            error: Some(error),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    pub fn observation(&self) -> Option<&str> {
        self.observation.as_deref()
    }

    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }

    /// Transcript block fed back to the model in the next prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Step {}:", self.index + 1);

        if !self.decision.thought.is_empty() {
            let _ = writeln!(out, "Thought: {}", self.decision.thought);
        }
        if self.decision.has_action() {
            let _ = writeln!(out, "Action: {}", self.decision.action);
            let _ = writeln!(out, "Action Input: {}", self.decision.action_input);
        }
        if self.decision.has_final_answer() {
            let _ = writeln!(out, "Final Answer: {}", self.decision.final_answer);
        }

        match (&self.observation, &self.error) {
            (_, Some(error)) => {
                let _ = writeln!(out, "Observation: Error: {}", error);
            }
            (Some(observation), None) if observation.is_empty() => {
                let _ = writeln!(
                    out,
                    "Observation: (nothing happened; reply with exactly one of \"action\" or \"final_answer\")"
                );
            }
            (Some(observation), None) => {
                let _ = writeln!(out, "Observation: {}", observation);
            }
            (None, None) => {}
        }

        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Exhausted,
}

/// What a run handed back: the answer text, how it ended and every step.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub answer: String,
    pub status: RunStatus,
    pub steps: Vec<Step>,
}
