use crate::agent::parser::{self, Decision};
use crate::agent::step::{RunOutcome, RunStatus, Step, StepError};
use crate::agent::{ContextBuilder, ToolRegistry};
use crate::error::{AgentError, Result};
use crate::memory::{LAST_ANSWER_KEY, Memory};
use crate::tools::register_builtin_tools;
use crate::traits::{Llm, LlmHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DEFAULT_EXHAUSTED_MESSAGE: &str = "Max steps reached without a final answer";

/// What to do with a decision that sets both `action` and `final_answer`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Record an empty-observation step and keep going.
    #[default]
    TreatAsMalformed,
    /// Stop with the final answer and ignore the action.
    PreferFinalAnswer,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub include_builtin_tools: bool,
    pub workspace_dir: PathBuf,
    pub conflict_policy: ConflictPolicy,
    pub exhausted_message: String,
}

impl AgentConfig {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            include_builtin_tools: false,
            workspace_dir: PathBuf::from("."),
            conflict_policy: ConflictPolicy::default(),
            exhausted_message: DEFAULT_EXHAUSTED_MESSAGE.to_string(),
        }
    }

    pub fn with_builtin_tools(mut self, enabled: bool) -> Self {
        self.include_builtin_tools = enabled;
        self
    }

    pub fn with_workspace(mut self, workspace_dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = workspace_dir.into();
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_exhausted_message(mut self, message: impl Into<String>) -> Self {
        self.exhausted_message = message.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(AgentError::InvalidConfig(
                "max_steps must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

enum Move {
    Finish,
    Act,
    Skip,
}

/// Mutable state of a single run; dropped when the run returns.
struct RunState {
    task: String,
    history: Vec<Step>,
    step_count: usize,
    max_steps: usize,
    status: RunStatus,
}

impl RunState {
    fn new(task: &str, max_steps: usize) -> Self {
        Self {
            task: task.to_string(),
            history: Vec::new(),
            step_count: 0,
            max_steps,
            status: RunStatus::Running,
        }
    }

    fn next_index(&self) -> usize {
        self.history.len()
    }

    /// Appends a non-terminal step. Returns true once the budget is spent.
    fn record(&mut self, step: Step) -> bool {
        self.history.push(step);
        self.step_count += 1;
        if self.step_count >= self.max_steps {
            self.status = RunStatus::Exhausted;
        }
        self.status == RunStatus::Exhausted
    }

    fn into_outcome(self, answer: String) -> RunOutcome {
        RunOutcome {
            answer,
            status: self.status,
            steps: self.history,
        }
    }
}

/// Drives an LLM through think, act, observe steps until it answers or the
/// step budget runs out.
pub struct Agent {
    llm: LlmHandle,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<Memory>>,
    context_builder: ContextBuilder,
    config: AgentConfig,
}

impl Agent {
    pub fn new(llm: LlmHandle, config: AgentConfig) -> Result<Self> {
        Self::with_tools(llm, config, Arc::new(ToolRegistry::new()))
    }

    /// Builds an agent over an existing, possibly shared, registry. Builtin
    /// tools are added to it when enabled, so a registry that already holds
    /// them fails with `DuplicateTool`.
    pub fn with_tools(
        llm: LlmHandle,
        config: AgentConfig,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        if config.include_builtin_tools {
            register_builtin_tools(&tools, &config.workspace_dir)?;
        }

        Ok(Self {
            llm,
            tools,
            memory: None,
            context_builder: ContextBuilder::new(),
            config,
        })
    }

    pub fn with_memory(mut self, memory: Arc<Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_context_builder(mut self, context_builder: ContextBuilder) -> Self {
        self.context_builder = context_builder;
        self
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn memory(&self) -> Option<&Arc<Memory>> {
        self.memory.as_ref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn register_tool<F>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.tools.register_fn(name, description, handler)
    }

    pub fn register_async_tool<F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.tools.register_async_fn(name, description, handler)
    }

    /// Blocking run. Returns the final answer or the exhaustion message.
    pub fn run(&self, task: &str) -> Result<String> {
        self.run_with_trace(task).map(|outcome| outcome.answer)
    }

    pub fn run_with_trace(&self, task: &str) -> Result<RunOutcome> {
        let llm = self.sync_llm()?;
        let mut run = self.start(task);

        loop {
            let prompt = self.build_prompt(&run);
            let raw = llm.complete(&prompt).map_err(llm_error)?;
            let decision = parser::parse(&raw);

            let step = match self.next_move(&decision) {
                Move::Finish => return Ok(self.finish(run, decision)),
                Move::Act => {
                    let result = self.tools.dispatch(&decision.action, &decision.action_input);
                    capture(run.next_index(), decision, result)?
                }
                Move::Skip => skip(run.next_index(), decision),
            };

            if self.advance(&mut run, step) {
                return Ok(self.exhaust(run));
            }
        }
    }

    /// Suspending run. Accepts both LLM conventions and awaits async tools.
    pub async fn run_async(&self, task: &str) -> Result<String> {
        self.run_async_with_trace(task)
            .await
            .map(|outcome| outcome.answer)
    }

    pub async fn run_async_with_trace(&self, task: &str) -> Result<RunOutcome> {
        let mut run = self.start(task);

        loop {
            let prompt = self.build_prompt(&run);
            let raw = self.llm.complete(&prompt).await.map_err(llm_error)?;
            let decision = parser::parse(&raw);

            let step = match self.next_move(&decision) {
                Move::Finish => return Ok(self.finish(run, decision)),
                Move::Act => {
                    let result = self
                        .tools
                        .dispatch_async(&decision.action, &decision.action_input)
                        .await;
                    capture(run.next_index(), decision, result)?
                }
                Move::Skip => skip(run.next_index(), decision),
            };

            if self.advance(&mut run, step) {
                return Ok(self.exhaust(run));
            }
        }
    }

    fn sync_llm(&self) -> Result<&Arc<dyn Llm>> {
        match &self.llm {
            LlmHandle::Sync(llm) => Ok(llm),
            LlmHandle::Async(_) => Err(AgentError::SyncDispatch("llm".to_string())),
        }
    }

    fn start(&self, task: &str) -> RunState {
        info!(
            run_id = %uuid::Uuid::new_v4(),
            max_steps = self.config.max_steps,
            tools = self.tools.len(),
            "Starting agent run"
        );
        RunState::new(task, self.config.max_steps)
    }

    fn build_prompt(&self, run: &RunState) -> String {
        self.context_builder
            .build_prompt(&run.task, &self.tools.specs(), &run.history)
    }

    fn next_move(&self, decision: &Decision) -> Move {
        match (decision.has_action(), decision.has_final_answer()) {
            (false, true) => Move::Finish,
            (true, false) => Move::Act,
            (true, true) => match self.config.conflict_policy {
                ConflictPolicy::PreferFinalAnswer => Move::Finish,
                ConflictPolicy::TreatAsMalformed => {
                    warn!(action = %decision.action, "Response set both action and final_answer");
                    Move::Skip
                }
            },
            (false, false) => {
                warn!("Response set neither action nor final_answer");
                Move::Skip
            }
        }
    }

    fn finish(&self, mut run: RunState, decision: Decision) -> RunOutcome {
        let answer = decision.final_answer.clone();
        run.history.push(Step::answered(run.next_index(), decision));
        run.status = RunStatus::Finished;

        if let Some(memory) = &self.memory {
            memory.set(LAST_ANSWER_KEY, answer.clone());
        }

        info!(steps = run.history.len(), "Agent run finished");
        run.into_outcome(answer)
    }

    /// Records a non-terminal step; true when the run is now exhausted.
    fn advance(&self, run: &mut RunState, step: Step) -> bool {
        debug!(
            index = step.index(),
            action = %step.decision().action,
            failed = step.error().is_some(),
            "Recorded step"
        );
        run.record(step)
    }

    fn exhaust(&self, run: RunState) -> RunOutcome {
        warn!(max_steps = run.max_steps, "Agent run exhausted its step budget");
        run.into_outcome(self.config.exhausted_message.clone())
    }
}

fn llm_error(err: anyhow::Error) -> AgentError {
    error!("LLM call failed: {:#}", err);
    AgentError::Llm(err)
}

/// Turns a dispatch result into a step. Tool failures are kept for the
/// model; registry misuse propagates.
fn capture(index: usize, decision: Decision, result: Result<String>) -> Result<Step> {
    match result {
        Ok(observation) => Ok(Step::observed(index, decision, observation)),
        Err(AgentError::ToolExecution { tool, source }) => {
            warn!(tool = %tool, "Tool failed: {:#}", source);
            let error = StepError {
                tool,
                message: format!("{source:#}"),
            };
            Ok(Step::failed(index, decision, error))
        }
        Err(err) => Err(err),
    }
}

fn skip(index: usize, decision: Decision) -> Step {
    Step::observed(index, decision, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ACTION: &str = r#"```json
{"thought": "keep going", "action": "echo", "action_input": "ping", "final_answer": ""}
```"#;
    const ANSWER: &str =
        r#"```json {"thought":"done","action":"","action_input":"","final_answer":"42"} ```"#;

    /// LLM that replays `responses` in order, repeating the last one.
    fn scripted(responses: Vec<&'static str>) -> (LlmHandle, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let llm = LlmHandle::from_fn(move |_prompt| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(responses[n.min(responses.len() - 1)].to_string())
        });
        (llm, calls)
    }

    fn agent(llm: LlmHandle, max_steps: usize) -> Agent {
        let agent = Agent::new(llm, AgentConfig::new(max_steps)).unwrap();
        agent
            .register_tool("echo", "Echo the input", |input| Ok(json!(input)))
            .unwrap();
        agent
    }

    #[test]
    fn zero_max_steps_is_rejected() {
        let (llm, _) = scripted(vec![ANSWER]);
        let err = Agent::new(llm, AgentConfig::new(0)).err().unwrap();
        assert!(matches!(err, AgentError::InvalidConfig(_)));
    }

    #[test]
    fn first_response_final_answer() {
        let (llm, calls) = scripted(vec![ANSWER]);
        let memory = Arc::new(Memory::new());
        let agent = agent(llm, 1).with_memory(Arc::clone(&memory));

        let outcome = agent.run_with_trace("Compute").unwrap();
        assert_eq!(outcome.answer, "42");
        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.steps.len(), 1);
        assert!(outcome.steps[0].observation().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memory.get(LAST_ANSWER_KEY), Some(json!("42")));
    }

    #[test]
    fn always_acting_exhausts_after_exactly_max_steps() {
        for max_steps in 1..=5 {
            let (llm, calls) = scripted(vec![ACTION]);
            let outcome = agent(llm, max_steps).run_with_trace("loop forever").unwrap();
            assert_eq!(outcome.status, RunStatus::Exhausted);
            assert_eq!(outcome.answer, DEFAULT_EXHAUSTED_MESSAGE);
            assert_eq!(outcome.steps.len(), max_steps);
            assert_eq!(calls.load(Ordering::SeqCst), max_steps);
            assert!(outcome.steps.iter().all(|s| s.observation() == Some("ping")));
        }
    }

    #[test]
    fn exhaustion_does_not_touch_memory() {
        let (llm, _) = scripted(vec![ACTION]);
        let memory = Arc::new(Memory::new());
        let agent = agent(llm, 2).with_memory(Arc::clone(&memory));
        agent.run("task").unwrap();
        assert!(!memory.contains(LAST_ANSWER_KEY));
    }

    #[test]
    fn observations_reach_the_next_prompt() {
        let prompts = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let seen = Arc::clone(&prompts);
        let responses = [ACTION, ANSWER];
        let llm = LlmHandle::from_fn(move |prompt| {
            let mut seen = seen.lock().unwrap();
            seen.push(prompt.to_string());
            Ok(responses[seen.len() - 1].to_string())
        });

        let answer = agent(llm, 5).run("Say ping").unwrap();
        assert_eq!(answer, "42");

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[0].contains("Observation:"));
        assert!(prompts[1].contains("Action: echo"));
        assert!(prompts[1].contains("Observation: ping"));
    }

    #[test]
    fn tool_failure_becomes_step_error() {
        let (llm, _) = scripted(vec![
            r#"{"action": "fail", "action_input": "x"}"#,
            r#"{"final_answer": "recovered"}"#,
        ]);
        let agent = agent(llm, 3);
        agent
            .register_tool("fail", "Always fails", |_| anyhow::bail!("disk on fire"))
            .unwrap();

        let outcome = agent.run_with_trace("task").unwrap();
        assert_eq!(outcome.answer, "recovered");
        assert_eq!(outcome.steps.len(), 2);
        let error = outcome.steps[0].error().unwrap();
        assert_eq!(error.tool, "fail");
        assert_eq!(error.message, "disk on fire");
        assert!(outcome.steps[0].observation().is_none());
    }

    #[test]
    fn unknown_tool_propagates() {
        let (llm, calls) = scripted(vec![r#"{"action": "missing", "action_input": ""}"#]);
        let err = agent(llm, 3).run("task").unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_response_continues_with_empty_observation() {
        let (llm, _) = scripted(vec![r#"{"thought": "hmm"}"#, ANSWER]);
        let outcome = agent(llm, 3).run_with_trace("task").unwrap();
        assert_eq!(outcome.answer, "42");
        assert_eq!(outcome.steps[0].observation(), Some(""));
        assert_eq!(outcome.steps[1].index(), 1);
    }

    #[test]
    fn free_text_response_finishes_run() {
        let (llm, _) = scripted(vec!["I think the answer is 7"]);
        assert_eq!(agent(llm, 2).run("task").unwrap(), "I think the answer is 7");
    }

    #[test]
    fn prose_with_unrelated_object_finishes_run() {
        let prose = r#"The config should look like {"port": 8080}."#;
        let (llm, calls) = scripted(vec![prose]);
        let outcome = agent(llm, 3).run_with_trace("task").unwrap();
        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.answer, prose);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn answer_containing_code_fence_finishes_run() {
        let (llm, _) = scripted(vec![
            r#"{"thought":"done","action":"","action_input":"","final_answer":"Here:\n```rust\nfn main() {}\n```"}"#,
        ]);
        let outcome = agent(llm, 3).run_with_trace("task").unwrap();
        assert_eq!(outcome.status, RunStatus::Finished);
        assert_eq!(outcome.answer, "Here:\n```rust\nfn main() {}\n```");
        assert_eq!(outcome.steps.len(), 1);
    }

    #[test]
    fn conflicting_decision_follows_policy() {
        let both = r#"{"action": "echo", "action_input": "x", "final_answer": "early"}"#;

        let (llm, _) = scripted(vec![both, ANSWER]);
        let outcome = agent(llm, 3).run_with_trace("task").unwrap();
        assert_eq!(outcome.answer, "42");
        assert_eq!(outcome.steps[0].observation(), Some(""));

        let (llm, _) = scripted(vec![both]);
        let config = AgentConfig::new(3).with_conflict_policy(ConflictPolicy::PreferFinalAnswer);
        let agent = Agent::new(llm, config).unwrap();
        assert_eq!(agent.run("task").unwrap(), "early");
    }

    #[test]
    fn llm_error_propagates() {
        let llm = LlmHandle::from_fn(|_| anyhow::bail!("rate limited"));
        let err = agent(llm, 3).run("task").unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[test]
    fn async_llm_refused_on_sync_run() {
        let llm = LlmHandle::from_async_fn(|_| async { Ok(ANSWER.to_string()) });
        let err = agent(llm, 1).run("task").unwrap_err();
        assert!(matches!(err, AgentError::SyncDispatch(name) if name == "llm"));
    }

    #[test]
    fn async_tool_refused_on_sync_run() {
        let (llm, _) = scripted(vec![r#"{"action": "later", "action_input": "x"}"#]);
        let agent = agent(llm, 2);
        agent
            .register_async_tool("later", "Async tool", |input| async move { Ok(json!(input)) })
            .unwrap();
        let err = agent.run("task").unwrap_err();
        assert!(matches!(err, AgentError::SyncDispatch(name) if name == "later"));
    }

    #[test]
    fn builtin_tools_are_registered_on_request() {
        let (llm, _) = scripted(vec![
            r#"{"action": "calculator", "action_input": "15 * 23 + 100"}"#,
            ANSWER,
        ]);
        let agent = Agent::new(llm, AgentConfig::new(3).with_builtin_tools(true)).unwrap();
        assert!(agent.tools().contains("calculator"));

        let outcome = agent.run_with_trace("math").unwrap();
        assert_eq!(outcome.steps[0].observation(), Some("445"));
    }

    #[tokio::test]
    async fn async_run_awaits_llm_and_tools() {
        let llm = LlmHandle::from_async_fn(|prompt| async move {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            if prompt.contains("Observation: Processed: HELLO WORLD") {
                Ok(r#"{"final_answer": "Processed: HELLO WORLD"}"#.to_string())
            } else {
                Ok(r#"{"action": "async_process", "action_input": "hello world"}"#.to_string())
            }
        });
        let agent = Agent::new(llm, AgentConfig::new(3)).unwrap();
        agent
            .register_async_tool("async_process", "Process data asynchronously", |data| async move {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                Ok(json!(format!("Processed: {}", data.to_uppercase())))
            })
            .unwrap();

        let outcome = agent.run_async_with_trace("Process 'hello world'").await.unwrap();
        assert_eq!(outcome.answer, "Processed: HELLO WORLD");
        assert_eq!(outcome.steps.len(), 2);
    }

    #[tokio::test]
    async fn async_run_accepts_sync_llm() {
        let (llm, _) = scripted(vec![ACTION]);
        let outcome = agent(llm, 2).run_async_with_trace("task").await.unwrap();
        assert_eq!(outcome.status, RunStatus::Exhausted);
        assert_eq!(outcome.steps.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_runs_share_memory() {
        let memory = Arc::new(Memory::new());
        let (llm, _) = scripted(vec![ANSWER]);
        let agent = Arc::new(agent(llm, 1).with_memory(Arc::clone(&memory)));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let agent = Arc::clone(&agent);
                tokio::spawn(async move { agent.run_async(&format!("task {i}")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "42");
        }
        assert_eq!(memory.get(LAST_ANSWER_KEY), Some(json!("42")));
    }
}
