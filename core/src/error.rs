use thiserror::Error;

/// Errors surfaced by the agent runtime.
///
/// Only configuration and misuse errors ever reach the caller of a run.
/// `ToolExecution` is produced by the registry but the agent loop captures
/// it into the step history instead of returning it.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unknown tool: '{0}'")]
    UnknownTool(String),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("'{0}' is asynchronous and cannot be called from the synchronous run path")]
    SyncDispatch(String),

    #[error("tool '{tool}' failed: {source:#}")]
    ToolExecution {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("LLM call failed: {0:#}")]
    Llm(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("prompt template error: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
