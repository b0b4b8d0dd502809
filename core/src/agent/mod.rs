pub mod context;
pub mod loop_;
pub mod parser;
pub mod registry;
pub mod step;

pub use context::ContextBuilder;
pub use loop_::{Agent, AgentConfig, ConflictPolicy, DEFAULT_EXHAUSTED_MESSAGE};
pub use parser::{Decision, parse};
pub use registry::ToolRegistry;
pub use step::{RunOutcome, RunStatus, Step, StepError};
