pub mod agent;
pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod prompt;
pub mod tools;
pub mod traits;

pub use agent::{
    Agent, AgentConfig, ConflictPolicy, ContextBuilder, Decision, RunOutcome, RunStatus, Step,
    StepError, ToolRegistry,
};
pub use chain::{Chain, LlmChain};
pub use error::{AgentError, Result};
pub use logging::setup_logger;
pub use memory::Memory;
pub use prompt::PromptTemplate;
pub use traits::*;
