pub mod llm;
pub mod tool;

pub use llm::{AsyncLlm, Llm, LlmHandle};
pub use tool::{AsyncFnTool, AsyncTool, FnTool, Tool, ToolSpec, stringify_value};
