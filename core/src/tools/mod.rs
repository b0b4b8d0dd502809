use crate::agent::ToolRegistry;
use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub mod calculator;
pub mod clock;
pub mod file_read;
pub mod file_write;
pub mod list_dir;

pub use calculator::CalculatorTool;
pub use clock::ClockTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use list_dir::ListDirTool;

/// Registers every builtin tool, rooted at `workspace` for file access.
pub fn register_builtin_tools(registry: &ToolRegistry, workspace: &Path) -> Result<()> {
    registry.register(Box::new(CalculatorTool))?;
    registry.register(Box::new(ClockTool))?;
    registry.register(Box::new(FileReadTool::new(workspace)))?;
    registry.register(Box::new(FileWriteTool::new(workspace)))?;
    registry.register(Box::new(ListDirTool::new(workspace)))?;
    Ok(())
}

/// Decodes tool input as a JSON object when it looks like one.
pub fn parse_object_input(input: &str) -> Option<Value> {
    let trimmed = input.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(Value::is_object)
}

pub fn extract_string_arg(args: &Value, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' parameter", key))
        .map(|s| s.to_string())
}

/// Path argument given either bare or as `{"path": ...}`.
pub fn extract_path_arg(input: &str) -> anyhow::Result<String> {
    match parse_object_input(input) {
        Some(args) => extract_string_arg(&args, "path"),
        None => Ok(input.trim().to_string()),
    }
}

pub fn resolve_path(workspace: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}
