use crate::tools::{extract_path_arg, resolve_path};
use crate::traits::Tool;
use anyhow::Context;
use serde_json::Value;

pub struct FileReadTool {
    workspace: std::path::PathBuf,
}

impl FileReadTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Input: the file path, or {\"path\": \"...\"}"
    }

    fn call(&self, input: &str) -> anyhow::Result<Value> {
        let path = extract_path_arg(input)?;
        if path.is_empty() {
            anyhow::bail!("Missing 'path' parameter");
        }

        let full_path = resolve_path(&self.workspace, &path);
        let content = std::fs::read_to_string(&full_path)
            .with_context(|| format!("Failed to read file {}", full_path.display()))?;
        Ok(Value::String(content))
    }
}
