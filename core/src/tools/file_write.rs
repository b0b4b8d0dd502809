use crate::tools::{extract_string_arg, parse_object_input, resolve_path};
use crate::traits::Tool;
use anyhow::Context;
use serde_json::Value;

pub struct FileWriteTool {
    workspace: std::path::PathBuf,
}

impl FileWriteTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories. Input: {\"path\": \"...\", \"content\": \"...\"}"
    }

    fn call(&self, input: &str) -> anyhow::Result<Value> {
        let args = parse_object_input(input).ok_or_else(|| {
            anyhow::anyhow!("Expected a JSON object with 'path' and 'content'")
        })?;
        let path = extract_string_arg(&args, "path")?;
        let content = extract_string_arg(&args, "content")?;

        let full_path = resolve_path(&self.workspace, &path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        std::fs::write(&full_path, &content)
            .with_context(|| format!("Failed to write file {}", full_path.display()))?;

        Ok(Value::String(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path
        )))
    }
}
