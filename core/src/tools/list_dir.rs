use crate::tools::{extract_path_arg, resolve_path};
use crate::traits::Tool;
use anyhow::Context;
use serde_json::Value;
use walkdir::WalkDir;

pub struct ListDirTool {
    workspace: std::path::PathBuf,
}

impl ListDirTool {
    pub fn new(workspace: impl AsRef<std::path::Path>) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
        }
    }
}

impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, one per line, directories ending in '/'. Input: a path, empty for the workspace root"
    }

    fn call(&self, input: &str) -> anyhow::Result<Value> {
        let path = extract_path_arg(input)?;
        let dir = resolve_path(&self.workspace, &path);

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().is_dir() {
                entries.push(format!("{name}/"));
            } else {
                entries.push(name);
            }
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(Value::String("(empty directory)".to_string()));
        }
        Ok(Value::String(entries.join("\n")))
    }
}
