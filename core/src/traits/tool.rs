use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub is_async: bool,
}

/// A tool whose handler runs to completion on the caller's thread.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn call(&self, input: &str) -> anyhow::Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            is_async: false,
        }
    }
}

/// A tool whose handler suspends. Only reachable from `run_async`.
#[async_trait]
pub trait AsyncTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn call(&self, input: &str) -> anyhow::Result<Value>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            is_async: true,
        }
    }
}

pub struct FnTool<F> {
    name: String,
    description: String,
    handler: F,
}

impl<F> FnTool<F>
where
    F: Fn(&str) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler,
        }
    }
}

impl<F> Tool for FnTool<F>
where
    F: Fn(&str) -> anyhow::Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn call(&self, input: &str) -> anyhow::Result<Value> {
        (self.handler)(input)
    }
}

pub struct AsyncFnTool<F> {
    name: String,
    description: String,
    handler: F,
}

impl<F, Fut> AsyncFnTool<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> AsyncTool for AsyncFnTool<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> anyhow::Result<Value> {
        (self.handler)(input.to_string()).await
    }
}

/// Renders a tool result as observation text. Strings are emitted bare,
/// `null` as nothing, everything else as compact JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringify_renders_strings_bare() {
        assert_eq!(stringify_value(&json!("hello")), "hello");
        assert_eq!(stringify_value(&Value::Null), "");
        assert_eq!(stringify_value(&json!(445)), "445");
        assert_eq!(stringify_value(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn fn_tool_reports_sync_spec() {
        let tool = FnTool::new("echo", "Echo input", |input: &str| Ok(json!(input)));
        assert_eq!(tool.call("hi").unwrap(), json!("hi"));
        let spec = tool.spec();
        assert_eq!(spec.name, "echo");
        assert!(!spec.is_async);
    }
}
