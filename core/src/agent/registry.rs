use crate::error::{AgentError, Result};
use crate::traits::{AsyncFnTool, AsyncTool, FnTool, Tool, ToolSpec, stringify_value};
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Clone)]
enum Handler {
    Sync(Arc<dyn Tool>),
    Async(Arc<dyn AsyncTool>),
}

impl Handler {
    fn name(&self) -> &str {
        match self {
            Self::Sync(tool) => tool.name(),
            Self::Async(tool) => tool.name(),
        }
    }

    fn spec(&self) -> ToolSpec {
        match self {
            Self::Sync(tool) => tool.spec(),
            Self::Async(tool) => tool.spec(),
        }
    }
}

/// Name-keyed tool table, kept in registration order.
///
/// May be shared between concurrent runs. Handlers are cloned out of the
/// lock before they are invoked.
pub struct ToolRegistry {
    tools: Mutex<Vec<Handler>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Handler>> {
        self.tools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, handler: Handler) -> Result<()> {
        let mut tools = self.entries();
        if tools.iter().any(|t| t.name() == handler.name()) {
            return Err(AgentError::DuplicateTool(handler.name().to_string()));
        }
        debug!(tool = handler.name(), "Registered tool");
        tools.push(handler);
        Ok(())
    }

    pub fn register(&self, tool: Box<dyn Tool>) -> Result<()> {
        self.insert(Handler::Sync(Arc::from(tool)))
    }

    pub fn register_async(&self, tool: Box<dyn AsyncTool>) -> Result<()> {
        self.insert(Handler::Async(Arc::from(tool)))
    }

    pub fn register_fn<F>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(&str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(Box::new(FnTool::new(name, description, handler)))
    }

    pub fn register_async_fn<F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register_async(Box::new(AsyncFnTool::new(name, description, handler)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries().iter().any(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries().iter().map(|t| t.name().to_string()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.entries().iter().map(Handler::spec).collect()
    }

    fn lookup(&self, name: &str) -> Result<Handler> {
        self.entries()
            .iter()
            .find(|t| t.name() == name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// Invokes a synchronous tool and stringifies its value. Asynchronous
    /// tools are refused with `SyncDispatch` before they run.
    pub fn dispatch(&self, name: &str, input: &str) -> Result<String> {
        match self.lookup(name)? {
            Handler::Sync(tool) => {
                debug!(tool = name, "Dispatching tool");
                tool.call(input)
                    .map(|value| stringify_value(&value))
                    .map_err(|source| execution_error(name, source))
            }
            Handler::Async(_) => Err(AgentError::SyncDispatch(name.to_string())),
        }
    }

    /// Invokes a tool of either kind, awaiting asynchronous handlers.
    pub async fn dispatch_async(&self, name: &str, input: &str) -> Result<String> {
        let handler = self.lookup(name)?;
        debug!(tool = name, is_async = matches!(handler, Handler::Async(_)), "Dispatching tool");

        let result = match handler {
            Handler::Sync(tool) => tool.call(input),
            Handler::Async(tool) => tool.call(input).await,
        };

        result
            .map(|value| stringify_value(&value))
            .map_err(|source| execution_error(name, source))
    }
}

fn execution_error(name: &str, source: anyhow::Error) -> AgentError {
    AgentError::ToolExecution {
        tool: name.to_string(),
        source,
    }
}
