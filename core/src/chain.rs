use crate::error::{AgentError, Result};
use crate::prompt::PromptTemplate;
use crate::traits::LlmHandle;
use std::collections::{BTreeMap, HashMap};

type Transform<T> = Box<dyn Fn(T) -> anyhow::Result<T> + Send + Sync>;

/// Applies transformations in order, each consuming the previous output.
/// The first failure aborts the chain.
pub struct Chain<T> {
    steps: Vec<Transform<T>>,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T> Chain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<F>(mut self, step: F) -> Self
    where
        F: Fn(T) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn run(&self, input: T) -> anyhow::Result<T> {
        self.steps.iter().try_fold(input, |data, step| step(data))
    }
}

/// Runs a prompt template through an LLM.
pub struct LlmChain {
    llm: LlmHandle,
    template: Option<PromptTemplate>,
}

impl LlmChain {
    pub fn new(llm: LlmHandle) -> Self {
        Self {
            llm,
            template: None,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Without a template the prompt is one `key: value` line per variable,
    /// sorted by key.
    pub fn render(&self, vars: &HashMap<&str, String>) -> Result<String> {
        match &self.template {
            Some(template) => template.format(vars),
            None => {
                let sorted: BTreeMap<_, _> = vars.iter().collect();
                Ok(sorted
                    .into_iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }

    pub fn run(&self, vars: &HashMap<&str, String>) -> Result<String> {
        let LlmHandle::Sync(llm) = &self.llm else {
            return Err(AgentError::SyncDispatch("llm".to_string()));
        };
        let prompt = self.render(vars)?;
        llm.complete(&prompt).map_err(AgentError::Llm)
    }

    pub async fn run_async(&self, vars: &HashMap<&str, String>) -> Result<String> {
        let prompt = self.render(vars)?;
        self.llm.complete(&prompt).await.map_err(AgentError::Llm)
    }
}
