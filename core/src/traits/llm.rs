use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A blocking LLM callable: prompt in, raw completion text out.
pub trait Llm: Send + Sync {
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

impl<F> Llm for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self(prompt)
    }
}

/// A suspending LLM callable.
#[async_trait]
pub trait AsyncLlm: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Adapts a closure returning a future into an [`AsyncLlm`].
pub struct AsyncFnLlm<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> AsyncLlm for AsyncFnLlm<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        (self.f)(prompt.to_string()).await
    }
}

/// The LLM an agent or chain drives, tagged with its calling convention.
///
/// The tag is checked before the first call: a synchronous run refuses an
/// `Async` handle up front instead of blocking on it.
#[derive(Clone)]
pub enum LlmHandle {
    Sync(Arc<dyn Llm>),
    Async(Arc<dyn AsyncLlm>),
}

impl LlmHandle {
    pub fn sync(llm: impl Llm + 'static) -> Self {
        Self::Sync(Arc::new(llm))
    }

    pub fn from_async(llm: impl AsyncLlm + 'static) -> Self {
        Self::Async(Arc::new(llm))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self::Async(Arc::new(AsyncFnLlm { f }))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Completes on whichever convention the handle carries.
    pub async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        match self {
            Self::Sync(llm) => llm.complete(prompt),
            Self::Async(llm) => llm.complete(prompt).await,
        }
    }
}

impl std::fmt::Debug for LlmHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "LlmHandle::Sync"),
            Self::Async(_) => write!(f, "LlmHandle::Async"),
        }
    }
}
