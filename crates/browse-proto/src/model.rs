use crate::error::ModelError;
use async_trait::async_trait;

/// A language model that answers a single freeform prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}
