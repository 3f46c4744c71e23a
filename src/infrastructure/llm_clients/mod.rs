pub mod gemini;

use crate::domain::error::Result;
use crate::domain::llm_config::{GenerateRequest, LLMConfig};
use async_trait::async_trait;

pub use gemini::GeminiClient;

#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Returns the raw text of the first candidate.
    async fn generate(&self, config: &LLMConfig, request: &GenerateRequest) -> Result<String>;
}
