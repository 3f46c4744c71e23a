use serde::{Deserialize, Serialize};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Image sent alongside a prompt, already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    /// Ask the model for `application/json` output.
    pub json_output: bool,
}
