use super::LLMClient;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{GenerateRequest, LLMConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "gemini";

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Serialize, Default)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: Option<GeminiErrorDetail>,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: Option<String>,
}

pub struct GeminiClient {
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn api_key(config: &LLMConfig) -> Result<String> {
        config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Precondition("Gemini API key is required.".to_string()))
    }

    fn build_body(config: &LLMConfig, request: &GenerateRequest) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text {
            text: request.prompt.clone(),
        }];
        if let Some(image) = &request.image {
            parts.push(GeminiPart::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            });
        }

        let generation_config = GenerationConfig {
            temperature: config.temperature.map(f64::from),
            max_output_tokens: config.max_tokens,
            response_mime_type: request
                .json_output
                .then(|| "application/json".to_string()),
        };

        GeminiRequest {
            contents: vec![GeminiContent { parts }],
            generation_config: Some(generation_config),
        }
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn generate(&self, config: &LLMConfig, request: &GenerateRequest) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let base_url = config.base_url.trim_end_matches('/');
        let url = format!(
            "{}/{}:generateContent?key={}",
            base_url,
            config.model.trim(),
            api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&Self::build_body(config, request))
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Gemini request failed: {}", e.without_url())))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| format!("Gemini API error ({})", status));
            return Err(AppError::remote(SERVICE, message));
        }

        let json: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::ParseError(format!("Failed to parse JSON: {}", e)))?;

        json.candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.clone())
            .ok_or_else(|| AppError::remote(SERVICE, "Invalid response format"))
    }
}
