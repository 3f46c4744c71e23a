use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_DEEPL_URL: &str = "https://api-free.deepl.com";
const SERVICE: &str = "deepl";

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `texts` in order; the result has the same length.
    async fn translate(
        &self,
        api_key: &str,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>>;
}

#[derive(Serialize)]
struct DeepLRequest<'a> {
    text: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
}

#[derive(Deserialize)]
struct DeepLResponse {
    #[serde(default)]
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

#[derive(Deserialize)]
struct DeepLError {
    message: Option<String>,
}

pub struct DeepLClient {
    client: reqwest::Client,
    base_url: String,
}

impl DeepLClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for DeepLClient {
    async fn translate(
        &self,
        api_key: &str,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v2/translate", self.base_url);
        debug!(count = texts.len(), source_lang, target_lang, "DeepL request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("DeepL-Auth-Key {}", api_key.trim()))
            .json(&DeepLRequest {
                text: texts,
                source_lang,
                target_lang,
            })
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("DeepL request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("DeepL response unreadable: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<DeepLError>(&body)
                .ok()
                .and_then(|err| err.message)
                .unwrap_or_else(|| format!("DeepL API error ({})", status));
            return Err(AppError::remote(SERVICE, message));
        }

        let parsed: DeepLResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::ParseError(format!("Failed to parse DeepL response: {}", e)))?;
        ensure_same_count(texts.len(), parsed)
    }
}

fn ensure_same_count(expected: usize, response: DeepLResponse) -> Result<Vec<String>> {
    if response.translations.len() != expected {
        return Err(AppError::remote(
            SERVICE,
            format!(
                "expected {} translations, got {}",
                expected,
                response.translations.len()
            ),
        ));
    }
    Ok(response.translations.into_iter().map(|t| t.text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translations_keep_input_order() {
        let response: DeepLResponse = serde_json::from_str(
            r#"{"translations":[{"detected_source_language":"KO","text":"Title"},{"text":"Body"}]}"#,
        )
        .unwrap();
        assert_eq!(ensure_same_count(2, response).unwrap(), vec!["Title", "Body"]);
    }

    #[test]
    fn count_mismatch_is_a_rejection() {
        let response: DeepLResponse =
            serde_json::from_str(r#"{"translations":[{"text":"only one"}]}"#).unwrap();
        assert!(matches!(
            ensure_same_count(2, response),
            Err(AppError::RemoteRejected { .. })
        ));
    }
}
