use crate::domain::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static CODE_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*\n?(.*?)\n?```$").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Cleans LLM response by removing reasoning tags, code fences and excess blank lines
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = THINK_TAG_PATTERN.replace_all(response, "").to_string();
    cleaned = cleaned.trim().to_string();

    if let Some(captures) = CODE_FENCE_PATTERN.captures(&cleaned) {
        cleaned = captures
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
    }

    MULTIPLE_NEWLINES_PATTERN
        .replace_all(&cleaned, "\n\n")
        .to_string()
}

/// Decodes the JSON object a model was asked to return, tolerating fences and
/// prose around it.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = clean_llm_response(raw);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Ok(value);
    }

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&cleaned[start..=end])
            .map_err(|e| AppError::ParseError(format!("Model reply is not valid JSON: {}", e))),
        _ => Err(AppError::ParseError(
            "Model reply does not contain a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Pair {
        kr: String,
        en: String,
    }

    #[test]
    fn test_clean_think_tags() {
        let input = "<think>Some reasoning here</think>The actual response";
        assert_eq!(clean_llm_response(input), "The actual response");
    }

    #[test]
    fn test_clean_code_fence() {
        let input = "```json\n{\"kr\":\"a\",\"en\":\"b\"}\n```";
        assert_eq!(clean_llm_response(input), "{\"kr\":\"a\",\"en\":\"b\"}");
    }

    #[test]
    fn test_clean_multiple_newlines() {
        let input = "Line 1\n\n\n\n\nLine 2";
        assert_eq!(clean_llm_response(input), "Line 1\n\nLine 2");
    }

    #[test]
    fn test_parse_plain_json() {
        let pair: Pair = parse_json_reply(r#"{"kr":"버튼","en":"버튼(Button)"}"#).unwrap();
        assert_eq!(pair.en, "버튼(Button)");
    }

    #[test]
    fn test_parse_json_with_surrounding_prose() {
        let pair: Pair =
            parse_json_reply("Here you go:\n{\"kr\":\"a\",\"en\":\"b\"}\nThanks").unwrap();
        assert_eq!(pair, Pair { kr: "a".into(), en: "b".into() });
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(parse_json_reply::<Pair>("no json here").is_err());
    }
}
