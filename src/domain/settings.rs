use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Flat settings record shared by every screen. All fields are optional strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(deserialize_with = "lenient_string")]
    pub notion_token: String,
    #[serde(deserialize_with = "lenient_string")]
    pub database_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub slack_token: String,
    #[serde(deserialize_with = "lenient_string")]
    pub channel_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub company_slack_token: String,
    #[serde(deserialize_with = "lenient_string")]
    pub project_channel_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub assignee_user_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub deepl_api_key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub gemini_api_key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub glossary: String,
}

/// Accepts any scalar where a string is expected, so a numeric database id
/// written without quotes still loads. `null` reads as empty.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

/// Where a forwarded failure is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForwardTarget {
    #[default]
    Personal,
    Company,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionCredentials {
    pub token: String,
    pub database_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackRoute {
    pub target: ForwardTarget,
    pub token: String,
    pub channel: String,
    /// Only the company route mentions an assignee in a thread.
    pub assignee: Option<String>,
}

pub const SECRET_KEYS: [&str; 5] = [
    "notionToken",
    "slackToken",
    "companySlackToken",
    "deeplApiKey",
    "geminiApiKey",
];

impl Settings {
    pub fn require_notion(&self) -> Result<NotionCredentials> {
        let token = self.notion_token.trim();
        let database_id = normalize_database_id(&self.database_id);
        if token.is_empty() || database_id.is_empty() {
            return Err(AppError::Precondition(
                "Notion token and database id are required.".to_string(),
            ));
        }
        Ok(NotionCredentials {
            token: token.to_string(),
            database_id,
        })
    }

    pub fn require_slack(&self, target: ForwardTarget) -> Result<SlackRoute> {
        let (token, channel) = match target {
            ForwardTarget::Personal => (self.slack_token.trim(), self.channel_id.trim()),
            ForwardTarget::Company => (
                self.company_slack_token.trim(),
                self.project_channel_id.trim(),
            ),
        };
        if token.is_empty() || channel.is_empty() {
            return Err(AppError::Precondition(
                "Slack token and channel id are required.".to_string(),
            ));
        }
        let assignee = match target {
            ForwardTarget::Company => non_empty(&self.assignee_user_id),
            ForwardTarget::Personal => None,
        };
        Ok(SlackRoute {
            target,
            token: token.to_string(),
            channel: channel.to_string(),
            assignee,
        })
    }

    pub fn require_deepl(&self) -> Result<String> {
        non_empty(&self.deepl_api_key)
            .ok_or_else(|| AppError::Precondition("DeepL API key is required.".to_string()))
    }

    pub fn require_gemini(&self) -> Result<String> {
        non_empty(&self.gemini_api_key)
            .ok_or_else(|| AppError::Precondition("Gemini API key is required.".to_string()))
    }

    /// Reads a field by its persisted key name.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "notionToken" => &self.notion_token,
            "databaseId" => &self.database_id,
            "slackToken" => &self.slack_token,
            "channelId" => &self.channel_id,
            "companySlackToken" => &self.company_slack_token,
            "projectChannelId" => &self.project_channel_id,
            "assigneeUserId" => &self.assignee_user_id,
            "deeplApiKey" => &self.deepl_api_key,
            "geminiApiKey" => &self.gemini_api_key,
            "glossary" => &self.glossary,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = match key {
            "notionToken" => &mut self.notion_token,
            "databaseId" => &mut self.database_id,
            "slackToken" => &mut self.slack_token,
            "channelId" => &mut self.channel_id,
            "companySlackToken" => &mut self.company_slack_token,
            "projectChannelId" => &mut self.project_channel_id,
            "assigneeUserId" => &mut self.assignee_user_id,
            "deeplApiKey" => &mut self.deepl_api_key,
            "geminiApiKey" => &mut self.gemini_api_key,
            "glossary" => &mut self.glossary,
            other => {
                return Err(AppError::ValidationError(format!(
                    "Unknown setting: {}",
                    other
                )))
            }
        };
        *slot = value.trim().to_string();
        Ok(())
    }

    /// Copy without the secret fields, for writing to a plain file.
    pub fn without_secrets(&self) -> Settings {
        Settings {
            notion_token: String::new(),
            slack_token: String::new(),
            company_slack_token: String::new(),
            deepl_api_key: String::new(),
            gemini_api_key: String::new(),
            ..self.clone()
        }
    }
}

/// Notion accepts ids with or without dashes; the API paths use the bare form.
pub fn normalize_database_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notion_requires_token_and_database() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.require_notion(),
            Err(AppError::Precondition(_))
        ));

        settings.notion_token = " secret ".to_string();
        settings.database_id = "1a2b-3c4d ".to_string();
        let creds = settings.require_notion().unwrap();
        assert_eq!(creds.token, "secret");
        assert_eq!(creds.database_id, "1a2b3c4d");
    }

    #[test]
    fn company_route_carries_the_assignee() {
        let settings = Settings {
            company_slack_token: "xoxb-company".to_string(),
            project_channel_id: "C999".to_string(),
            assignee_user_id: "U42".to_string(),
            slack_token: "xoxb-personal".to_string(),
            channel_id: "C1".to_string(),
            ..Default::default()
        };
        let company = settings.require_slack(ForwardTarget::Company).unwrap();
        assert_eq!(company.channel, "C999");
        assert_eq!(company.assignee.as_deref(), Some("U42"));

        let personal = settings.require_slack(ForwardTarget::Personal).unwrap();
        assert_eq!(personal.channel, "C1");
        assert_eq!(personal.assignee, None);
    }

    #[test]
    fn keyed_access_matches_persisted_names() {
        let mut settings = Settings::default();
        settings.set("deeplApiKey", " key ").unwrap();
        assert_eq!(settings.get("deeplApiKey"), Some("key"));
        assert!(settings.set("bogus", "x").is_err());
        assert_eq!(settings.without_secrets().deepl_api_key, "");
    }

    #[test]
    fn scalar_values_load_as_text() {
        let settings: Settings = serde_json::from_str(
            r#"{"databaseId": 1234567890, "assigneeUserId": null, "channelId": true}"#,
        )
        .unwrap();
        assert_eq!(settings.database_id, "1234567890");
        assert_eq!(settings.assignee_user_id, "");
        assert_eq!(settings.channel_id, "true");
        assert_eq!(settings.glossary, "");
    }
}
