pub mod properties;

use crate::domain::error::{AppError, Result};
use crate::domain::settings::NotionCredentials;
use crate::domain::test_case::{RemoteTestItem, StagedItem};
use async_trait::async_trait;
use properties::{creation_properties, QueryResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

pub use properties::{PagePatch, QueryFilter};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com";
pub const DEFAULT_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;
const SERVICE: &str = "notion";

#[async_trait]
pub trait NotionGateway: Send + Sync {
    /// All pages matching `filter`, following pagination to the end.
    async fn query_database(
        &self,
        creds: &NotionCredentials,
        filter: &QueryFilter,
    ) -> Result<Vec<RemoteTestItem>>;

    async fn update_page(&self, token: &str, page_id: &str, patch: &PagePatch) -> Result<()>;

    /// Creates a case page and returns its id.
    async fn create_page(&self, creds: &NotionCredentials, item: &StagedItem) -> Result<String>;
}

#[derive(Deserialize)]
struct NotionErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct CreatedPage {
    id: String,
}

pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    version: String,
}

impl NotionClient {
    pub fn new(client: reqwest::Client, base_url: &str, version: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            version: version.to_string(),
        }
    }

    async fn send(
        &self,
        method: reqwest::Method,
        token: &str,
        path: &str,
        body: &Value,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "Notion request");

        let response = self
            .client
            .request(method, &url)
            .bearer_auth(token.trim())
            .header("Notion-Version", &self.version)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Notion request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("Notion response unreadable: {}", e)))?;

        if !status.is_success() {
            return Err(rejection(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| AppError::ParseError(format!("Failed to parse Notion response: {}", e)))
    }
}

/// Notion errors look like `{"object":"error","code":"validation_error","message":"..."}`.
fn rejection(status: reqwest::StatusCode, body: &str) -> AppError {
    let message = match serde_json::from_str::<NotionErrorBody>(body) {
        Ok(NotionErrorBody {
            code: Some(code),
            message: Some(message),
        }) => format!("{}: {}", code, message),
        Ok(NotionErrorBody {
            message: Some(message),
            ..
        }) => message,
        _ => format!("Notion API error ({})", status),
    };
    AppError::remote(SERVICE, message)
}

#[async_trait]
impl NotionGateway for NotionClient {
    async fn query_database(
        &self,
        creds: &NotionCredentials,
        filter: &QueryFilter,
    ) -> Result<Vec<RemoteTestItem>> {
        let path = format!("/v1/databases/{}/query", creds.database_id);
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "filter": filter.to_json(), "page_size": PAGE_SIZE });
            if let Some(next) = &cursor {
                body["start_cursor"] = json!(next);
            }

            let raw = self
                .send(reqwest::Method::POST, &creds.token, &path, &body)
                .await?;
            let page: QueryResponse = serde_json::from_value(raw).map_err(|e| {
                AppError::ParseError(format!("Unexpected Notion query shape: {}", e))
            })?;

            items.extend(page.results.into_iter().map(|p| p.into_item()));
            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(count = items.len(), "Fetched Notion pages");
        Ok(items)
    }

    async fn update_page(&self, token: &str, page_id: &str, patch: &PagePatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let path = format!("/v1/pages/{}", page_id);
        let body = json!({ "properties": patch.to_properties() });
        self.send(reqwest::Method::PATCH, token, &path, &body)
            .await
            .map(|_| ())
    }

    async fn create_page(&self, creds: &NotionCredentials, item: &StagedItem) -> Result<String> {
        let body = json!({
            "parent": { "type": "database_id", "database_id": creds.database_id },
            "properties": creation_properties(item),
        });
        let raw = self
            .send(reqwest::Method::POST, &creds.token, "/v1/pages", &body)
            .await?;
        let created: CreatedPage = serde_json::from_value(raw)
            .map_err(|e| AppError::ParseError(format!("Unexpected Notion page shape: {}", e)))?;
        Ok(created.id)
    }
}
