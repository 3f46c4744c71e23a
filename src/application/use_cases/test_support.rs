//! In-memory gateways recording every call, shared by the use case tests.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{GenerateRequest, LLMConfig};
use crate::domain::settings::{NotionCredentials, Settings};
use crate::domain::test_case::{RemoteTestItem, StagedItem};
use crate::infrastructure::config::{InMemorySettingsStore, SettingsProvider};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::notion::{NotionGateway, PagePatch, QueryFilter};
use crate::infrastructure::slack::{SlackGateway, SlackMessage};
use crate::infrastructure::translate::Translator;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub fn configured_settings() -> Arc<dyn SettingsProvider> {
    Arc::new(InMemorySettingsStore::new(Settings {
        notion_token: "secret_notion".to_string(),
        database_id: "db-1".to_string(),
        slack_token: "xoxb-personal".to_string(),
        channel_id: "C1".to_string(),
        company_slack_token: "xoxb-company".to_string(),
        project_channel_id: "C9".to_string(),
        assignee_user_id: "U42".to_string(),
        gemini_api_key: "gemini-key".to_string(),
        glossary: "버튼: Button".to_string(),
        ..Default::default()
    }))
}

pub fn remote_item(id: &str, no: &str) -> RemoteTestItem {
    RemoteTestItem {
        id: id.to_string(),
        no: no.to_string(),
        depth1: "Login".to_string(),
        check_point: "button".to_string(),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeNotion {
    pub pages: Mutex<Vec<RemoteTestItem>>,
    pub queries: Mutex<Vec<QueryFilter>>,
    pub patches: Mutex<Vec<(String, PagePatch)>>,
    pub created: Mutex<Vec<String>>,
    /// Page ids (for updates) or case numbers (for creation) that are rejected.
    pub reject: Mutex<HashMap<String, String>>,
    pub fail_query: Mutex<Option<AppError>>,
}

impl FakeNotion {
    pub fn with_pages(pages: Vec<RemoteTestItem>) -> Arc<Self> {
        let fake = Self::default();
        *fake.pages.lock().unwrap() = pages;
        Arc::new(fake)
    }

    pub fn reject(&self, key: &str, message: &str) {
        self.reject
            .lock()
            .unwrap()
            .insert(key.to_string(), message.to_string());
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().unwrap().len()
    }

    fn rejection(&self, key: &str) -> Result<()> {
        match self.reject.lock().unwrap().get(key) {
            Some(message) => Err(AppError::remote("notion", message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NotionGateway for FakeNotion {
    async fn query_database(
        &self,
        _creds: &NotionCredentials,
        filter: &QueryFilter,
    ) -> Result<Vec<RemoteTestItem>> {
        self.queries.lock().unwrap().push(filter.clone());
        if let Some(err) = self.fail_query.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn update_page(&self, _token: &str, page_id: &str, patch: &PagePatch) -> Result<()> {
        self.rejection(page_id)?;
        self.patches
            .lock()
            .unwrap()
            .push((page_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn create_page(&self, _creds: &NotionCredentials, item: &StagedItem) -> Result<String> {
        self.rejection(&item.no)?;
        self.created.lock().unwrap().push(item.no.clone());
        Ok(format!("page-{}", item.no))
    }
}

#[derive(Default)]
pub struct FakeSlack {
    pub posted: Mutex<Vec<(String, SlackMessage)>>,
    /// Channels whose posts are rejected; threaded posts are keyed as `thread`.
    pub reject: Mutex<HashMap<String, String>>,
}

impl FakeSlack {
    pub fn reject(&self, key: &str, error: &str) {
        self.reject
            .lock()
            .unwrap()
            .insert(key.to_string(), error.to_string());
    }
}

#[async_trait]
impl SlackGateway for FakeSlack {
    async fn post_message(&self, token: &str, message: &SlackMessage) -> Result<String> {
        let key = if message.thread_ts.is_some() {
            "thread".to_string()
        } else {
            message.channel.clone()
        };
        if let Some(error) = self.reject.lock().unwrap().get(&key) {
            return Err(AppError::remote("slack", error.clone()));
        }
        let mut posted = self.posted.lock().unwrap();
        posted.push((token.to_string(), message.clone()));
        Ok(format!("1700000000.{:06}", posted.len()))
    }
}

#[derive(Default)]
pub struct FakeTranslator {
    pub calls: Mutex<Vec<Vec<String>>>,
    pub fail_with: Mutex<Option<String>>,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(
        &self,
        _api_key: &str,
        texts: &[String],
        _source_lang: &str,
        _target_lang: &str,
    ) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(texts.to_vec());
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(AppError::remote("deepl", message));
        }
        Ok(texts.iter().map(|t| format!("EN:{}", t)).collect())
    }
}

/// Returns queued replies in order, then errors.
#[derive(Default)]
pub struct FakeLlm {
    pub replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
}

impl FakeLlm {
    pub fn replying(replies: Vec<&str>) -> Arc<Self> {
        let fake = Self::default();
        *fake.replies.lock().unwrap() = replies.into_iter().map(|r| Ok(r.to_string())).collect();
        Arc::new(fake)
    }
}

#[async_trait]
impl LLMClient for FakeLlm {
    async fn generate(&self, _config: &LLMConfig, request: &GenerateRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::remote("gemini", "no reply queued")))
    }
}
