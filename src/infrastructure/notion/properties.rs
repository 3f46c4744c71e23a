//! Wire shapes of the test case database.
//!
//! Pages are decoded into typed structs with explicit defaults, so the rest of
//! the crate only ever sees [`RemoteTestItem`].

use crate::domain::test_case::{DispatchState, RemoteTestItem, StagedItem, TestResult};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

pub const PROP_NO: &str = "No.";
pub const PROP_DEPTH1: &str = "1 Depth 화면";
pub const PROP_DEPTH2: &str = "2 Depth 영역";
pub const PROP_CHECK_POINT: &str = "확인 사항";
pub const PROP_SCENARIO: &str = "시나리오";
pub const PROP_TITLE: &str = "제목";
pub const PROP_BODY_LOCAL: &str = "본문 (한글)";
pub const PROP_BODY_TRANSLATED: &str = "본문 (영문)";
pub const PROP_IMAGE_URL: &str = "이미지 링크";
pub const PROP_RESULT: &str = "결과";
pub const PROP_DISPATCH: &str = "전송 상태";

/// Notion caps rich text content at 2000 characters per fragment.
const RICH_TEXT_LIMIT: usize = 2000;

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Property>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct Property {
    title: Option<Vec<RichText>>,
    rich_text: Option<Vec<RichText>>,
    select: Option<SelectOption>,
    url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RichText {
    plain_text: String,
    text: Option<TextContent>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TextContent {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SelectOption {
    name: String,
}

impl Property {
    /// First title or rich text fragment.
    fn first_text(&self) -> String {
        self.title
            .as_ref()
            .or(self.rich_text.as_ref())
            .and_then(|fragments| fragments.first())
            .map(|fragment| match &fragment.text {
                Some(text) => text.content.clone(),
                None => fragment.plain_text.clone(),
            })
            .unwrap_or_default()
    }

    fn select_name(&self) -> Option<&str> {
        self.select.as_ref().map(|select| select.name.as_str())
    }
}

impl Page {
    fn text(&self, name: &str) -> String {
        self.properties
            .get(name)
            .map(Property::first_text)
            .unwrap_or_default()
    }

    fn select(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Property::select_name)
    }

    pub fn into_item(self) -> RemoteTestItem {
        let result = match self.select(PROP_RESULT) {
            Some(raw) => TestResult::from_notion(raw).unwrap_or_else(|| {
                debug!(page = %self.id, value = raw, "Unknown result value, treating as pending");
                TestResult::Pending
            }),
            None => TestResult::Pending,
        };
        let dispatch_state = self
            .select(PROP_DISPATCH)
            .and_then(DispatchState::from_notion)
            .unwrap_or_default();

        RemoteTestItem {
            no: self.text(PROP_NO),
            depth1: self.select(PROP_DEPTH1).unwrap_or_default().to_string(),
            depth2: self.text(PROP_DEPTH2),
            check_point: self.text(PROP_CHECK_POINT),
            scenario: self.text(PROP_SCENARIO),
            title: self.text(PROP_TITLE),
            body_local: self.text(PROP_BODY_LOCAL),
            body_translated: self.text(PROP_BODY_TRANSLATED),
            image_url: self
                .properties
                .get(PROP_IMAGE_URL)
                .and_then(|prop| prop.url.clone())
                .unwrap_or_default(),
            result,
            dispatch_state,
            id: self.id,
        }
    }
}

/// Database query filter over the named properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    Result(TestResult),
    Dispatch(DispatchState),
    RichTextEmpty(&'static str),
    RichTextNotEmpty(&'static str),
    And(Vec<QueryFilter>),
}

impl QueryFilter {
    pub fn to_json(&self) -> Value {
        match self {
            QueryFilter::Result(result) => json!({
                "property": PROP_RESULT,
                "select": { "equals": result.as_notion() }
            }),
            QueryFilter::Dispatch(state) => json!({
                "property": PROP_DISPATCH,
                "select": { "equals": state.as_notion() }
            }),
            QueryFilter::RichTextEmpty(prop) => json!({
                "property": prop,
                "rich_text": { "is_empty": true }
            }),
            QueryFilter::RichTextNotEmpty(prop) => json!({
                "property": prop,
                "rich_text": { "is_not_empty": true }
            }),
            QueryFilter::And(filters) => json!({
                "and": filters.iter().map(QueryFilter::to_json).collect::<Vec<_>>()
            }),
        }
    }

    /// Pending cases awaiting a tester.
    pub fn pending_review() -> Self {
        QueryFilter::And(vec![QueryFilter::Result(TestResult::Pending)])
    }

    /// Failures not yet forwarded to Slack.
    pub fn unsent_failures() -> Self {
        QueryFilter::And(vec![
            QueryFilter::Result(TestResult::Fail),
            QueryFilter::Dispatch(DispatchState::Unsent),
        ])
    }

    /// Cases with a local body but no translation yet.
    pub fn untranslated() -> Self {
        QueryFilter::And(vec![
            QueryFilter::RichTextNotEmpty(PROP_BODY_LOCAL),
            QueryFilter::RichTextEmpty(PROP_BODY_TRANSLATED),
        ])
    }
}

/// Partial property update; only the fields that are set are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PagePatch {
    pub result: Option<TestResult>,
    pub dispatch_state: Option<DispatchState>,
    pub title: Option<String>,
    pub body_local: Option<String>,
    pub body_translated: Option<String>,
    /// `Some(None)` clears the link.
    pub image_url: Option<Option<String>>,
}

impl PagePatch {
    pub fn result(result: TestResult) -> Self {
        Self {
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn dispatch(state: DispatchState) -> Self {
        Self {
            dispatch_state: Some(state),
            ..Default::default()
        }
    }

    pub fn translated_body(body: impl Into<String>) -> Self {
        Self {
            body_translated: Some(body.into()),
            ..Default::default()
        }
    }

    /// The single composite write that records a failure.
    pub fn failure(
        title: impl Into<String>,
        body_local: impl Into<String>,
        body_translated: impl Into<String>,
        image_url: Option<String>,
    ) -> Self {
        Self {
            result: Some(TestResult::Fail),
            title: Some(title.into()),
            body_local: Some(body_local.into()),
            body_translated: Some(body_translated.into()),
            image_url: Some(image_url),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == PagePatch::default()
    }

    pub fn to_properties(&self) -> Value {
        let mut props = serde_json::Map::new();
        if let Some(result) = self.result {
            props.insert(PROP_RESULT.to_string(), select(result.as_notion()));
        }
        if let Some(state) = self.dispatch_state {
            props.insert(PROP_DISPATCH.to_string(), select(state.as_notion()));
        }
        if let Some(title) = &self.title {
            props.insert(PROP_TITLE.to_string(), rich_text(title));
        }
        if let Some(body) = &self.body_local {
            props.insert(PROP_BODY_LOCAL.to_string(), rich_text(body));
        }
        if let Some(body) = &self.body_translated {
            props.insert(PROP_BODY_TRANSLATED.to_string(), rich_text(body));
        }
        if let Some(url) = &self.image_url {
            props.insert(PROP_IMAGE_URL.to_string(), json!({ "url": url }));
        }
        Value::Object(props)
    }
}

/// Full property map for a new case; results start as PENDING / 미전송.
pub fn creation_properties(item: &StagedItem) -> Value {
    json!({
        PROP_NO: { "title": [{ "text": { "content": or_placeholder(&item.no, "-") } }] },
        PROP_DEPTH1: { "select": { "name": or_placeholder(&item.depth1, "N/A") } },
        PROP_DEPTH2: rich_text(&item.depth2),
        PROP_CHECK_POINT: rich_text(&item.check_point),
        PROP_SCENARIO: rich_text(&item.scenario),
        PROP_RESULT: select(TestResult::Pending.as_notion()),
        PROP_DISPATCH: select(DispatchState::Unsent.as_notion()),
    })
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

fn select(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

fn rich_text(content: &str) -> Value {
    let fragments: Vec<Value> = chunk_chars(content, RICH_TEXT_LIMIT)
        .into_iter()
        .map(|chunk| json!({ "text": { "content": chunk } }))
        .collect();
    json!({ "rich_text": fragments })
}

fn chunk_chars(content: &str, limit: usize) -> Vec<String> {
    if content.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(limit)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_fixture() -> Value {
        json!({
            "object": "page",
            "id": "page-1",
            "properties": {
                "No.": { "type": "title", "title": [{ "text": { "content": "Q1" }, "plain_text": "Q1" }] },
                "1 Depth 화면": { "type": "select", "select": { "name": "Login" } },
                "2 Depth 영역": { "type": "rich_text", "rich_text": [{ "plain_text": "Form" }] },
                "확인 사항": { "type": "rich_text", "rich_text": [] },
                "제목": { "type": "rich_text", "rich_text": [{ "text": { "content": "Broken" } }] },
                "이미지 링크": { "type": "url", "url": null },
                "결과": { "type": "select", "select": { "name": "FAIL" } },
                "전송 상태": { "type": "select", "select": { "name": "미전송" } }
            }
        })
    }

    #[test]
    fn decodes_a_page_with_explicit_defaults() {
        let page: Page = serde_json::from_value(page_fixture()).unwrap();
        let item = page.into_item();
        assert_eq!(item.id, "page-1");
        assert_eq!(item.no, "Q1");
        assert_eq!(item.depth1, "Login");
        assert_eq!(item.depth2, "Form");
        assert_eq!(item.check_point, "");
        assert_eq!(item.scenario, "");
        assert_eq!(item.title, "Broken");
        assert_eq!(item.image_url, "");
        assert_eq!(item.result, TestResult::Fail);
        assert_eq!(item.dispatch_state, DispatchState::Unsent);
    }

    #[test]
    fn missing_selects_fall_back_to_initial_states() {
        let page: Page =
            serde_json::from_value(json!({ "id": "p", "properties": { "결과": { "select": null } } }))
                .unwrap();
        let item = page.into_item();
        assert_eq!(item.result, TestResult::Pending);
        assert_eq!(item.dispatch_state, DispatchState::Unsent);
    }

    #[test]
    fn unsent_failure_filter_shape() {
        assert_eq!(
            QueryFilter::unsent_failures().to_json(),
            json!({ "and": [
                { "property": "결과", "select": { "equals": "FAIL" } },
                { "property": "전송 상태", "select": { "equals": "미전송" } }
            ]})
        );
    }

    #[test]
    fn patch_only_writes_supplied_properties() {
        let props = PagePatch::dispatch(DispatchState::Sent).to_properties();
        let map = props.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["전송 상태"], json!({ "select": { "name": "전송완료" } }));
    }

    #[test]
    fn failure_patch_writes_all_detail_fields_together() {
        let props = PagePatch::failure("Title", "본문", "Body", None).to_properties();
        let map = props.as_object().unwrap();
        assert_eq!(map.len(), 5);
        assert_eq!(map["결과"], json!({ "select": { "name": "FAIL" } }));
        assert_eq!(map["이미지 링크"], json!({ "url": null }));
    }

    #[test]
    fn creation_sets_initial_result_and_dispatch() {
        let item = StagedItem::new(0, "", "", "", "button", "");
        let props = creation_properties(&item);
        assert_eq!(props["No."]["title"][0]["text"]["content"], "-");
        assert_eq!(props["1 Depth 화면"]["select"]["name"], "N/A");
        assert_eq!(props["결과"]["select"]["name"], "PENDING");
        assert_eq!(props["전송 상태"]["select"]["name"], "미전송");
    }

    #[test]
    fn long_text_is_split_into_fragments() {
        let body = "가".repeat(RICH_TEXT_LIMIT + 5);
        let value = rich_text(&body);
        let fragments = value["rich_text"].as_array().unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[1]["text"]["content"].as_str().unwrap().chars().count(),
            5
        );
    }
}
