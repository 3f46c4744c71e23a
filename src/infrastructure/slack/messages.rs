use super::SlackMessage;
use crate::domain::test_case::RemoteTestItem;
use serde_json::{json, Value};

fn or_fallback<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn header(text: String) -> Value {
    json!({ "type": "header", "text": { "type": "plain_text", "text": text, "emoji": true } })
}

fn section(text: String) -> Value {
    json!({ "type": "section", "text": { "type": "mrkdwn", "text": text } })
}

fn image(url: &str, alt: &str) -> Option<Value> {
    if url.trim().is_empty() {
        return None;
    }
    Some(json!({ "type": "image", "image_url": url, "alt_text": alt }))
}

/// Failure report for the tester's own channel.
pub fn personal_report(item: &RemoteTestItem, channel: &str) -> SlackMessage {
    let mut blocks = vec![
        header(format!("🚨 {}", or_fallback(&item.title, "QA 테스트 FAIL"))),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*No:*\n{}", item.no) },
                { "type": "mrkdwn", "text": format!("*화면:*\n{}", item.screen_path()) }
            ]
        }),
        section(format!("*확인 사항:*\n{}", item.check_point)),
        section(format!("*시나리오:*\n{}", item.scenario)),
        section(format!(
            "*상세 내용:*\n{}",
            or_fallback(&item.body_local, "(내용 없음)")
        )),
        json!({ "type": "divider" }),
    ];
    blocks.extend(image(&item.image_url, "Screenshot"));

    SlackMessage {
        channel: channel.to_string(),
        text: "🚨 QA 테스트 FAIL 발생".to_string(),
        blocks,
        thread_ts: None,
    }
}

/// Bug report for the project tracker channel.
pub fn company_report(item: &RemoteTestItem, channel: &str) -> SlackMessage {
    let description = or_fallback(
        &item.body_translated,
        or_fallback(&item.body_local, "(No description)"),
    );
    let mut blocks = vec![
        header(format!("🐛 {}", or_fallback(&item.title, "Bug Report"))),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*No:*\n{}", item.no) },
                { "type": "mrkdwn", "text": format!("*Screen:*\n{}", item.screen_path()) }
            ]
        }),
        section(format!("*Description (EN):*\n{}", description)),
        section(format!(
            "*상세 설명 (KR):*\n{}",
            or_fallback(&item.body_local, "(내용 없음)")
        )),
        json!({ "type": "divider" }),
    ];
    blocks.extend(image(&item.image_url, "Bug Screenshot"));

    SlackMessage {
        channel: channel.to_string(),
        text: format!("🐛 Bug Report: {}", or_fallback(&item.title, &item.no)),
        blocks,
        thread_ts: None,
    }
}

/// Threaded mention asking the assignee to pick the issue up.
pub fn assignee_followup(channel: &str, thread_ts: &str, assignee: &str) -> SlackMessage {
    SlackMessage {
        channel: channel.to_string(),
        text: format!("<@{}> 이 이슈를 확인해주세요.", assignee),
        blocks: Vec::new(),
        thread_ts: Some(thread_ts.to_string()),
    }
}
