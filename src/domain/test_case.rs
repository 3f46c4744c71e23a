use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a row while a pipeline run pushes it to a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Ready,
    Uploading,
    Success,
    Error,
}

impl ItemStatus {
    /// `Error -> Uploading` is the retry edge for rows a failed run left behind.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Ready, Uploading) | (Error, Uploading) | (Uploading, Success) | (Uploading, Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Success | ItemStatus::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemStatus::Ready => "ready",
            ItemStatus::Uploading => "uploading",
            ItemStatus::Success => "success",
            ItemStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// A parsed row awaiting creation in Notion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedItem {
    pub sequence_id: usize,
    pub no: String,
    pub depth1: String,
    pub depth2: String,
    pub check_point: String,
    pub scenario: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StagedItem {
    pub fn new(
        sequence_id: usize,
        no: impl Into<String>,
        depth1: impl Into<String>,
        depth2: impl Into<String>,
        check_point: impl Into<String>,
        scenario: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id,
            no: no.into(),
            depth1: depth1.into(),
            depth2: depth2.into(),
            check_point: check_point.into(),
            scenario: scenario.into(),
            status: ItemStatus::Ready,
            error_message: None,
        }
    }

    /// A row must carry a case number, a screen or a check point to be staged.
    pub fn has_content(&self) -> bool {
        !self.no.is_empty() || !self.depth1.is_empty() || !self.check_point.is_empty()
    }

    pub fn transition(&mut self, next: ItemStatus, message: Option<String>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "row {} cannot move from {} to {}",
                self.sequence_id, self.status, next
            )));
        }
        self.status = next;
        self.error_message = match next {
            ItemStatus::Error => Some(message.unwrap_or_default()),
            _ => None,
        };
        Ok(())
    }
}

/// The `결과` select of a test case page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResult {
    #[default]
    Pending,
    Pass,
    Fail,
    Delete,
}

impl TestResult {
    pub fn as_notion(self) -> &'static str {
        match self {
            TestResult::Pending => "PENDING",
            TestResult::Pass => "PASS",
            TestResult::Fail => "FAIL",
            TestResult::Delete => "DELETE",
        }
    }

    pub fn from_notion(value: &str) -> Option<Self> {
        match value.trim() {
            "PENDING" => Some(TestResult::Pending),
            "PASS" => Some(TestResult::Pass),
            "FAIL" => Some(TestResult::Fail),
            "DELETE" => Some(TestResult::Delete),
            _ => None,
        }
    }

    /// Dispositions are final: only a pending case can be resolved.
    pub fn can_transition_to(self, next: TestResult) -> bool {
        self == TestResult::Pending && next != TestResult::Pending
    }
}

/// The `전송 상태` select tracking whether a failing case went downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DispatchState {
    #[default]
    Unsent,
    Sent,
    Held,
}

impl DispatchState {
    pub fn as_notion(self) -> &'static str {
        match self {
            DispatchState::Unsent => "미전송",
            DispatchState::Sent => "전송완료",
            DispatchState::Held => "보류",
        }
    }

    pub fn from_notion(value: &str) -> Option<Self> {
        match value.trim() {
            "미전송" => Some(DispatchState::Unsent),
            "전송완료" => Some(DispatchState::Sent),
            "보류" => Some(DispatchState::Held),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: DispatchState) -> bool {
        self == DispatchState::Unsent && next != DispatchState::Unsent
    }
}

/// Read projection of a Notion test case page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTestItem {
    pub id: String,
    pub no: String,
    pub depth1: String,
    pub depth2: String,
    pub check_point: String,
    pub scenario: String,
    pub title: String,
    pub body_local: String,
    pub body_translated: String,
    pub image_url: String,
    pub result: TestResult,
    pub dispatch_state: DispatchState,
}

impl RemoteTestItem {
    /// Applies a confirmed result change to the local copy.
    pub fn record_result(&mut self, next: TestResult) -> Result<()> {
        if !self.result.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "case {} is already {}",
                self.no,
                self.result.as_notion()
            )));
        }
        self.result = next;
        Ok(())
    }

    pub fn record_dispatch(&mut self, next: DispatchState) -> Result<()> {
        if !self.dispatch_state.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "case {} dispatch is already {}",
                self.no,
                self.dispatch_state.as_notion()
            )));
        }
        self.dispatch_state = next;
        Ok(())
    }

    pub fn screen_path(&self) -> String {
        format!("{} > {}", self.depth1, self.depth2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_status_follows_the_upload_lifecycle() {
        let mut item = StagedItem::new(0, "Q1", "Login", "", "button", "");
        assert!(item.transition(ItemStatus::Success, None).is_err());

        item.transition(ItemStatus::Uploading, None).unwrap();
        item.transition(ItemStatus::Error, Some("database_id invalid".to_string()))
            .unwrap();
        assert_eq!(item.error_message.as_deref(), Some("database_id invalid"));

        item.transition(ItemStatus::Uploading, None).unwrap();
        assert_eq!(item.error_message, None);
        item.transition(ItemStatus::Success, None).unwrap();
        assert!(item.transition(ItemStatus::Uploading, None).is_err());
    }

    #[test]
    fn results_are_not_reversible() {
        let mut item = RemoteTestItem {
            no: "Q1".to_string(),
            ..Default::default()
        };
        item.record_result(TestResult::Fail).unwrap();
        assert!(item.record_result(TestResult::Pass).is_err());
        assert!(item.record_result(TestResult::Pending).is_err());
    }

    #[test]
    fn dispatch_only_moves_out_of_unsent() {
        assert!(DispatchState::Unsent.can_transition_to(DispatchState::Sent));
        assert!(DispatchState::Unsent.can_transition_to(DispatchState::Held));
        assert!(!DispatchState::Held.can_transition_to(DispatchState::Sent));
        assert!(!DispatchState::Sent.can_transition_to(DispatchState::Unsent));
    }

    #[test]
    fn notion_labels_round_trip() {
        for state in [DispatchState::Unsent, DispatchState::Sent, DispatchState::Held] {
            assert_eq!(DispatchState::from_notion(state.as_notion()), Some(state));
        }
        assert_eq!(TestResult::from_notion("FAIL"), Some(TestResult::Fail));
        assert_eq!(TestResult::from_notion("unknown"), None);
    }
}
