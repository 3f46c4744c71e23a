use serde::{Deserialize, Serialize};

/// Published to the log sink as a run progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PipelineEvent {
    Started { run_id: String, total: usize },
    ItemStarted { index: usize, label: String },
    ItemSucceeded { index: usize, label: String },
    ItemFailed { index: usize, label: String, message: String },
    Finished { run_id: String, tally: PipelineTally },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl PipelineTally {
    /// A clean run lets the caller drop its staged list; otherwise the rows stay visible.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub index: usize,
    pub label: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ItemOutcome {
    pub fn log_line(&self) -> String {
        match (&self.message, self.succeeded) {
            (_, true) => format!("[{}] succeeded", self.label),
            (Some(message), false) => format!("[{}] failed: {}", self.label, message),
            (None, false) => format!("[{}] failed", self.label),
        }
    }
}

/// Ordered per-item outcomes of one run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunResult {
    pub run_id: String,
    pub outcomes: Vec<ItemOutcome>,
    pub tally: PipelineTally,
    /// Rows the run passed over because they were not in an actionable state.
    pub skipped: usize,
    pub started_at: i64,
    pub finished_at: i64,
}

impl PipelineRunResult {
    pub fn should_clear_list(&self) -> bool {
        self.tally.is_clean()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.outcomes.iter().map(ItemOutcome::log_line).collect()
    }
}
