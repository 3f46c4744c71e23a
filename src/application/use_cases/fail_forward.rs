use super::batch_pipeline::{BatchPipeline, PipelineItem, PipelineSink};
use crate::domain::error::{AppError, Result};
use crate::domain::pipeline::PipelineRunResult;
use crate::domain::settings::{ForwardTarget, SlackRoute};
use crate::domain::test_case::{DispatchState, ItemStatus, RemoteTestItem};
use crate::infrastructure::config::SettingsProvider;
use crate::infrastructure::notion::{NotionGateway, PagePatch, QueryFilter};
use crate::infrastructure::slack::{messages, SlackGateway};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A failed case waiting to be forwarded, with its progress in the current run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRow {
    pub item: RemoteTestItem,
    pub status: ItemStatus,
    pub error_message: Option<String>,
    /// Timestamp of the primary Slack post once delivered.
    pub thread_ts: Option<String>,
}

impl ForwardRow {
    pub fn new(item: RemoteTestItem) -> Self {
        Self {
            item,
            status: ItemStatus::Ready,
            error_message: None,
            thread_ts: None,
        }
    }

    fn step(&mut self, next: ItemStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "case {} cannot go from {} to {}",
                self.item.no, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

impl PipelineItem for ForwardRow {
    type Output = String;

    fn label(&self) -> String {
        self.item.no.clone()
    }

    fn is_actionable(&self) -> bool {
        self.item.dispatch_state == DispatchState::Unsent
            && matches!(self.status, ItemStatus::Ready | ItemStatus::Error)
    }

    fn begin(&mut self) -> Result<()> {
        self.step(ItemStatus::Uploading)?;
        self.error_message = None;
        Ok(())
    }

    fn succeed(&mut self, ts: String) -> Result<()> {
        self.step(ItemStatus::Success)?;
        self.thread_ts = Some(ts);
        self.item.record_dispatch(DispatchState::Sent)
    }

    fn fail(&mut self, message: &str) -> Result<()> {
        self.step(ItemStatus::Error)?;
        self.error_message = Some(message.to_string());
        Ok(())
    }
}

/// Forwards recorded failures to Slack and marks them sent in Notion.
///
/// Per case the composite is: primary post, then the threaded assignee
/// mention when one is configured, then the Notion patch to `전송완료`.
/// A failure after the primary post is reported as a partial failure. The
/// message is already in Slack at that point but the case is still `미전송`,
/// so the next fetch offers it again and a resend duplicates it.
pub struct FailForwardUseCase {
    notion: Arc<dyn NotionGateway>,
    slack: Arc<dyn SlackGateway>,
    settings: Arc<dyn SettingsProvider>,
    pipeline: BatchPipeline,
}

impl FailForwardUseCase {
    pub fn new(
        notion: Arc<dyn NotionGateway>,
        slack: Arc<dyn SlackGateway>,
        settings: Arc<dyn SettingsProvider>,
        pace: Duration,
    ) -> Self {
        Self {
            notion,
            slack,
            settings,
            pipeline: BatchPipeline::new(pace),
        }
    }

    /// Failed cases not yet sent. An empty result is not an error.
    pub async fn fetch_pending(&self) -> Result<Vec<ForwardRow>> {
        let creds = self.settings.current().require_notion()?;
        let items = self
            .notion
            .query_database(&creds, &QueryFilter::unsent_failures())
            .await?;
        info!(count = items.len(), "Fetched unsent failures");
        Ok(items.into_iter().map(ForwardRow::new).collect())
    }

    pub async fn forward(
        &self,
        target: ForwardTarget,
        rows: &mut Vec<ForwardRow>,
        sink: &dyn PipelineSink,
    ) -> Result<PipelineRunResult> {
        let settings = self.settings.current();
        let route = settings.require_slack(target)?;
        let creds = settings.require_notion()?;
        let notion_token = creds.token.as_str();
        let route = &route;

        let result = self
            .pipeline
            .run(rows.as_mut_slice(), sink, |row| async move {
                self.forward_one(route, notion_token, row).await
            })
            .await;

        if result.should_clear_list() {
            rows.clear();
        }
        Ok(result)
    }

    async fn forward_one(
        &self,
        route: &SlackRoute,
        notion_token: &str,
        row: ForwardRow,
    ) -> Result<String> {
        let message = match route.target {
            ForwardTarget::Personal => messages::personal_report(&row.item, &route.channel),
            ForwardTarget::Company => messages::company_report(&row.item, &route.channel),
        };
        let ts = self.slack.post_message(&route.token, &message).await?;

        if let Some(assignee) = &route.assignee {
            let followup = messages::assignee_followup(&route.channel, &ts, assignee);
            if let Err(err) = self.slack.post_message(&route.token, &followup).await {
                warn!(no = %row.item.no, error = %err, "Assignee mention failed after report was posted");
                return Err(AppError::PartialFailure(format!(
                    "report posted but assignee mention failed: {}",
                    err
                )));
            }
        }

        let patch = PagePatch::dispatch(DispatchState::Sent);
        if let Err(err) = self.notion.update_page(notion_token, &row.item.id, &patch).await {
            warn!(no = %row.item.no, error = %err, "Slack post is not reflected in Notion");
            return Err(AppError::PartialFailure(format!(
                "posted to Slack but dispatch state was not updated: {}",
                err
            )));
        }
        Ok(ts)
    }

    /// Parks a case as `보류` so it no longer shows up for forwarding.
    pub async fn hold(&self, row: &mut ForwardRow) -> Result<()> {
        if !row
            .item
            .dispatch_state
            .can_transition_to(DispatchState::Held)
        {
            return Err(AppError::InvalidTransition(format!(
                "case {} is already {}",
                row.item.no,
                row.item.dispatch_state.as_notion()
            )));
        }
        let creds = self.settings.current().require_notion()?;
        self.notion
            .update_page(&creds.token, &row.item.id, &PagePatch::dispatch(DispatchState::Held))
            .await?;
        row.item.record_dispatch(DispatchState::Held)?;
        info!(no = %row.item.no, "Case put on hold");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::batch_pipeline::TracingSink;
    use crate::application::use_cases::test_support::{
        configured_settings, remote_item, FakeNotion, FakeSlack,
    };

    fn failed(id: &str, no: &str) -> RemoteTestItem {
        RemoteTestItem {
            result: crate::domain::test_case::TestResult::Fail,
            ..remote_item(id, no)
        }
    }

    fn use_case(notion: Arc<FakeNotion>, slack: Arc<FakeSlack>) -> FailForwardUseCase {
        FailForwardUseCase::new(notion, slack, configured_settings(), Duration::ZERO)
    }

    #[tokio::test]
    async fn fetch_uses_the_unsent_failure_filter() {
        let notion = FakeNotion::with_pages(vec![failed("p1", "Q1")]);
        let rows = use_case(notion.clone(), Arc::new(FakeSlack::default()))
            .fetch_pending()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ItemStatus::Ready);
        assert_eq!(
            notion.queries.lock().unwrap()[0],
            QueryFilter::unsent_failures()
        );
    }

    #[tokio::test]
    async fn company_forward_threads_the_assignee_then_patches() {
        let notion = Arc::new(FakeNotion::default());
        let slack = Arc::new(FakeSlack::default());
        let forwarder = use_case(notion.clone(), slack.clone());
        let mut rows = vec![ForwardRow::new(failed("p1", "Q1"))];

        let result = forwarder
            .forward(ForwardTarget::Company, &mut rows, &TracingSink)
            .await
            .unwrap();

        assert!(result.should_clear_list());
        assert!(rows.is_empty());
        let posted = slack.posted.lock().unwrap();
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0].0, "xoxb-company");
        assert_eq!(posted[0].1.channel, "C9");
        assert_eq!(posted[1].1.thread_ts.as_deref(), Some("1700000000.000001"));
        let patches = notion.patches.lock().unwrap();
        assert_eq!(patches[0].0, "p1");
        assert_eq!(patches[0].1, PagePatch::dispatch(DispatchState::Sent));
    }

    #[tokio::test]
    async fn personal_forward_posts_once() {
        let notion = Arc::new(FakeNotion::default());
        let slack = Arc::new(FakeSlack::default());
        let mut rows = vec![ForwardRow::new(failed("p1", "Q1"))];

        use_case(notion, slack.clone())
            .forward(ForwardTarget::Personal, &mut rows, &TracingSink)
            .await
            .unwrap();

        let posted = slack.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1.channel, "C1");
        assert!(posted[0].1.thread_ts.is_none());
    }

    #[tokio::test]
    async fn patch_failure_after_post_is_a_recorded_failure() {
        let notion = Arc::new(FakeNotion::default());
        notion.reject("p2", "Could not find page");
        let slack = Arc::new(FakeSlack::default());
        let mut rows = vec![
            ForwardRow::new(failed("p1", "Q1")),
            ForwardRow::new(failed("p2", "Q2")),
        ];

        let result = use_case(notion, slack)
            .forward(ForwardTarget::Personal, &mut rows, &TracingSink)
            .await
            .unwrap();

        assert_eq!(result.tally.succeeded, 1);
        assert_eq!(result.tally.failed, 1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item.dispatch_state, DispatchState::Sent);
        assert_eq!(rows[1].status, ItemStatus::Error);
        assert_eq!(rows[1].item.dispatch_state, DispatchState::Unsent);
        assert!(rows[1]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Partial failure: posted to Slack"));
    }

    #[tokio::test]
    async fn rejected_primary_post_skips_the_patch() {
        let notion = Arc::new(FakeNotion::default());
        let slack = Arc::new(FakeSlack::default());
        slack.reject("C1", "channel_not_found");
        let mut rows = vec![ForwardRow::new(failed("p1", "Q1"))];

        use_case(notion.clone(), slack)
            .forward(ForwardTarget::Personal, &mut rows, &TracingSink)
            .await
            .unwrap();

        assert_eq!(rows[0].error_message.as_deref(), Some("channel_not_found"));
        assert_eq!(notion.patch_count(), 0);
    }

    #[tokio::test]
    async fn failed_mention_is_partial_and_not_patched() {
        let notion = Arc::new(FakeNotion::default());
        let slack = Arc::new(FakeSlack::default());
        slack.reject("thread", "not_in_channel");
        let mut rows = vec![ForwardRow::new(failed("p1", "Q1"))];

        let result = use_case(notion.clone(), slack)
            .forward(ForwardTarget::Company, &mut rows, &TracingSink)
            .await
            .unwrap();

        assert_eq!(result.tally.failed, 1);
        assert!(rows[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("assignee mention failed"));
        assert_eq!(notion.patch_count(), 0);
    }

    #[tokio::test]
    async fn missing_slack_route_fails_before_any_post() {
        let notion = Arc::new(FakeNotion::default());
        let slack = Arc::new(FakeSlack::default());
        let forwarder = FailForwardUseCase::new(
            notion,
            slack.clone(),
            Arc::new(crate::infrastructure::config::InMemorySettingsStore::new(
                Default::default(),
            )),
            Duration::ZERO,
        );
        let mut rows = vec![ForwardRow::new(failed("p1", "Q1"))];

        let err = forwarder
            .forward(ForwardTarget::Company, &mut rows, &TracingSink)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Precondition(_)));
        assert!(slack.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hold_only_leaves_unsent() {
        let notion = Arc::new(FakeNotion::default());
        let forwarder = use_case(notion.clone(), Arc::new(FakeSlack::default()));
        let mut row = ForwardRow::new(failed("p1", "Q1"));

        forwarder.hold(&mut row).await.unwrap();
        assert_eq!(row.item.dispatch_state, DispatchState::Held);
        assert!(!row.is_actionable());

        let again = forwarder.hold(&mut row).await;
        assert!(matches!(again, Err(AppError::InvalidTransition(_))));
        assert_eq!(notion.patch_count(), 1);
    }
}
