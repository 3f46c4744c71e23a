use super::batch_pipeline::{BatchPipeline, PipelineSink};
use crate::domain::error::Result;
use crate::domain::pipeline::PipelineRunResult;
use crate::domain::test_case::{ItemStatus, StagedItem};
use crate::infrastructure::config::SettingsProvider;
use crate::infrastructure::csv::CaseSheetParser;
use crate::infrastructure::notion::NotionGateway;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Pasted or exported case sheets, staged and then created as Notion pages.
pub struct CaseUploadUseCase {
    notion: Arc<dyn NotionGateway>,
    settings: Arc<dyn SettingsProvider>,
    parser: CaseSheetParser,
    pipeline: BatchPipeline,
}

impl CaseUploadUseCase {
    pub fn new(
        notion: Arc<dyn NotionGateway>,
        settings: Arc<dyn SettingsProvider>,
        pace: Duration,
    ) -> Self {
        Self {
            notion,
            settings,
            parser: CaseSheetParser::new(),
            pipeline: BatchPipeline::new(pace),
        }
    }

    pub fn parse(&self, raw: &str) -> Result<Vec<StagedItem>> {
        let items = self.parser.parse_content(raw)?;
        info!(count = items.len(), "Staged pasted cases");
        Ok(items)
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<StagedItem>> {
        let items = self.parser.parse_file(path)?;
        info!(count = items.len(), file = %path.display(), "Staged cases from file");
        Ok(items)
    }

    /// Creates a page per actionable row. The list is emptied only when every
    /// row made it; otherwise the rows stay with their status and error.
    pub async fn upload(
        &self,
        items: &mut Vec<StagedItem>,
        sink: &dyn PipelineSink,
    ) -> Result<PipelineRunResult> {
        let creds = self.settings.current().require_notion()?;
        let notion = &self.notion;
        let creds = &creds;

        let result = self
            .pipeline
            .run(items.as_mut_slice(), sink, |item| async move {
                notion.create_page(creds, &item).await.map(|_| ())
            })
            .await;

        if result.should_clear_list()
            && items.iter().all(|item| item.status == ItemStatus::Success)
        {
            items.clear();
        }
        Ok(result)
    }
}
