use super::batch_pipeline::{BatchPipeline, PipelineItem, PipelineSink};
use crate::domain::error::{AppError, Result};
use crate::domain::pipeline::PipelineRunResult;
use crate::domain::test_case::RemoteTestItem;
use crate::domain::translation::{TranslationPass, TranslationRow, TranslationStatus};
use crate::infrastructure::config::SettingsProvider;
use crate::infrastructure::notion::{NotionGateway, PagePatch, QueryFilter};
use crate::infrastructure::translate::Translator;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One impl for both passes; `pass` picks the step so either run works on
/// the shared list in place.
impl PipelineItem for TranslationRow {
    /// The translated text, or the text written back by a save.
    type Output = String;

    fn label(&self) -> String {
        self.item.no.clone()
    }

    fn is_actionable(&self) -> bool {
        match self.pass {
            TranslationPass::Translate => {
                !self.has_translation()
                    && matches!(
                        self.status,
                        TranslationStatus::Ready | TranslationStatus::Error
                    )
            }
            TranslationPass::Save => {
                self.has_translation()
                    && matches!(
                        self.status,
                        TranslationStatus::Translated | TranslationStatus::Error
                    )
            }
        }
    }

    fn begin(&mut self) -> Result<()> {
        match self.pass {
            TranslationPass::Translate => self.transition(TranslationStatus::Translating, None),
            TranslationPass::Save => self.transition(TranslationStatus::Saving, None),
        }
    }

    fn succeed(&mut self, text: String) -> Result<()> {
        match self.pass {
            TranslationPass::Translate => {
                self.translated = text;
                self.transition(TranslationStatus::Translated, None)
            }
            TranslationPass::Save => {
                self.item.body_translated = text;
                self.transition(TranslationStatus::Saved, None)
            }
        }
    }

    fn fail(&mut self, message: &str) -> Result<()> {
        self.transition(TranslationStatus::Error, Some(message.to_string()))
    }
}

fn set_pass(rows: &mut [TranslationRow], pass: TranslationPass) {
    for row in rows.iter_mut() {
        row.pass = pass;
    }
}

/// Fills in missing English bodies for cases that only have Korean text.
pub struct BulkTranslateUseCase {
    notion: Arc<dyn NotionGateway>,
    translator: Arc<dyn Translator>,
    settings: Arc<dyn SettingsProvider>,
    pipeline: BatchPipeline,
    source_lang: String,
    target_lang: String,
}

impl BulkTranslateUseCase {
    pub fn new(
        notion: Arc<dyn NotionGateway>,
        translator: Arc<dyn Translator>,
        settings: Arc<dyn SettingsProvider>,
        pace: Duration,
        source_lang: &str,
        target_lang: &str,
    ) -> Self {
        Self {
            notion,
            translator,
            settings,
            pipeline: BatchPipeline::new(pace),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }

    pub async fn load(&self) -> Result<Vec<TranslationRow>> {
        let creds = self.settings.current().require_notion()?;
        let items = self
            .notion
            .query_database(&creds, &QueryFilter::untranslated())
            .await?;
        info!(count = items.len(), "Fetched untranslated cases");
        Ok(items.into_iter().map(TranslationRow::new).collect())
    }

    async fn translate_body(&self, api_key: &str, item: &RemoteTestItem) -> Result<String> {
        let texts = [item.body_local.clone()];
        let mut translated = self
            .translator
            .translate(api_key, &texts, &self.source_lang, &self.target_lang)
            .await?;
        translated
            .pop()
            .ok_or_else(|| AppError::remote("deepl", "empty translation"))
    }

    /// Translates every row that has no foreign body yet.
    pub async fn translate_all(
        &self,
        rows: &mut [TranslationRow],
        sink: &dyn PipelineSink,
    ) -> Result<PipelineRunResult> {
        let api_key = self.settings.current().require_deepl()?;
        let api_key = api_key.as_str();
        set_pass(rows, TranslationPass::Translate);
        Ok(self
            .pipeline
            .run(rows, sink, |row| async move {
                self.translate_body(api_key, &row.item).await
            })
            .await)
    }

    /// Re-translates one row, overwriting any manual edit.
    pub async fn translate_one(&self, rows: &mut [TranslationRow], index: usize) -> Result<()> {
        let api_key = self.settings.current().require_deepl()?;
        let row = row_at(rows, index)?;
        row.transition(TranslationStatus::Translating, None)?;
        match self.translate_body(&api_key, &row.item).await {
            Ok(text) => {
                row.translated = text;
                row.transition(TranslationStatus::Translated, None)
            }
            Err(err) => {
                row.transition(TranslationStatus::Error, Some(err.to_string()))?;
                Err(err)
            }
        }
    }

    pub fn edit_translation(
        &self,
        rows: &mut [TranslationRow],
        index: usize,
        text: &str,
    ) -> Result<()> {
        row_at(rows, index)?.edit(text)
    }

    /// Writes every translated, unsaved row back. The list is emptied once
    /// every row is saved.
    pub async fn save_all(
        &self,
        rows: &mut Vec<TranslationRow>,
        sink: &dyn PipelineSink,
    ) -> Result<PipelineRunResult> {
        let creds = self.settings.current().require_notion()?;
        let notion = &self.notion;
        let token = creds.token.as_str();

        set_pass(rows, TranslationPass::Save);
        let result = self
            .pipeline
            .run(rows.as_mut_slice(), sink, |row| async move {
                let patch = PagePatch::translated_body(row.translated.clone());
                notion
                    .update_page(token, &row.item.id, &patch)
                    .await
                    .map(|_| row.translated)
            })
            .await;
        set_pass(rows, TranslationPass::Translate);

        if result.should_clear_list()
            && rows
                .iter()
                .all(|row| row.status == TranslationStatus::Saved)
        {
            rows.clear();
        }
        Ok(result)
    }

    pub async fn save_one(&self, rows: &mut [TranslationRow], index: usize) -> Result<()> {
        let creds = self.settings.current().require_notion()?;
        let row = row_at(rows, index)?;
        if !row.has_translation() {
            return Err(AppError::ValidationError(format!(
                "case {} has no translation to save",
                row.item.no
            )));
        }
        row.transition(TranslationStatus::Saving, None)?;
        let patch = PagePatch::translated_body(row.translated.clone());
        match self.notion.update_page(&creds.token, &row.item.id, &patch).await {
            Ok(()) => {
                row.item.body_translated = row.translated.clone();
                row.transition(TranslationStatus::Saved, None)
            }
            Err(err) => {
                row.transition(TranslationStatus::Error, Some(err.to_string()))?;
                Err(err)
            }
        }
    }
}

fn row_at(rows: &mut [TranslationRow], index: usize) -> Result<&mut TranslationRow> {
    let len = rows.len();
    rows.get_mut(index).ok_or_else(|| {
        AppError::ValidationError(format!("row {} out of range ({} rows)", index, len))
    })
}
