use super::review_cursor::{CursorStep, ReviewCursor};
use crate::domain::error::{AppError, Result};
use crate::domain::qa_report::FailSubmission;
use crate::domain::settings::Settings;
use crate::domain::test_case::{RemoteTestItem, TestResult};
use crate::infrastructure::config::SettingsProvider;
use crate::infrastructure::notion::{NotionGateway, PagePatch, QueryFilter};
use crate::infrastructure::translate::Translator;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ReviewMode {
    #[default]
    Browsing,
    /// The fail form is open for the current item. Nothing is written yet.
    FailCapture,
}

/// What the tester screen renders after every action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub current: Option<RemoteTestItem>,
    pub position: usize,
    pub total: usize,
    pub mode: ReviewMode,
    pub pending_delete: Option<String>,
    /// Set when the last action consumed the final item.
    pub finished: bool,
}

/// Handed out by `request_delete`; the delete only happens once it is echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteConfirmation {
    pub item_id: String,
    pub no: String,
}

#[derive(Default)]
struct ReviewState {
    cursor: ReviewCursor<RemoteTestItem>,
    mode: ReviewMode,
    pending_delete: Option<String>,
}

impl ReviewState {
    fn view(&self, finished: bool) -> ReviewView {
        ReviewView {
            current: self.cursor.current().cloned(),
            position: self.cursor.index(),
            total: self.cursor.len(),
            mode: self.mode,
            pending_delete: self.pending_delete.clone(),
            finished,
        }
    }

    fn current_id(&self) -> Result<String> {
        self.cursor
            .current()
            .map(|item| item.id.clone())
            .ok_or_else(|| AppError::ValidationError("No case to review".to_string()))
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One-at-a-time manual triage of pending cases.
///
/// Every remote write is confirmed before the local copy changes and the
/// cursor moves. While a write is in flight all other actions are refused
/// with [`AppError::Busy`].
pub struct ReviewSessionUseCase {
    notion: Arc<dyn NotionGateway>,
    translator: Arc<dyn Translator>,
    settings: Arc<dyn SettingsProvider>,
    source_lang: String,
    target_lang: String,
    state: Mutex<ReviewState>,
    busy: AtomicBool,
}

impl ReviewSessionUseCase {
    pub fn new(
        notion: Arc<dyn NotionGateway>,
        translator: Arc<dyn Translator>,
        settings: Arc<dyn SettingsProvider>,
        source_lang: &str,
        target_lang: &str,
    ) -> Self {
        Self {
            notion,
            translator,
            settings,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            state: Mutex::new(ReviewState::default()),
            busy: AtomicBool::new(false),
        }
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| AppError::Busy)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReviewState>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("Review state lock poisoned".to_string()))
    }

    pub fn current(&self) -> Result<ReviewView> {
        Ok(self.lock()?.view(false))
    }

    /// Replaces the session with the pending cases. On failure the previous
    /// session is left as it was.
    pub async fn load(&self) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        let creds = self.settings.current().require_notion()?;
        let items = self
            .notion
            .query_database(&creds, &QueryFilter::pending_review())
            .await?;
        info!(count = items.len(), "Loaded cases for review");

        let mut state = self.lock()?;
        *state = ReviewState {
            cursor: ReviewCursor::new(items),
            ..Default::default()
        };
        Ok(state.view(false))
    }

    pub fn skip(&self) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        let mut state = self.lock()?;
        state.cursor.skip();
        state.mode = ReviewMode::Browsing;
        state.pending_delete = None;
        Ok(state.view(false))
    }

    pub async fn pass(&self) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        let item_id = self.browsing_target()?;
        let creds = self.settings.current().require_notion()?;
        self.notion
            .update_page(&creds.token, &item_id, &PagePatch::result(TestResult::Pass))
            .await?;
        self.commit(&item_id, TestResult::Pass, |_| {})
    }

    pub fn request_delete(&self) -> Result<DeleteConfirmation> {
        let _guard = self.acquire()?;
        let mut state = self.lock()?;
        if state.mode != ReviewMode::Browsing {
            return Err(AppError::InvalidTransition(
                "Close the fail form before deleting".to_string(),
            ));
        }
        let item = state
            .cursor
            .current()
            .cloned()
            .ok_or_else(|| AppError::ValidationError("No case to review".to_string()))?;
        state.pending_delete = Some(item.id.clone());
        Ok(DeleteConfirmation {
            item_id: item.id,
            no: item.no,
        })
    }

    pub async fn confirm_delete(&self, item_id: &str) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        {
            let state = self.lock()?;
            let confirmed = state.pending_delete.as_deref() == Some(item_id)
                && state.current_id().ok().as_deref() == Some(item_id);
            if !confirmed {
                return Err(AppError::ValidationError(
                    "Delete was not requested for this case".to_string(),
                ));
            }
        }
        let creds = self.settings.current().require_notion()?;
        self.notion
            .update_page(&creds.token, item_id, &PagePatch::result(TestResult::Delete))
            .await?;
        self.commit(item_id, TestResult::Delete, |_| {})
    }

    pub fn begin_fail(&self) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        let mut state = self.lock()?;
        state.current_id()?;
        state.mode = ReviewMode::FailCapture;
        state.pending_delete = None;
        Ok(state.view(false))
    }

    pub fn cancel_fail(&self) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        let mut state = self.lock()?;
        state.mode = ReviewMode::Browsing;
        Ok(state.view(false))
    }

    /// Records the failure in one write, then moves on. A blank title is
    /// refused before anything leaves the process.
    pub async fn submit_fail(&self, submission: FailSubmission) -> Result<ReviewView> {
        let _guard = self.acquire()?;
        let submission = submission.normalized();
        submission
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let item_id = {
            let state = self.lock()?;
            if state.mode != ReviewMode::FailCapture {
                return Err(AppError::InvalidTransition(
                    "Open the fail form first".to_string(),
                ));
            }
            state.current_id()?
        };

        let settings = self.settings.current();
        let creds = settings.require_notion()?;
        let body_translated = self.translate_failure(&settings, &submission).await?;

        let patch = PagePatch::failure(
            submission.title.clone(),
            submission.body_local.clone(),
            body_translated.clone(),
            submission.image_url.clone(),
        );
        self.notion.update_page(&creds.token, &item_id, &patch).await?;

        self.commit(&item_id, TestResult::Fail, |item| {
            item.title = submission.title;
            item.body_local = submission.body_local;
            item.body_translated = body_translated;
            item.image_url = submission.image_url.unwrap_or_default();
        })
    }

    /// Title and body through DeepL, joined by a blank line. Empty without a key.
    async fn translate_failure(
        &self,
        settings: &Settings,
        submission: &FailSubmission,
    ) -> Result<String> {
        let Ok(api_key) = settings.require_deepl() else {
            return Ok(String::new());
        };
        let mut texts = vec![submission.title.clone()];
        if !submission.body_local.trim().is_empty() {
            texts.push(submission.body_local.clone());
        }
        let translated = self
            .translator
            .translate(&api_key, &texts, &self.source_lang, &self.target_lang)
            .await?;
        Ok(translated.join("\n\n"))
    }

    fn browsing_target(&self) -> Result<String> {
        let state = self.lock()?;
        if state.mode != ReviewMode::Browsing {
            return Err(AppError::InvalidTransition(
                "Close the fail form first".to_string(),
            ));
        }
        state.current_id()
    }

    /// Applies a confirmed disposition to the local copy and advances.
    fn commit(
        &self,
        item_id: &str,
        result: TestResult,
        apply: impl FnOnce(&mut RemoteTestItem),
    ) -> Result<ReviewView> {
        let mut state = self.lock()?;
        let item = match state.cursor.current_mut() {
            Some(item) if item.id == item_id => item,
            _ => {
                warn!(item_id, "Review list changed while a write was in flight");
                return Err(AppError::Internal(
                    "Review list changed during the update".to_string(),
                ));
            }
        };
        item.record_result(result)?;
        apply(item);
        info!(no = %item.no, result = result.as_notion(), "Review result recorded");

        state.mode = ReviewMode::Browsing;
        state.pending_delete = None;
        let step = state.cursor.remove_current();
        if step == CursorStep::Exhausted {
            info!("All review cases handled");
        }
        Ok(state.view(step == CursorStep::Exhausted))
    }
}
