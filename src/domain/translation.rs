use crate::domain::error::{AppError, Result};
use crate::domain::test_case::RemoteTestItem;
use serde::{Deserialize, Serialize};

/// Progress of a case through the bulk translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    #[default]
    Ready,
    Translating,
    Translated,
    Saving,
    Saved,
    Error,
}

impl TranslationStatus {
    pub fn can_transition_to(self, next: TranslationStatus) -> bool {
        use TranslationStatus::*;
        matches!(
            (self, next),
            (Ready, Translating)
                | (Error, Translating)
                | (Translating, Translated)
                | (Translating, Error)
                | (Translated, Saving)
                | (Error, Saving)
                | (Saving, Saved)
                | (Saving, Error)
        )
    }
}

/// Which remote step a pipeline run performs on the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationPass {
    #[default]
    Translate,
    Save,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRow {
    pub item: RemoteTestItem,
    /// Working copy of the foreign body; edited by hand before saving.
    pub translated: String,
    pub status: TranslationStatus,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub pass: TranslationPass,
}

impl TranslationRow {
    pub fn new(item: RemoteTestItem) -> Self {
        let translated = item.body_translated.clone();
        Self {
            item,
            translated,
            status: TranslationStatus::Ready,
            error_message: None,
            pass: TranslationPass::Translate,
        }
    }

    pub fn has_translation(&self) -> bool {
        !self.translated.trim().is_empty()
    }

    pub fn transition(&mut self, next: TranslationStatus, message: Option<String>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "case {} cannot go from {:?} to {:?}",
                self.item.no, self.status, next
            )));
        }
        self.status = next;
        self.error_message = match next {
            TranslationStatus::Error => message,
            _ => None,
        };
        Ok(())
    }

    /// Manual correction. A saved row goes back to `Translated` so it is saved again.
    pub fn edit(&mut self, text: &str) -> Result<()> {
        match self.status {
            TranslationStatus::Translating | TranslationStatus::Saving => {
                Err(AppError::InvalidTransition(format!(
                    "case {} is busy",
                    self.item.no
                )))
            }
            _ => {
                self.translated = text.to_string();
                if self.has_translation() {
                    self.status = TranslationStatus::Translated;
                    self.error_message = None;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> TranslationRow {
        TranslationRow::new(RemoteTestItem {
            no: "Q3".to_string(),
            body_local: "본문".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn rows_translate_then_save() {
        let mut row = row();
        assert!(row.transition(TranslationStatus::Saving, None).is_err());
        row.transition(TranslationStatus::Translating, None).unwrap();
        row.transition(TranslationStatus::Translated, None).unwrap();
        row.transition(TranslationStatus::Saving, None).unwrap();
        row.transition(TranslationStatus::Error, Some("conflict".to_string()))
            .unwrap();
        assert_eq!(row.error_message.as_deref(), Some("conflict"));
        row.transition(TranslationStatus::Saving, None).unwrap();
        row.transition(TranslationStatus::Saved, None).unwrap();
        assert!(row.error_message.is_none());
    }

    #[test]
    fn editing_a_saved_row_marks_it_for_saving_again() {
        let mut row = row();
        row.status = TranslationStatus::Saved;
        row.edit("Body, fixed").unwrap();
        assert_eq!(row.status, TranslationStatus::Translated);
        assert_eq!(row.translated, "Body, fixed");
    }

    #[test]
    fn rows_in_flight_cannot_be_edited() {
        let mut row = row();
        row.status = TranslationStatus::Translating;
        assert!(row.edit("x").is_err());
    }
}
