use crate::domain::test_case::StagedItem;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A rewritten defect report: the local-language text plus its foreign translation,
/// with glossary terms decorated as `local(foreign)` in the foreign text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QaReport {
    #[serde(rename = "kr", alias = "local")]
    pub local: String,
    #[serde(rename = "en", alias = "foreign")]
    pub foreign: String,
}

/// A new case drafted from a screenshot and a short memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioDraft {
    pub depth1: String,
    pub depth2: String,
    pub check_point: String,
    pub scenario: String,
    pub title: String,
    #[serde(alias = "bodyLocal")]
    pub body_kr: String,
    #[serde(alias = "bodyTranslated")]
    pub body_en: String,
}

impl ScenarioDraft {
    pub fn into_staged(self, sequence_id: usize, no: &str) -> StagedItem {
        StagedItem::new(
            sequence_id,
            no.trim(),
            self.depth1.trim(),
            self.depth2.trim(),
            self.check_point.trim(),
            self.scenario.trim(),
        )
    }
}

/// The form submitted when a reviewer records a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct FailSubmission {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    pub body_local: String,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl FailSubmission {
    /// Blank image links are treated as absent before validation.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.image_url = self
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        self
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Title is required.".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_fails_validation() {
        let submission = FailSubmission {
            title: "   ".to_string(),
            ..Default::default()
        }
        .normalized();
        assert!(submission.validate().is_err());
    }

    #[test]
    fn empty_image_link_is_dropped() {
        let submission = FailSubmission {
            title: "Button unresponsive".to_string(),
            body_local: String::new(),
            image_url: Some("  ".to_string()),
        }
        .normalized();
        assert_eq!(submission.image_url, None);
        assert!(submission.validate().is_ok());
    }

    #[test]
    fn gemini_report_keys_decode() {
        let report: QaReport =
            serde_json::from_str(r#"{"kr":"결제 버튼 오류","en":"결제(Payment) button error"}"#)
                .unwrap();
        assert_eq!(report.foreign, "결제(Payment) button error");
    }

    #[test]
    fn draft_becomes_a_ready_row() {
        let draft: ScenarioDraft = serde_json::from_str(
            r#"{"depth1":"Login","depth2":"Form","checkPoint":"button","scenario":"tap","title":"Login > Form","bodyKr":"본문","bodyEn":"body"}"#,
        )
        .unwrap();
        let staged = draft.into_staged(3, "Q9");
        assert_eq!(staged.sequence_id, 3);
        assert_eq!(staged.check_point, "button");
        assert!(staged.has_content());
    }
}
