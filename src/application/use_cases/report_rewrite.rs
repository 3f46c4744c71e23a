use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{GenerateRequest, InlineImage, LLMConfig};
use crate::domain::qa_report::{QaReport, ScenarioDraft};
use crate::infrastructure::config::SettingsProvider;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::parse_json_reply;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// One `local: foreign` line of the user's glossary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlossaryTerm {
    pub local: String,
    pub foreign: String,
}

impl GlossaryTerm {
    /// The form the term must take inside foreign text.
    pub fn decorated(&self) -> String {
        format!("{}({})", self.local, self.foreign)
    }
}

/// Parses the free-form glossary setting. Blank lines, `#` comments and lines
/// without a separator are ignored.
pub fn parse_glossary(raw: &str) -> Vec<GlossaryTerm> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (local, foreign) = line.split_once(':').or_else(|| line.split_once('='))?;
            let (local, foreign) = (local.trim(), foreign.trim());
            if local.is_empty() || foreign.is_empty() {
                return None;
            }
            Some(GlossaryTerm {
                local: local.to_string(),
                foreign: foreign.to_string(),
            })
        })
        .collect()
}

/// Glossary terms whose foreign word shows up in `foreign_text` at least once
/// without the `local(foreign)` decoration.
pub fn glossary_violations(foreign_text: &str, glossary: &[GlossaryTerm]) -> Vec<GlossaryTerm> {
    glossary
        .iter()
        .filter(|term| {
            let decorated = term.decorated();
            let bare = foreign_text.matches(term.foreign.as_str()).count();
            let wrapped = foreign_text.matches(decorated.as_str()).count();
            bare > wrapped
        })
        .cloned()
        .collect()
}

fn glossary_block(glossary: &str) -> &str {
    if glossary.trim().is_empty() {
        "(none)"
    } else {
        glossary.trim()
    }
}

pub fn build_rewrite_prompt(text: &str, glossary: &str) -> String {
    format!(
        r#"You are a senior QA engineer and technical translator. Rewrite the input below as a professional software defect report, then translate it.

Rules:
1. Korean report: include [문제], [재현 경로], [기대 결과] and [실제 결과]. Use professional QA wording and avoid English words in the Korean text ('Button' becomes '버튼', 'Click' becomes '클릭').
2. English report: an accurate, professional translation of the Korean report.
3. Every term listed in the glossary must appear in the English report as Korean(English), for example 결제(Payment) for the entry '결제: Payment'.
4. Reply with JSON only, exactly in this shape:
{{"kr": "Korean report", "en": "English report with glossary decoration"}}

[Glossary]
{}

[Input]
{}"#,
        glossary_block(glossary),
        text.trim()
    )
}

pub fn build_screenshot_prompt(memo: &str, glossary: &str) -> String {
    format!(
        r#"You are a senior QA engineer. Study the attached screenshot and the tester's memo, and draft a new QA scenario recording a FAIL result.

Rules:
1. depth1: the main screen the feature belongs to, taken from the memo.
2. depth2: the specific area or component, taken from the memo.
3. checkPoint: one clear sentence saying what must be verified on that screen.
4. scenario: a one-line summary of how the defect was reached.
5. title: "depth1 > depth2".
6. bodyKr: Korean report with [재현 경로], [기대 결과] and [실제 결과], avoiding English words.
7. bodyEn: English translation of the title and bodyKr. Glossary terms must appear as Korean(English).
8. Reply with JSON only, exactly in this shape:
{{"depth1": "", "depth2": "", "checkPoint": "", "scenario": "", "title": "", "bodyKr": "", "bodyEn": ""}}

[Memo]
{}

[Glossary]
{}"#,
        memo.trim(),
        glossary_block(glossary)
    )
}

/// Glossary-aware rewriting of free-form defect notes through Gemini.
pub struct ReportRewriteUseCase {
    llm_client: Arc<dyn LLMClient>,
    settings: Arc<dyn SettingsProvider>,
    base_config: LLMConfig,
}

impl ReportRewriteUseCase {
    pub fn new(
        llm_client: Arc<dyn LLMClient>,
        settings: Arc<dyn SettingsProvider>,
        base_config: LLMConfig,
    ) -> Self {
        Self {
            llm_client,
            settings,
            base_config,
        }
    }

    fn config_with_key(&self, api_key: String) -> LLMConfig {
        LLMConfig {
            api_key: Some(api_key),
            ..self.base_config.clone()
        }
    }

    pub async fn rewrite(&self, text: &str) -> Result<QaReport> {
        if text.trim().is_empty() {
            return Err(AppError::ValidationError("Text to rewrite is empty".to_string()));
        }
        let settings = self.settings.current();
        let config = self.config_with_key(settings.require_gemini()?);

        let request = GenerateRequest {
            prompt: build_rewrite_prompt(text, &settings.glossary),
            image: None,
            json_output: true,
        };
        let raw = self.llm_client.generate(&config, &request).await?;
        let report: QaReport = parse_json_reply(&raw)?;

        let violations = glossary_violations(&report.foreign, &parse_glossary(&settings.glossary));
        if !violations.is_empty() {
            warn!(count = violations.len(), "Rewrite left glossary terms undecorated");
        }
        Ok(report)
    }

    /// Drafts a new case from a screenshot. `image` holds the raw file bytes.
    pub async fn draft_from_screenshot(
        &self,
        image: &[u8],
        mime_type: &str,
        memo: &str,
    ) -> Result<ScenarioDraft> {
        if image.is_empty() {
            return Err(AppError::ValidationError("Screenshot is empty".to_string()));
        }
        if !mime_type.starts_with("image/") {
            return Err(AppError::ValidationError(format!(
                "Unsupported screenshot type: {}",
                mime_type
            )));
        }
        let settings = self.settings.current();
        let config = self.config_with_key(settings.require_gemini()?);

        let request = GenerateRequest {
            prompt: build_screenshot_prompt(memo, &settings.glossary),
            image: Some(InlineImage {
                mime_type: mime_type.to_string(),
                data: STANDARD.encode(image),
            }),
            json_output: true,
        };
        let raw = self.llm_client.generate(&config, &request).await?;
        let draft: ScenarioDraft = parse_json_reply(&raw)?;
        info!(title = %draft.title, "Drafted scenario from screenshot");
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::test_support::{configured_settings, FakeLlm};
    use crate::infrastructure::config::InMemorySettingsStore;

    #[test]
    fn glossary_lines_are_parsed() {
        let terms = parse_glossary("결제: Payment\n\n# comment\n버튼 = Button\nbroken line\n: Empty");
        assert_eq!(
            terms,
            vec![
                GlossaryTerm {
                    local: "결제".to_string(),
                    foreign: "Payment".to_string()
                },
                GlossaryTerm {
                    local: "버튼".to_string(),
                    foreign: "Button".to_string()
                },
            ]
        );
    }

    #[test]
    fn undecorated_terms_are_reported() {
        let glossary = parse_glossary("결제: Payment\n버튼: Button");
        let text = "The 결제(Payment) page shows no Button.";
        let violations = glossary_violations(text, &glossary);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].foreign, "Button");

        assert!(glossary_violations("Tap 버튼(Button) twice", &glossary).is_empty());
    }

    #[test]
    fn prompt_falls_back_when_glossary_is_empty() {
        let prompt = build_rewrite_prompt("로그인 안됨", "  ");
        assert!(prompt.contains("[Glossary]\n(none)"));
        assert!(prompt.ends_with("로그인 안됨"));
    }

    #[tokio::test]
    async fn rewrite_returns_the_paired_report() {
        let llm = FakeLlm::replying(vec![
            "```json\n{\"kr\":\"[문제] 버튼 무반응\",\"en\":\"[Issue] 버튼(Button) unresponsive\"}\n```",
        ]);
        let rewriter = ReportRewriteUseCase::new(
            llm.clone(),
            configured_settings(),
            LLMConfig::default(),
        );

        let report = rewriter.rewrite("버튼 눌러도 반응 없음").await.unwrap();

        assert_eq!(report.local, "[문제] 버튼 무반응");
        assert_eq!(report.foreign, "[Issue] 버튼(Button) unresponsive");
        let requests = llm.requests.lock().unwrap();
        assert!(requests[0].json_output);
        assert!(requests[0].prompt.contains("버튼: Button"));
    }

    #[tokio::test]
    async fn rewrite_needs_a_gemini_key() {
        let llm = FakeLlm::replying(vec![]);
        let rewriter = ReportRewriteUseCase::new(
            llm.clone(),
            Arc::new(InMemorySettingsStore::new(Default::default())),
            LLMConfig::default(),
        );

        let err = rewriter.rewrite("text").await.unwrap_err();
        assert!(matches!(err, AppError::Precondition(_)));
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn screenshot_is_sent_inline_and_drafted() {
        let llm = FakeLlm::replying(vec![
            r#"{"depth1":"결제","depth2":"카드 입력","checkPoint":"카드 번호 검증","scenario":"잘못된 번호 입력 시 오류 미표시","title":"결제 > 카드 입력","bodyKr":"본문","bodyEn":"Body"}"#,
        ]);
        let rewriter = ReportRewriteUseCase::new(
            llm.clone(),
            configured_settings(),
            LLMConfig::default(),
        );

        let draft = rewriter
            .draft_from_screenshot(b"png-bytes", "image/png", "카드 입력 오류")
            .await
            .unwrap();

        assert_eq!(draft.title, "결제 > 카드 입력");
        let staged = draft.into_staged(0, "N1");
        assert_eq!(staged.check_point, "카드 번호 검증");
        let requests = llm.requests.lock().unwrap();
        let image = requests[0].image.as_ref().unwrap();
        assert_eq!(image.data, STANDARD.encode(b"png-bytes"));
        assert_eq!(image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let rewriter = ReportRewriteUseCase::new(
            FakeLlm::replying(vec![]),
            configured_settings(),
            LLMConfig::default(),
        );
        let err = rewriter
            .draft_from_screenshot(b"%PDF", "application/pdf", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
