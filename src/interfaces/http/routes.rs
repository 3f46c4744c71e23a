use super::{add_log, HttpState};
use crate::application::use_cases::report_rewrite::{glossary_violations, parse_glossary, GlossaryTerm};
use crate::application::ForwardRow;
use crate::domain::error::{AppError, Result};
use crate::domain::pipeline::PipelineRunResult;
use crate::domain::qa_report::{FailSubmission, QaReport, ScenarioDraft};
use crate::domain::settings::{ForwardTarget, Settings, SECRET_KEYS};
use crate::domain::test_case::StagedItem;
use actix_web::{get, post, web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

type Reply = std::result::Result<HttpResponse, AppError>;

fn logged<T>(data: &HttpState, source: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        add_log(&data.logs, "ERROR", source, &e.to_string());
    }
    result
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReply<'a, T> {
    run: PipelineRunResult,
    items: &'a [T],
}

// ---- upload ----

#[derive(Deserialize)]
pub struct ParseRequest {
    pub text: String,
}

#[derive(Deserialize)]
pub struct ParseFileRequest {
    pub path: PathBuf,
}

#[derive(Deserialize)]
pub struct StageDraftRequest {
    pub draft: ScenarioDraft,
    #[serde(default)]
    pub no: String,
}

#[post("/parse")]
async fn parse(data: web::Data<HttpState>, req: web::Json<ParseRequest>) -> Reply {
    let items = logged(&data, "Uploader", data.app.upload.parse(&req.text))?;
    let mut staged = data.staged.try_lock().map_err(|_| AppError::Busy)?;
    *staged = items;
    add_log(&data.logs, "INFO", "Uploader", &format!("Staged {} case(s)", staged.len()));
    Ok(HttpResponse::Ok().json(&*staged))
}

#[post("/parse/file")]
async fn parse_file(data: web::Data<HttpState>, req: web::Json<ParseFileRequest>) -> Reply {
    let items = logged(&data, "Uploader", data.app.upload.parse_file(&req.path))?;
    let mut staged = data.staged.try_lock().map_err(|_| AppError::Busy)?;
    *staged = items;
    Ok(HttpResponse::Ok().json(&*staged))
}

#[get("/staged")]
async fn get_staged(data: web::Data<HttpState>) -> Reply {
    let staged = data.staged.try_lock().map_err(|_| AppError::Busy)?;
    Ok(HttpResponse::Ok().json(&*staged))
}

#[post("/staged/draft")]
async fn stage_draft(data: web::Data<HttpState>, req: web::Json<StageDraftRequest>) -> Reply {
    let mut staged = data.staged.try_lock().map_err(|_| AppError::Busy)?;
    let req = req.into_inner();
    let item: StagedItem = req.draft.into_staged(staged.len(), &req.no);
    staged.push(item);
    Ok(HttpResponse::Ok().json(&*staged))
}

#[post("/upload")]
async fn upload(data: web::Data<HttpState>) -> Reply {
    let mut staged = data.staged.try_lock().map_err(|_| AppError::Busy)?;
    let sink = data.sink("Uploader");
    let run = logged(&data, "Uploader", data.app.upload.upload(&mut staged, &sink).await)?;
    Ok(HttpResponse::Ok().json(RunReply { run, items: staged.as_slice() }))
}

// ---- forward ----

#[derive(Deserialize)]
pub struct ForwardRequest {
    #[serde(default)]
    pub target: ForwardTarget,
}

#[get("/forward/pending")]
async fn forward_pending(data: web::Data<HttpState>) -> Reply {
    let mut rows = data.forward_rows.try_lock().map_err(|_| AppError::Busy)?;
    *rows = logged(&data, "Forwarder", data.app.forward.fetch_pending().await)?;
    add_log(&data.logs, "INFO", "Forwarder", &format!("{} failure(s) to forward", rows.len()));
    Ok(HttpResponse::Ok().json(&*rows))
}

#[post("/forward")]
async fn forward(data: web::Data<HttpState>, req: web::Json<ForwardRequest>) -> Reply {
    let mut rows = data.forward_rows.try_lock().map_err(|_| AppError::Busy)?;
    let sink = data.sink("Forwarder");
    let run = logged(
        &data,
        "Forwarder",
        data.app.forward.forward(req.target, &mut rows, &sink).await,
    )?;
    Ok(HttpResponse::Ok().json(RunReply { run, items: rows.as_slice() }))
}

#[post("/forward/hold/{page_id}")]
async fn forward_hold(data: web::Data<HttpState>, path: web::Path<String>) -> Reply {
    let page_id = path.into_inner();
    let mut rows = data.forward_rows.try_lock().map_err(|_| AppError::Busy)?;
    let index = rows
        .iter()
        .position(|row: &ForwardRow| row.item.id == page_id)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown case: {}", page_id)))?;
    logged(&data, "Forwarder", data.app.forward.hold(&mut rows[index]).await)?;
    let held = rows.remove(index);
    add_log(&data.logs, "INFO", "Forwarder", &format!("[{}] on hold", held.item.no));
    Ok(HttpResponse::Ok().json(&*rows))
}

// ---- review ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDeleteRequest {
    pub item_id: String,
}

#[post("/review/load")]
async fn review_load(data: web::Data<HttpState>) -> Reply {
    let view = logged(&data, "Tester", data.app.review.load().await)?;
    Ok(HttpResponse::Ok().json(view))
}

#[get("/review/current")]
async fn review_current(data: web::Data<HttpState>) -> Reply {
    Ok(HttpResponse::Ok().json(data.app.review.current()?))
}

#[post("/review/pass")]
async fn review_pass(data: web::Data<HttpState>) -> Reply {
    let view = logged(&data, "Tester", data.app.review.pass().await)?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/review/skip")]
async fn review_skip(data: web::Data<HttpState>) -> Reply {
    Ok(HttpResponse::Ok().json(data.app.review.skip()?))
}

#[post("/review/delete/request")]
async fn review_delete_request(data: web::Data<HttpState>) -> Reply {
    Ok(HttpResponse::Ok().json(data.app.review.request_delete()?))
}

#[post("/review/delete/confirm")]
async fn review_delete_confirm(
    data: web::Data<HttpState>,
    req: web::Json<ConfirmDeleteRequest>,
) -> Reply {
    let view = logged(
        &data,
        "Tester",
        data.app.review.confirm_delete(&req.item_id).await,
    )?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/review/fail/begin")]
async fn review_fail_begin(data: web::Data<HttpState>) -> Reply {
    Ok(HttpResponse::Ok().json(data.app.review.begin_fail()?))
}

#[post("/review/fail/cancel")]
async fn review_fail_cancel(data: web::Data<HttpState>) -> Reply {
    Ok(HttpResponse::Ok().json(data.app.review.cancel_fail()?))
}

#[post("/review/fail/submit")]
async fn review_fail_submit(
    data: web::Data<HttpState>,
    req: web::Json<FailSubmission>,
) -> Reply {
    let view = logged(
        &data,
        "Tester",
        data.app.review.submit_fail(req.into_inner()).await,
    )?;
    Ok(HttpResponse::Ok().json(view))
}

// ---- translate ----

#[derive(Deserialize)]
pub struct EditTranslationRequest {
    pub index: usize,
    pub text: String,
}

#[post("/translate/load")]
async fn translate_load(data: web::Data<HttpState>) -> Reply {
    let mut rows = data.translation_rows.try_lock().map_err(|_| AppError::Busy)?;
    *rows = logged(&data, "Translator", data.app.translate.load().await)?;
    Ok(HttpResponse::Ok().json(&*rows))
}

#[post("/translate/all")]
async fn translate_all(data: web::Data<HttpState>) -> Reply {
    let mut rows = data.translation_rows.try_lock().map_err(|_| AppError::Busy)?;
    let sink = data.sink("Translator");
    let run = logged(
        &data,
        "Translator",
        data.app.translate.translate_all(&mut rows, &sink).await,
    )?;
    Ok(HttpResponse::Ok().json(RunReply { run, items: rows.as_slice() }))
}

#[post("/translate/row/{index}")]
async fn translate_row(data: web::Data<HttpState>, path: web::Path<usize>) -> Reply {
    let mut rows = data.translation_rows.try_lock().map_err(|_| AppError::Busy)?;
    logged(
        &data,
        "Translator",
        data.app.translate.translate_one(&mut rows, path.into_inner()).await,
    )?;
    Ok(HttpResponse::Ok().json(&*rows))
}

#[post("/translate/edit")]
async fn translate_edit(
    data: web::Data<HttpState>,
    req: web::Json<EditTranslationRequest>,
) -> Reply {
    let mut rows = data.translation_rows.try_lock().map_err(|_| AppError::Busy)?;
    data.app
        .translate
        .edit_translation(&mut rows, req.index, &req.text)?;
    Ok(HttpResponse::Ok().json(&*rows))
}

#[post("/translate/save")]
async fn translate_save(data: web::Data<HttpState>) -> Reply {
    let mut rows = data.translation_rows.try_lock().map_err(|_| AppError::Busy)?;
    let sink = data.sink("Translator");
    let run = logged(
        &data,
        "Translator",
        data.app.translate.save_all(&mut rows, &sink).await,
    )?;
    Ok(HttpResponse::Ok().json(RunReply { run, items: rows.as_slice() }))
}

#[post("/translate/row/{index}/save")]
async fn translate_save_row(data: web::Data<HttpState>, path: web::Path<usize>) -> Reply {
    let mut rows = data.translation_rows.try_lock().map_err(|_| AppError::Busy)?;
    logged(
        &data,
        "Translator",
        data.app.translate.save_one(&mut rows, path.into_inner()).await,
    )?;
    Ok(HttpResponse::Ok().json(&*rows))
}

// ---- rewrite ----

#[derive(Deserialize)]
pub struct RewriteRequest {
    pub text: String,
}

#[derive(Serialize)]
struct RewriteReply {
    report: QaReport,
    violations: Vec<GlossaryTerm>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRequest {
    /// Raw base64 or a `data:` URL.
    pub image_base64: String,
    #[serde(default = "default_mime")]
    pub mime_type: String,
    #[serde(default)]
    pub memo: String,
}

fn default_mime() -> String {
    "image/jpeg".to_string()
}

fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::ValidationError(format!("Screenshot is not valid base64: {}", e)))
}

#[post("/rewrite")]
async fn rewrite(data: web::Data<HttpState>, req: web::Json<RewriteRequest>) -> Reply {
    let report = logged(&data, "Rewrite", data.app.rewrite.rewrite(&req.text).await)?;
    let glossary = parse_glossary(&data.app.settings.current().glossary);
    let violations = glossary_violations(&report.foreign, &glossary);
    Ok(HttpResponse::Ok().json(RewriteReply { report, violations }))
}

#[post("/rewrite/screenshot")]
async fn rewrite_screenshot(
    data: web::Data<HttpState>,
    req: web::Json<ScreenshotRequest>,
) -> Reply {
    let image = decode_image(&req.image_base64)?;
    let draft = logged(
        &data,
        "Rewrite",
        data.app
            .rewrite
            .draft_from_screenshot(&image, &req.mime_type, &req.memo)
            .await,
    )?;
    Ok(HttpResponse::Ok().json(draft))
}

// ---- settings & logs ----

#[derive(Serialize)]
struct SettingsReply {
    settings: Settings,
    /// Which secret fields hold a value; their contents are never returned.
    configured: BTreeMap<&'static str, bool>,
}

#[get("/settings")]
async fn get_settings(data: web::Data<HttpState>) -> Reply {
    let current = data.app.settings.current();
    let configured = SECRET_KEYS
        .iter()
        .map(|key| (*key, current.get(key).is_some_and(|v| !v.is_empty())))
        .collect();
    Ok(HttpResponse::Ok().json(SettingsReply {
        settings: current.without_secrets(),
        configured,
    }))
}

/// Partial update by persisted key name. Omitted keys keep their value.
#[post("/settings")]
async fn save_settings(
    data: web::Data<HttpState>,
    req: web::Json<BTreeMap<String, String>>,
) -> Reply {
    let mut settings = data.app.settings.current();
    for (key, value) in req.iter() {
        settings.set(key, value)?;
    }
    logged(&data, "Settings", data.app.settings.save(settings))?;
    add_log(&data.logs, "INFO", "Settings", "Settings saved");
    Ok(HttpResponse::NoContent().finish())
}

/// Row states of the latest run per screen; answers even while a run holds its list.
#[get("/progress")]
async fn get_progress(data: web::Data<HttpState>) -> Reply {
    let board = data
        .progress
        .lock()
        .map_err(|_| AppError::Internal("Progress board lock poisoned".to_string()))?;
    Ok(HttpResponse::Ok().json(&*board))
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> Reply {
    let logs = data
        .logs
        .lock()
        .map_err(|_| AppError::Internal("Log buffer lock poisoned".to_string()))?;
    Ok(HttpResponse::Ok().json(&*logs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_and_raw_base64_decode_alike() {
        let raw = STANDARD.encode(b"jpeg");
        assert_eq!(decode_image(&raw).unwrap(), b"jpeg");
        assert_eq!(
            decode_image(&format!("data:image/jpeg;base64,{}", raw)).unwrap(),
            b"jpeg"
        );
        assert!(decode_image("not base64!").is_err());
    }
}
