mod routes;

use crate::application::use_cases::batch_pipeline::{PipelineSink, TracingSink};
use crate::application::{
    BulkTranslateUseCase, CaseUploadUseCase, FailForwardUseCase, ForwardRow,
    ReportRewriteUseCase, ReviewSessionUseCase,
};
use crate::domain::error::AppError;
use crate::domain::pipeline::PipelineEvent;
use crate::domain::test_case::StagedItem;
use crate::domain::translation::TranslationRow;
use crate::infrastructure::config::SettingsProvider;
use actix_cors::Cors;
use actix_web::http::StatusCode;
use actix_web::{dev::Server, web, App, HttpResponse, HttpServer, ResponseError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

const LOG_CAPACITY: usize = 200;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub type LogBuffer = Arc<Mutex<VecDeque<LogEntry>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowState {
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowProgress {
    pub label: String,
    pub state: RowState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Row states of the latest run per screen, keyed by list position. Readable
/// while the run still holds the list itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub run_id: String,
    pub total: usize,
    pub finished: bool,
    pub rows: BTreeMap<usize, RowProgress>,
}

impl RunProgress {
    pub fn apply(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Started { run_id, total } => {
                *self = RunProgress {
                    run_id: run_id.clone(),
                    total: *total,
                    ..Default::default()
                };
            }
            PipelineEvent::ItemStarted { index, label } => {
                self.mark(*index, label, RowState::InFlight, None)
            }
            PipelineEvent::ItemSucceeded { index, label } => {
                self.mark(*index, label, RowState::Succeeded, None)
            }
            PipelineEvent::ItemFailed {
                index,
                label,
                message,
            } => self.mark(*index, label, RowState::Failed, Some(message.clone())),
            PipelineEvent::Finished { .. } => self.finished = true,
        }
    }

    fn mark(&mut self, index: usize, label: &str, state: RowState, message: Option<String>) {
        self.rows.insert(
            index,
            RowProgress {
                label: label.to_string(),
                state,
                message,
            },
        );
    }
}

pub type ProgressBoard = Arc<Mutex<HashMap<&'static str, RunProgress>>>;

/// Use cases shared by every request.
pub struct AppState {
    pub settings: Arc<dyn SettingsProvider>,
    pub upload: CaseUploadUseCase,
    pub forward: FailForwardUseCase,
    pub review: ReviewSessionUseCase,
    pub translate: BulkTranslateUseCase,
    pub rewrite: ReportRewriteUseCase,
}

/// Per-screen working lists live here between requests. A list that is being
/// pushed by a run is locked for the whole run; a second run gets `409`.
pub struct HttpState {
    pub app: Arc<AppState>,
    pub logs: LogBuffer,
    pub progress: ProgressBoard,
    pub staged: tokio::sync::Mutex<Vec<StagedItem>>,
    pub forward_rows: tokio::sync::Mutex<Vec<ForwardRow>>,
    pub translation_rows: tokio::sync::Mutex<Vec<TranslationRow>>,
}

impl HttpState {
    pub fn new(app: Arc<AppState>, logs: LogBuffer) -> Self {
        Self {
            app,
            logs,
            progress: Arc::new(Mutex::new(HashMap::new())),
            staged: tokio::sync::Mutex::new(Vec::new()),
            forward_rows: tokio::sync::Mutex::new(Vec::new()),
            translation_rows: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    fn sink(&self, source: &'static str) -> LogSink {
        LogSink {
            logs: self.logs.clone(),
            progress: self.progress.clone(),
            source,
        }
    }
}

pub fn new_log_buffer() -> LogBuffer {
    Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)))
}

pub fn add_log_entry(logs: &Mutex<VecDeque<LogEntry>>, level: &str, source: &str, message: &str) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    if let Ok(mut logs) = logs.lock() {
        if logs.len() >= LOG_CAPACITY {
            logs.pop_front();
        }
        logs.push_back(entry.clone());
    }
    entry
}

pub fn add_log(logs: &Mutex<VecDeque<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

/// Mirrors pipeline progress into the user-visible log and the progress board.
pub struct LogSink {
    logs: LogBuffer,
    progress: ProgressBoard,
    source: &'static str,
}

impl PipelineSink for LogSink {
    fn publish(&self, event: &PipelineEvent) {
        TracingSink.publish(event);
        if let Ok(mut board) = self.progress.lock() {
            board.entry(self.source).or_default().apply(event);
        }
        match event {
            PipelineEvent::Started { total, .. } => {
                add_log(&self.logs, "INFO", self.source, &format!("Started {} item(s)", total))
            }
            PipelineEvent::ItemStarted { label, .. } => {
                add_log(&self.logs, "INFO", self.source, &format!("[{}] in progress", label))
            }
            PipelineEvent::ItemSucceeded { label, .. } => {
                add_log(&self.logs, "INFO", self.source, &format!("[{}] succeeded", label))
            }
            PipelineEvent::ItemFailed { label, message, .. } => add_log(
                &self.logs,
                "ERROR",
                self.source,
                &format!("[{}] failed: {}", label, message),
            ),
            PipelineEvent::Finished { tally, .. } => add_log(
                &self.logs,
                if tally.is_clean() { "INFO" } else { "WARN" },
                self.source,
                &format!("Finished: {} succeeded, {} failed", tally.succeeded, tally.failed),
            ),
        }
    }
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal",
            AppError::Precondition(_) => "precondition",
            AppError::RemoteRejected { .. } => "remoteRejected",
            AppError::Transport(_) => "transport",
            AppError::PartialFailure(_) => "partialFailure",
            AppError::ValidationError(_) => "validation",
            AppError::InvalidTransition(_) => "invalidTransition",
            AppError::ParseError(_) => "parse",
            AppError::ConfigError(_) => "config",
            AppError::SecurityError(_) => "security",
            AppError::Busy => "busy",
            AppError::IoError(_) => "io",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Precondition(_)
            | AppError::ValidationError(_)
            | AppError::InvalidTransition(_)
            | AppError::ParseError(_) => StatusCode::BAD_REQUEST,
            AppError::Busy => StatusCode::CONFLICT,
            AppError::RemoteRejected { .. } | AppError::Transport(_) | AppError::PartialFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(routes::parse)
            .service(routes::parse_file)
            .service(routes::get_staged)
            .service(routes::stage_draft)
            .service(routes::upload)
            .service(routes::forward_pending)
            .service(routes::forward)
            .service(routes::forward_hold)
            .service(routes::review_load)
            .service(routes::review_current)
            .service(routes::review_pass)
            .service(routes::review_skip)
            .service(routes::review_delete_request)
            .service(routes::review_delete_confirm)
            .service(routes::review_fail_begin)
            .service(routes::review_fail_cancel)
            .service(routes::review_fail_submit)
            .service(routes::translate_load)
            .service(routes::translate_all)
            .service(routes::translate_row)
            .service(routes::translate_edit)
            .service(routes::translate_save)
            .service(routes::translate_save_row)
            .service(routes::rewrite)
            .service(routes::rewrite_screenshot)
            .service(routes::get_settings)
            .service(routes::save_settings)
            .service(routes::get_progress)
            .service(routes::get_logs),
    );
}

pub fn start_server(state: web::Data<HttpState>, bind: (String, u16)) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // local browser shell on another port

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(bind)?
    .run();

    Ok(server)
}
