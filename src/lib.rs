pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

use crate::application::{
    BulkTranslateUseCase, CaseUploadUseCase, FailForwardUseCase, ReportRewriteUseCase,
    ReviewSessionUseCase,
};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::config::{
    FileSettingsStore, ServerConfig, SettingsProvider, KEYRING_SERVICE,
};
use crate::infrastructure::llm_clients::GeminiClient;
use crate::infrastructure::notion::NotionClient;
use crate::infrastructure::security::keyring::KeyringManager;
use crate::infrastructure::slack::SlackClient;
use crate::infrastructure::translate::DeepLClient;
use crate::interfaces::http::{add_log, new_log_buffer, start_server, AppState, HttpState};
use actix_web::web;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH_ENV: &str = "QABRIDGE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "qabridge.toml";

pub fn run() {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Err(err) = actix_web::rt::System::new().block_on(serve()) {
        error!(error = %err, "qabridge stopped");
        std::process::exit(1);
    }
}

async fn serve() -> Result<()> {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = ServerConfig::load(&config_path)?;

    let keyring = config
        .use_keyring
        .then(|| KeyringManager::new(KEYRING_SERVICE));
    let store = Arc::new(FileSettingsStore::open(&config.settings_path, keyring)?);
    store
        .clone()
        .watch(Duration::from_millis(config.settings_poll_ms));
    let settings: Arc<dyn SettingsProvider> = store;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let app = Arc::new(build_app(&config, http, settings.clone()));
    let logs = new_log_buffer();

    let mut changes = settings.subscribe();
    let change_log = logs.clone();
    actix_web::rt::spawn(async move {
        while changes.changed().await.is_ok() {
            add_log(&change_log, "INFO", "Settings", "Settings updated");
        }
    });

    let bind = config.bind_addr();
    info!("Starting QA bridge API on http://{}:{}/api", bind.0, bind.1);
    let state = web::Data::new(HttpState::new(app, logs));
    start_server(state, bind)?.await?;
    Ok(())
}

fn build_app(
    config: &ServerConfig,
    http: reqwest::Client,
    settings: Arc<dyn SettingsProvider>,
) -> AppState {
    let notion = Arc::new(NotionClient::new(
        http.clone(),
        &config.notion_base_url,
        &config.notion_version,
    ));
    let slack = Arc::new(SlackClient::new(http.clone(), &config.slack_base_url));
    let deepl = Arc::new(DeepLClient::new(http.clone(), &config.deepl_base_url));
    let gemini = Arc::new(GeminiClient::with_client(http));
    let llm_config = LLMConfig {
        base_url: config.gemini_base_url.clone(),
        model: config.gemini_model.clone(),
        ..LLMConfig::default()
    };

    AppState {
        upload: CaseUploadUseCase::new(notion.clone(), settings.clone(), config.upload_pace()),
        forward: FailForwardUseCase::new(
            notion.clone(),
            slack,
            settings.clone(),
            config.forward_pace(),
        ),
        review: ReviewSessionUseCase::new(
            notion.clone(),
            deepl.clone(),
            settings.clone(),
            &config.source_lang,
            &config.target_lang,
        ),
        translate: BulkTranslateUseCase::new(
            notion,
            deepl,
            settings.clone(),
            config.translate_pace(),
            &config.source_lang,
            &config.target_lang,
        ),
        rewrite: ReportRewriteUseCase::new(gemini, settings.clone(), llm_config),
        settings,
    }
}
