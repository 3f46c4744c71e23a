pub mod error;
pub mod llm_config;
pub mod pipeline;
pub mod qa_report;
pub mod settings;
pub mod test_case;
pub mod translation;
