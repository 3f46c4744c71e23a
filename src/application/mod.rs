pub mod use_cases;

pub use use_cases::batch_pipeline::{BatchPipeline, PipelineSink, TracingSink};
pub use use_cases::bulk_translate::BulkTranslateUseCase;
pub use use_cases::case_upload::CaseUploadUseCase;
pub use use_cases::fail_forward::{FailForwardUseCase, ForwardRow};
pub use use_cases::report_rewrite::ReportRewriteUseCase;
pub use use_cases::review_session::ReviewSessionUseCase;
