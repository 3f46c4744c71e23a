pub mod batch_pipeline;
pub mod bulk_translate;
pub mod case_upload;
pub mod fail_forward;
pub mod report_rewrite;
pub mod review_cursor;
pub mod review_session;

#[cfg(test)]
pub(crate) mod test_support;
