// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// Pasted sheet parsing and encoding detection

mod case_parser;

pub use case_parser::{detect_delimiter, parse, CaseSheetParser};
