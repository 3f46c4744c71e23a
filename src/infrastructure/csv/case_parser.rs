// ============================================================
// CASE SHEET PARSER
// ============================================================
// Turns a block pasted from a spreadsheet into staged test cases

use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Terminator, Trim};
use encoding_rs::EUC_KR;
use tracing::debug;

use crate::domain::error::{AppError, Result};
use crate::domain::test_case::StagedItem;

const HEADER_MARKERS: [&str; 2] = ["no", "depth"];

/// Positional parser for `no, depth1, depth2, checkPoint, scenario` rows.
///
/// Each line picks its own delimiter: a tab anywhere in the line makes it
/// tab-separated, otherwise it is split on commas. Quotes are not special.
#[derive(Debug, Clone)]
pub struct CaseSheetParser {
    /// Whether a leading header row is recognised and skipped
    skip_header: bool,
}

impl Default for CaseSheetParser {
    fn default() -> Self {
        Self { skip_header: true }
    }
}

impl CaseSheetParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_detection(mut self, enabled: bool) -> Self {
        self.skip_header = enabled;
        self
    }

    /// Parse pasted text. The result always replaces any previous staged list.
    pub fn parse_content(&self, raw: &str) -> Result<Vec<StagedItem>> {
        // Leading tabs are positional, so only blank lines are stripped.
        let mut lines = raw
            .lines()
            .skip_while(|line| line.trim().is_empty())
            .peekable();
        if self.skip_header {
            if let Some(first) = lines.peek() {
                if is_header(first) {
                    debug!(header = %first, "Skipping header row");
                    lines.next();
                }
            }
        }

        let mut items = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let fields = split_line(line).map_err(|e| {
                AppError::ParseError(format!("Failed to split line {}: {}", line_no + 1, e))
            })?;
            let item = row_from_fields(items.len(), &fields);
            if item.has_content() {
                items.push(item);
            }
        }

        Ok(items)
    }

    /// Parse a sheet exported to disk. Spreadsheet exports on Korean systems are
    /// often EUC-KR, so invalid UTF-8 is decoded with that encoding instead.
    pub fn parse_file(&self, path: &Path) -> Result<Vec<StagedItem>> {
        let content = read_with_encoding_detection(path)?;
        self.parse_content(&content)
    }
}

/// Convenience wrapper with header detection enabled.
pub fn parse(raw: &str) -> Result<Vec<StagedItem>> {
    CaseSheetParser::new().parse_content(raw)
}

fn is_header(line: &str) -> bool {
    let lowered = line.to_lowercase();
    HEADER_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub fn detect_delimiter(line: &str) -> u8 {
    if line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

fn split_line(line: &str) -> std::result::Result<Vec<String>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        // The input is already one line; a stray `\r` must not end the record.
        .terminator(Terminator::Any(b'\n'))
        .delimiter(detect_delimiter(line))
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    Ok(record.iter().map(|field| field.trim().to_string()).collect())
}

fn row_from_fields(sequence_id: usize, fields: &[String]) -> StagedItem {
    let field = |idx: usize| fields.get(idx).cloned().unwrap_or_default();
    StagedItem::new(sequence_id, field(0), field(1), field(2), field(3), field(4))
}

fn read_with_encoding_detection(path: &Path) -> Result<String> {
    let buffer = std::fs::read(path)
        .map_err(|e| AppError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;

    match String::from_utf8(buffer) {
        Ok(content) => Ok(content.trim_start_matches('\u{feff}').to_string()),
        Err(err) => {
            let bytes = err.into_bytes();
            let (decoded, _, had_errors) = EUC_KR.decode(&bytes);
            if had_errors {
                debug!(path = %path.display(), "Sheet is neither UTF-8 nor clean EUC-KR");
            }
            Ok(decoded.into_owned())
        }
    }
}
