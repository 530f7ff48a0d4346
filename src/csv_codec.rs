// 📄 CSV Transcoder
// CSV text ⇄ Record collections, plus upload validation and export

use crate::record::{Record, RecordId, Scalar};
use csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upload ceiling: 10 MiB
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

pub const CSV_EXTENSION: &str = "csv";
pub const CSV_MIME_TYPE: &str = "text/csv";

/// File name used when an export is requested without a name
pub const DEFAULT_EXPORT_NAME: &str = "exported_data";

// ============================================================================
// ERRORS
// ============================================================================

/// CsvError - every expected failure of the transcoder, as a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    #[error("document is empty")]
    EmptyDocument,

    #[error("malformed header")]
    MalformedHeader,

    #[error("no valid data rows")]
    NoValidRows,

    #[error("nothing to export")]
    NothingToExport,

    #[error("{0}")]
    InvalidFile(String),

    #[error("i/o failure: {0}")]
    Io(String),
}

impl From<io::Error> for CsvError {
    fn from(err: io::Error) -> Self {
        CsvError::Io(err.to_string())
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        CsvError::Io(err.to_string())
    }
}

/// ParseResult - all records or a reason, never a partial success
pub type ParseResult = Result<Vec<Record>, CsvError>;

// ============================================================================
// PARSE
// ============================================================================

/// Parse CSV text into records
///
/// The first non-blank line is the header. Rows whose field count differs
/// from the header's are dropped without an error; a document left with no
/// rows fails as a whole. Quoted fields may contain commas and doubled
/// quotes, but not line breaks.
pub fn parse_text(text: &str) -> ParseResult {
    // byte order mark from spreadsheet exports
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();

    let (header_line, body) = lines.split_first().ok_or(CsvError::EmptyDocument)?;

    let headers = split_line(header_line).map_err(|_| CsvError::MalformedHeader)?;
    if headers.is_empty() || headers.iter().any(|h| h.is_empty()) {
        return Err(CsvError::MalformedHeader);
    }

    let mut records = Vec::with_capacity(body.len());
    let mut dropped = 0usize;

    for (idx, line) in body.iter().enumerate() {
        let fields = match split_line(line) {
            Ok(fields) if fields.len() == headers.len() => fields,
            Ok(fields) => {
                debug!(
                    line = idx + 2,
                    expected = headers.len(),
                    found = fields.len(),
                    "dropping row with mismatched field count"
                );
                dropped += 1;
                continue;
            }
            Err(err) => {
                debug!(line = idx + 2, error = %err, "dropping unreadable row");
                dropped += 1;
                continue;
            }
        };

        let mut record = Record::new(RecordId::next());
        for (header, field) in headers.iter().zip(fields.iter()) {
            record.set(header.as_str(), Scalar::coerce(field));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(CsvError::NoValidRows);
    }

    info!(
        rows = records.len(),
        dropped,
        columns = headers.len(),
        "parsed csv document"
    );
    Ok(records)
}

/// Split one physical line into trimmed, unquoted fields
fn split_line(line: &str) -> Result<Vec<String>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|f| f.trim().to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

// ============================================================================
// SERIALIZE
// ============================================================================

/// Serialize records to CSV text
///
/// Columns follow the first record's order (the synthetic id is never
/// written). Fields with commas, quotes or line breaks are quoted.
/// Lines are joined with `\n`, without a trailing newline.
pub fn serialize(records: &[Record]) -> Result<String, CsvError> {
    let first = records.first().ok_or(CsvError::NothingToExport)?;
    let headers: Vec<&str> = first.columns().collect();
    if headers.is_empty() {
        return Err(CsvError::NothingToExport);
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(&headers)?;
    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|h| record.get(h).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::Io(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| CsvError::Io(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

// ============================================================================
// EXPORT
// ============================================================================

/// CsvSink - where exported text ends up (browser download, filesystem, ...)
pub trait CsvSink {
    fn save(&self, filename: &str, content: &str) -> io::Result<()>;
}

/// DirectorySink - writes exports into a directory
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CsvSink for DirectorySink {
    fn save(&self, filename: &str, content: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(filename), content)
    }
}

/// Normalize an export file name: default name, `.csv` appended when missing
pub fn export_filename(hint: Option<&str>) -> String {
    let name = hint
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_EXPORT_NAME);

    if has_csv_extension(name) {
        name.to_string()
    } else {
        format!("{}.{}", name, CSV_EXTENSION)
    }
}

/// Serialize and hand the text to a sink; returns the file name used
pub fn export(
    records: &[Record],
    filename_hint: Option<&str>,
    sink: &dyn CsvSink,
) -> Result<String, CsvError> {
    let content = serialize(records)?;
    let filename = export_filename(filename_hint);

    sink.save(&filename, &content)
        .map_err(|e| CsvError::Io(format!("export failed: {}", e)))?;

    info!(file = %filename, rows = records.len(), "exported csv");
    Ok(filename)
}

// ============================================================================
// FILE VALIDATION
// ============================================================================

/// FileDescriptor - what is known about an upload before reading it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        FileDescriptor {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }

    /// Describe a file on disk; the type is declared from its extension
    pub fn from_path(path: &Path, size: u64) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        let mime_type = if has_csv_extension(&name) { CSV_MIME_TYPE } else { "" };
        FileDescriptor::new(name, mime_type, size)
    }
}

/// FileCheck - verdict of [`validate_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCheck {
    pub valid: bool,
    pub message: String,
}

impl FileCheck {
    fn pass() -> Self {
        FileCheck {
            valid: true,
            message: "file accepted".to_string(),
        }
    }

    fn reject(message: &str) -> Self {
        FileCheck {
            valid: false,
            message: message.to_string(),
        }
    }

    pub fn into_result(self) -> Result<(), CsvError> {
        if self.valid {
            Ok(())
        } else {
            Err(CsvError::InvalidFile(self.message))
        }
    }
}

/// Validate an upload before parsing
///
/// The `.csv` extension is required; a `text/csv` type alone does not admit a file.
pub fn validate_file(file: &FileDescriptor) -> FileCheck {
    if file.size == 0 {
        return FileCheck::reject("file is empty");
    }

    if !has_csv_extension(&file.name) {
        if file.mime_type == CSV_MIME_TYPE {
            debug!(name = %file.name, "declared text/csv but extension is not .csv");
        }
        return FileCheck::reject("file must be a .csv file");
    }

    if file.size > MAX_FILE_BYTES {
        return FileCheck::reject("file exceeds the 10 MiB limit");
    }

    FileCheck::pass()
}

fn has_csv_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CSV_EXTENSION))
        .unwrap_or(false)
}

/// Validate, read and parse a CSV file from disk
pub fn read_file(path: &Path) -> ParseResult {
    let metadata = fs::metadata(path)
        .map_err(|e| CsvError::Io(format!("failed to read {}: {}", path.display(), e)))?;

    let descriptor = FileDescriptor::from_path(path, metadata.len());
    let check = validate_file(&descriptor);
    if !check.valid {
        warn!(file = %path.display(), reason = %check.message, "rejected csv file");
    }
    check.into_result()?;

    let bytes = fs::read(path)
        .map_err(|e| CsvError::Io(format!("failed to read {}: {}", path.display(), e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CsvError::Io(format!("{} is not valid UTF-8: {}", path.display(), e)))?;

    parse_text(&text)
}

// ============================================================================
// EXAMPLE DATA
// ============================================================================

/// Sample employees table offered for download / copy
pub const EXAMPLE_CSV_ROWS: &[&[&str]] = &[
    &["name", "email", "age", "department", "salary", "joinDate"],
    &["John Doe", "john@example.com", "30", "Engineering", "75000", "2022-01-15"],
    &["Jane Smith", "jane@example.com", "25", "Design", "65000", "2022-03-20"],
    &["Bob Johnson", "bob@example.com", "35", "Marketing", "70000", "2021-11-10"],
    &["Alice Brown", "alice@example.com", "28", "Engineering", "72000", "2022-02-28"],
    &["Charlie Davis", "charlie@example.com", "32", "Sales", "68000", "2021-12-05"],
    &["Eva Wilson", "eva@example.com", "29", "Design", "66000", "2022-04-12"],
    &["Frank Miller", "frank@example.com", "31", "Engineering", "78000", "2021-10-20"],
    &["Grace Lee", "grace@example.com", "26", "Marketing", "64000", "2022-05-08"],
];

/// Full example document
pub fn example_csv() -> String {
    join_rows(EXAMPLE_CSV_ROWS)
}

/// Header plus three rows, small enough to paste
pub fn simple_example_csv() -> String {
    join_rows(&EXAMPLE_CSV_ROWS[..4])
}

fn join_rows(rows: &[&[&str]]) -> String {
    rows.iter()
        .map(|row| row.join(","))
        .collect::<Vec<_>>()
        .join("\n")
}
