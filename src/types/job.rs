use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Client-local correlation key for one submission. Never sent upstream.
pub type FileId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// Why a contained file was not ingested.
///
/// The first three variants are expected artifacts of archive uploads and count
/// as skips. Anything else reported by the ingestion service is a real failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorType {
    SkippedSystemFile,
    UnsupportedFileType,
    NestedZip,
    Other(String),
}

impl ErrorType {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ErrorType::SkippedSystemFile | ErrorType::UnsupportedFileType | ErrorType::NestedZip
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorType::SkippedSystemFile => "skipped_system_file",
            ErrorType::UnsupportedFileType => "unsupported_file_type",
            ErrorType::NestedZip => "nested_zip",
            ErrorType::Other(value) => value,
        }
    }
}

impl From<String> for ErrorType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "skipped_system_file" => ErrorType::SkippedSystemFile,
            "unsupported_file_type" => ErrorType::UnsupportedFileType,
            "nested_zip" => ErrorType::NestedZip,
            _ => ErrorType::Other(value),
        }
    }
}

impl From<ErrorType> for String {
    fn from(value: ErrorType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub filename: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<ErrorType>,
}

impl FileResult {
    /// A failed entry without an error type is treated as a real failure.
    pub fn is_skip(&self) -> bool {
        !self.success && self.error_type.as_ref().is_some_and(ErrorType::is_skip)
    }
}

/// Body of `GET job_status(job_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub total_files: u32,
    #[serde(default)]
    pub processed_files: u32,
    #[serde(default)]
    pub failed_files: u32,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub file_results: Vec<FileResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Everything known about one background ingestion unit.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionJob {
    pub job_id: Option<String>,
    pub file_id: FileId,
    pub file_name: String,
    pub status: JobStatus,
    pub total_files: u32,
    pub processed_files: u32,
    pub failed_files: u32,
    pub total_chunks: u32,
    pub per_file_results: Vec<FileResult>,
    pub error_message: Option<String>,
}

impl IngestionJob {
    pub fn new(file_id: FileId, file_name: impl Into<String>) -> Self {
        Self {
            job_id: None,
            file_id,
            file_name: file_name.into(),
            status: JobStatus::Processing,
            total_files: 0,
            processed_files: 0,
            failed_files: 0,
            total_chunks: 0,
            per_file_results: Vec::new(),
            error_message: None,
        }
    }

    /// Copies the counters of a status response.
    ///
    /// `failed_files` is clamped so that `processed_files - failed_files` stays
    /// within `total_files` even when the service reports inconsistent numbers.
    pub fn apply(&mut self, resp: &JobStatusResponse) {
        self.status = resp.status;
        self.total_files = resp.total_files;
        self.processed_files = resp.processed_files;
        self.failed_files = resp.failed_files.min(resp.processed_files);
        let succeeded = self.processed_files - self.failed_files;
        if succeeded > self.total_files {
            tracing::warn!(
                file_id = %self.file_id,
                total = resp.total_files,
                processed = resp.processed_files,
                failed = resp.failed_files,
                "Job status reports more successes than files"
            );
            self.failed_files = self.processed_files - self.total_files;
        }
        self.total_chunks = resp.total_chunks;
        self.per_file_results = resp.file_results.clone();
        self.error_message = resp.error_message.clone();
    }
}
