use serde::Serialize;

use crate::types::{ErrorType, FileResult, JobStatusResponse, UploadResponse};

/// What a progress slot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Uploading,
    Processing,
    Complete,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub filename: String,
    pub reason: ErrorType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: Option<String>,
}

/// Classified result of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub status: DisplayStatus,
    pub total_files: u32,
    pub succeeded_files: u32,
    pub total_chunks: u32,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
    /// Failures counted by the service but missing from `file_results`.
    pub unlisted_failures: u32,
}

impl Outcome {
    pub fn from_status(resp: &JobStatusResponse) -> Self {
        let failed_files = resp.failed_files.min(resp.processed_files);
        let succeeded_files = (resp.processed_files - failed_files).min(resp.total_files);

        let (skipped, failed) = partition(&resp.file_results);
        let listed = (skipped.len() + failed.len()) as u32;
        let unlisted_failures = failed_files.saturating_sub(listed);

        let mut outcome = Self {
            status: DisplayStatus::Complete,
            total_files: resp.total_files,
            succeeded_files,
            total_chunks: resp.total_chunks,
            skipped,
            failed,
            unlisted_failures,
        };
        outcome.status = outcome.classify();
        outcome
    }

    /// Outcome of an upload the service processed synchronously.
    pub fn from_upload(resp: &UploadResponse) -> Self {
        Self {
            status: DisplayStatus::Complete,
            total_files: 1,
            succeeded_files: 1,
            total_chunks: resp.chunks_created.unwrap_or_default(),
            skipped: Vec::new(),
            failed: Vec::new(),
            unlisted_failures: 0,
        }
    }

    /// True when at least one file failed unexpectedly. Skips never count.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty() || self.unlisted_failures > 0
    }

    fn classify(&self) -> DisplayStatus {
        if !self.has_failures() {
            DisplayStatus::Complete
        } else if self.succeeded_files > 0 {
            DisplayStatus::Warning
        } else {
            DisplayStatus::Error
        }
    }

    pub fn message(&self, file_name: &str) -> String {
        if self.total_files <= 1 && self.skipped.is_empty() && !self.has_failures() {
            return format!(
                "{} processed successfully ({} chunks)",
                file_name, self.total_chunks
            );
        }

        let mut message = format!(
            "{}: {}/{} files processed, {} chunks",
            file_name, self.succeeded_files, self.total_files, self.total_chunks
        );
        if !self.skipped.is_empty() {
            let names = self
                .skipped
                .iter()
                .map(|file| file.filename.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            message.push_str(&format!("; {} skipped: {}", self.skipped.len(), names));
        }
        if self.has_failures() {
            let mut names = self
                .failed
                .iter()
                .map(|file| match &file.error {
                    Some(error) => format!("{} ({})", file.filename, error),
                    None => file.filename.clone(),
                })
                .collect::<Vec<_>>();
            if self.unlisted_failures > 0 {
                names.push(format!("{} unreported", self.unlisted_failures));
            }
            let count = self.failed.len() as u32 + self.unlisted_failures;
            message.push_str(&format!("; {} failed: {}", count, names.join(", ")));
        }
        message
    }
}

fn partition(results: &[FileResult]) -> (Vec<SkippedFile>, Vec<FailedFile>) {
    let mut skipped = Vec::new();
    let mut failed = Vec::new();
    for result in results.iter().filter(|result| !result.success) {
        match &result.error_type {
            Some(reason) if result.is_skip() => skipped.push(SkippedFile {
                filename: result.filename.clone(),
                reason: reason.clone(),
            }),
            _ => failed.push(FailedFile {
                filename: result.filename.clone(),
                error: result.error.clone(),
            }),
        }
    }
    (skipped, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;

    fn ok(name: &str) -> FileResult {
        FileResult {
            filename: name.to_string(),
            success: true,
            error: None,
            error_type: None,
        }
    }

    fn failed(name: &str, error_type: &str) -> FileResult {
        FileResult {
            filename: name.to_string(),
            success: false,
            error: Some(format!("{} error", error_type)),
            error_type: Some(ErrorType::from(error_type.to_string())),
        }
    }

    fn completed(processed: u32, failed: u32, results: Vec<FileResult>) -> JobStatusResponse {
        JobStatusResponse {
            status: JobStatus::Completed,
            total_files: results.len() as u32,
            processed_files: processed,
            failed_files: failed,
            total_chunks: 42,
            file_results: results,
            error_message: None,
        }
    }

    #[test]
    fn test_archive_with_skips_and_one_corrupt_file_is_warning() {
        let mut results: Vec<FileResult> = (0..7).map(|i| ok(&format!("doc{}.pdf", i))).collect();
        results.push(failed(".DS_Store", "skipped_system_file"));
        results.push(failed("._doc0.pdf", "skipped_system_file"));
        results.push(failed("corrupt.pdf", "extraction_failed"));

        let outcome = Outcome::from_status(&completed(10, 3, results));

        assert_eq!(outcome.status, DisplayStatus::Warning);
        assert_eq!(outcome.total_files, 10);
        assert_eq!(outcome.succeeded_files, 7);
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(
            outcome.message("report.zip"),
            "report.zip: 7/10 files processed, 42 chunks; 2 skipped: .DS_Store, ._doc0.pdf; \
             1 failed: corrupt.pdf (extraction_failed error)"
        );
    }

    #[test]
    fn test_skip_only_outcome_is_complete() {
        let results = vec![
            ok("a.pdf"),
            failed("Thumbs.db", "skipped_system_file"),
            failed("tool.exe", "unsupported_file_type"),
            failed("inner.zip", "nested_zip"),
        ];
        let outcome = Outcome::from_status(&completed(4, 3, results));
        assert_eq!(outcome.status, DisplayStatus::Complete);
        assert!(!outcome.has_failures());
    }

    #[test]
    fn test_all_skipped_is_never_error() {
        let results = vec![
            failed(".DS_Store", "skipped_system_file"),
            failed("inner.zip", "nested_zip"),
        ];
        let outcome = Outcome::from_status(&completed(2, 2, results));
        assert_eq!(outcome.succeeded_files, 0);
        assert_eq!(outcome.status, DisplayStatus::Complete);
    }

    #[test]
    fn test_only_real_failures_is_error() {
        let results = vec![failed("a.pdf", "timeout"), failed("b.pdf", "ocr_failed")];
        let outcome = Outcome::from_status(&completed(2, 2, results));
        assert_eq!(outcome.status, DisplayStatus::Error);
    }

    #[test]
    fn test_unlisted_failures_count_as_real() {
        let mut resp = completed(3, 1, vec![]);
        resp.total_files = 3;
        let outcome = Outcome::from_status(&resp);
        assert_eq!(outcome.unlisted_failures, 1);
        assert_eq!(outcome.status, DisplayStatus::Warning);
        assert!(outcome.message("bulk.zip").ends_with("; 1 failed: 1 unreported"));
    }

    #[test]
    fn test_single_file_success_message() {
        let outcome = Outcome::from_status(&completed(1, 0, vec![ok("notes.pdf")]));
        assert_eq!(
            outcome.message("notes.pdf"),
            "notes.pdf processed successfully (42 chunks)"
        );
    }
}
