#![allow(dead_code)]

use async_trait::async_trait;
use retrieval_desk::{
    session::Session,
    tracker::TrackerPolicy,
    types::{
        Document, FileResult, JobStatus, JobStatusResponse, SearchRequest, SearchResponse,
        UploadFile, UploadResponse,
    },
    upstream::{Upstream, UpstreamError},
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

/// In-memory stand-in for the ingestion and search service.
///
/// Job status scripts are consumed front to back and the last entry repeats.
/// A job without a script reports `processing` forever.
#[derive(Default)]
pub struct FakeUpstream {
    uploads: Mutex<Vec<(String, String)>>,
    upload_replies: Mutex<HashMap<String, UploadResponse>>,
    jobs: Mutex<HashMap<String, VecDeque<JobStatusResponse>>>,
    status_calls: Mutex<HashMap<String, u32>>,
    searches: Mutex<Vec<serde_json::Value>>,
    search_replies: Mutex<VecDeque<SearchResponse>>,
    search_delay: Mutex<Option<Duration>>,
    documents: Mutex<Vec<Document>>,
    document_calls: Mutex<Vec<Option<String>>>,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_to_upload(&self, file_name: &str, resp: UploadResponse) {
        self.upload_replies
            .lock()
            .unwrap()
            .insert(file_name.to_string(), resp);
    }

    pub fn script_job(&self, job_id: &str, script: Vec<JobStatusResponse>) {
        self.jobs
            .lock()
            .unwrap()
            .insert(job_id.to_string(), script.into());
    }

    pub fn reply_to_search(&self, resp: SearchResponse) {
        self.search_replies.lock().unwrap().push_back(resp);
    }

    pub fn delay_search(&self, delay: Duration) {
        *self.search_delay.lock().unwrap() = Some(delay);
    }

    pub fn add_document(&self, collection_id: &str, name: &str, chunk_count: u32) -> Document {
        let doc = Document {
            id: format!("doc-{}", name),
            name: name.to_string(),
            doc_type: name.rsplit('.').next().unwrap_or_default().to_string(),
            size: 1024,
            chunk_count,
            collection_id: Some(collection_id.to_string()),
            upload_date: None,
        };
        self.documents.lock().unwrap().push(doc.clone());
        doc
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn status_calls(&self, job_id: &str) -> u32 {
        self.status_calls
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn searches(&self) -> Vec<serde_json::Value> {
        self.searches.lock().unwrap().clone()
    }

    pub fn document_calls(&self) -> Vec<Option<String>> {
        self.document_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn upload(
        &self,
        file: &UploadFile,
        collection_id: &str,
    ) -> Result<UploadResponse, UpstreamError> {
        self.uploads
            .lock()
            .unwrap()
            .push((file.name.clone(), collection_id.to_string()));
        let scripted = self.upload_replies.lock().unwrap().get(&file.name).cloned();
        Ok(scripted.unwrap_or_else(|| UploadResponse {
            success: true,
            job_id: Some(job_id_for(&file.name)),
            chunks_created: None,
            processing_time: None,
            message: None,
        }))
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, UpstreamError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;
        let mut jobs = self.jobs.lock().unwrap();
        let Some(script) = jobs.get_mut(job_id) else {
            return Ok(processing(0, 1));
        };
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        next.ok_or_else(|| UpstreamError::Status {
            status: 404,
            body: format!("unknown job {}", job_id),
        })
    }

    async fn search(&self, req: &SearchRequest<'_>) -> Result<SearchResponse, UpstreamError> {
        self.searches
            .lock()
            .unwrap()
            .push(serde_json::to_value(req).unwrap());
        let delay = *self.search_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.search_replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| SearchResponse {
            success: true,
            answer: Some("default answer".into()),
            ..Default::default()
        }))
    }

    async fn documents(&self, collection_id: Option<&str>) -> Result<Vec<Document>, UpstreamError> {
        self.document_calls
            .lock()
            .unwrap()
            .push(collection_id.map(str::to_string));
        let documents = self.documents.lock().unwrap();
        Ok(documents
            .iter()
            .filter(|doc| collection_id.is_none() || doc.collection_id.as_deref() == collection_id)
            .cloned()
            .collect())
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), UpstreamError> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|doc| doc.id != document_id);
        if documents.len() == before {
            return Err(UpstreamError::Rejected(format!(
                "Document {} not found",
                document_id
            )));
        }
        Ok(())
    }
}

pub fn job_id_for(file_name: &str) -> String {
    format!("job-{}", file_name)
}

pub fn processing(processed: u32, total: u32) -> JobStatusResponse {
    JobStatusResponse {
        status: JobStatus::Processing,
        total_files: total,
        processed_files: processed,
        failed_files: 0,
        total_chunks: 0,
        file_results: Vec::new(),
        error_message: None,
    }
}

pub fn completed(total: u32, failed: u32, chunks: u32, results: Vec<FileResult>) -> JobStatusResponse {
    JobStatusResponse {
        status: JobStatus::Completed,
        total_files: total,
        processed_files: total,
        failed_files: failed,
        total_chunks: chunks,
        file_results: results,
        error_message: None,
    }
}

pub fn failed_job(message: &str) -> JobStatusResponse {
    JobStatusResponse {
        status: JobStatus::Failed,
        error_message: Some(message.to_string()),
        ..processing(0, 1)
    }
}

pub fn file_result(filename: &str, error: &str, error_type: Option<&str>) -> FileResult {
    serde_json::from_value(serde_json::json!({
        "filename": filename,
        "success": false,
        "error": error,
        "error_type": error_type,
    }))
    .unwrap()
}

pub fn policy() -> TrackerPolicy {
    TrackerPolicy::default()
}

pub fn session(upstream: &Arc<FakeUpstream>) -> Session {
    Session::new(upstream.clone(), policy())
}

pub fn file(name: &str) -> UploadFile {
    UploadFile::new(name, b"content".to_vec())
}

/// Lets spawned jobs run for `duration` of (paused) tokio time.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
