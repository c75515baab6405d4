//! Client side of the ingestion and search service.
//!
//! Everything the session needs from the outside world goes through the
//! [`Upstream`] trait, so the tracker, view and orchestrator can run against a
//! scripted fake in tests.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::types::{
    DeleteResponse, Document, DocumentsResponse, JobStatusResponse, SearchRequest,
    SearchResponse, UploadFile, UploadResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Upstream responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// `POST upload(file, collection_id)`
    async fn upload(
        &self,
        file: &UploadFile,
        collection_id: &str,
    ) -> Result<UploadResponse, UpstreamError>;

    /// `GET job_status(job_id)`
    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, UpstreamError>;

    /// `POST search(...)`
    async fn search(&self, req: &SearchRequest<'_>) -> Result<SearchResponse, UpstreamError>;

    /// `GET documents(collection_id | null)`. `None` asks for every collection.
    async fn documents(&self, collection_id: Option<&str>)
        -> Result<Vec<Document>, UpstreamError>;

    /// `DELETE document(document_id)`
    async fn delete_document(&self, document_id: &str) -> Result<(), UpstreamError>;
}

#[derive(Clone)]
pub struct HttpUpstream {
    client: Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, UpstreamError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json::<T>().await?)
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn upload(
        &self,
        file: &UploadFile,
        collection_id: &str,
    ) -> Result<UploadResponse, UpstreamError> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = Form::new()
            .part("file", part)
            .text("collection_id", collection_id.to_string());

        tracing::debug!(file = %file.name, collection_id, "Uploading file");
        let resp = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, UpstreamError> {
        let resp = self
            .client
            .get(self.url(&format!("job-status/{}", job_id)))
            .send()
            .await?;
        read_json(resp).await
    }

    async fn search(&self, req: &SearchRequest<'_>) -> Result<SearchResponse, UpstreamError> {
        let resp = self
            .client
            .post(self.url("search"))
            .json(req)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn documents(
        &self,
        collection_id: Option<&str>,
    ) -> Result<Vec<Document>, UpstreamError> {
        let request = self.client.get(self.url("documents"));
        let request = match collection_id {
            Some(id) => request.query(&[("collection_id", id)]),
            None => request.query(&[("all", "true")]),
        };
        let body: DocumentsResponse = read_json(request.send().await?).await?;
        if !body.success {
            return Err(UpstreamError::Rejected(
                body.message
                    .unwrap_or_else(|| "Failed to list documents".to_string()),
            ));
        }
        Ok(body.documents)
    }

    async fn delete_document(&self, document_id: &str) -> Result<(), UpstreamError> {
        let resp = self
            .client
            .delete(self.url(&format!("documents/{}", document_id)))
            .send()
            .await?;
        let body: DeleteResponse = read_json(resp).await?;
        if !body.success {
            return Err(UpstreamError::Rejected(
                body.message
                    .unwrap_or_else(|| format!("Failed to delete document {}", document_id)),
            ));
        }
        Ok(())
    }
}
