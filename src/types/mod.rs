use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod job;
pub use job::*;
mod search;
pub use search::*;

/// Opaque identifier grouping documents and the conversation bound to them.
pub type CollectionId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub chunk_count: u32,
    #[serde(default)]
    pub collection_id: Option<CollectionId>,
    #[serde(default)]
    pub upload_date: Option<DateTime<Utc>>,
}

impl Document {
    /// Documents without chunks failed processing upstream and never match a query.
    pub fn is_searchable(&self) -> bool {
        self.chunk_count > 0
    }
}

/// A file handed to the ingestion service.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = mime_guess::from_path(&name)
            .first()
            .map(|mime| mime.to_string());
        Self {
            name,
            bytes,
            content_type,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub chunks_created: Option<u32>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsResponse {
    pub success: bool,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}
