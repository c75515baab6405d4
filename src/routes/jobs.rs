use anyhow::anyhow;
use axum::{
    extract::{Multipart, Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use hyper::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    errors::ServerError,
    tracker::JobSlot,
    types::{FileId, UploadFile},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/uploads", post(upload_files))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:file_id", delete(dismiss_job))
        .route("/jobs/:file_id/recheck", post(recheck_job))
}

#[derive(Serialize, Debug)]
pub struct UploadResp {
    pub file_ids: Vec<FileId>,
}

pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResp>), ServerError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServerError::ValidationError(anyhow!("Invalid multipart body: {}", err)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("unknown").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ServerError::ValidationError(anyhow!("Failed to read {}: {}", name, err)))?;
        files.push(UploadFile::new(name, bytes.to_vec()));
    }

    tracing::info!("Received {} file(s) for upload", files.len());
    let file_ids = state.session.upload(files)?;
    Ok((StatusCode::ACCEPTED, Json(UploadResp { file_ids })))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSlot>> {
    Json(state.session.jobs())
}

pub async fn dismiss_job(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ServerError> {
    if state.session.dismiss_job(&file_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(anyhow!("Job {} does not exist", file_id)))
    }
}

pub async fn recheck_job(
    Path(file_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<JobSlot>, ServerError> {
    if state.session.job(&file_id).is_none() {
        return Err(ServerError::NotFound(anyhow!("Job {} does not exist", file_id)));
    }
    state.session.recheck_job(file_id)?;
    state
        .session
        .job(&file_id)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(anyhow!("Job {} was cleared", file_id)))
}
