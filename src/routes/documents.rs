use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{collection::Scope, errors::ServerError, types::Document, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents))
        .route("/documents/refresh", post(refresh_documents))
        .route("/documents/:document_id", delete(delete_document))
}

#[derive(Deserialize, Debug, Default)]
pub struct DocumentsQuery {
    /// Admin toggle for the unscoped view.
    #[serde(default)]
    pub all: Option<bool>,
}

#[derive(Serialize)]
pub struct DocumentsResp {
    pub scope: Option<Scope>,
    /// Unset until the current scope has been loaded once.
    pub refreshed_at: Option<DateTime<Utc>>,
    pub documents: Vec<Document>,
    pub failed: Vec<Document>,
}

impl DocumentsResp {
    fn from_state(state: &AppState) -> Self {
        Self {
            scope: state.session.document_scope(),
            refreshed_at: state.session.documents_refreshed_at(),
            documents: state.session.documents(),
            failed: state.session.failed_documents(),
        }
    }
}

pub async fn list_documents(
    params: Query<DocumentsQuery>,
    State(state): State<AppState>,
) -> Result<Json<DocumentsResp>, ServerError> {
    if let Some(all) = params.all {
        state.session.show_all_documents(all).await?;
    }
    Ok(Json(DocumentsResp::from_state(&state)))
}

pub async fn refresh_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResp>, ServerError> {
    state.session.refresh_documents().await?;
    Ok(Json(DocumentsResp::from_state(&state)))
}

pub async fn delete_document(
    Path(document_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ServerError> {
    tracing::info!("Deleting document {}", document_id);
    state.session.delete_document(&document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
