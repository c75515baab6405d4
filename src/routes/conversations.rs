use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use hyper::StatusCode;
use serde::Serialize;

use crate::{
    conversation::ConversationSummary, errors::ServerError, session::Switched, types::Turn,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/current", get(current_conversation))
        .route("/conversations/:conversation_id", delete(delete_conversation))
        .route(
            "/conversations/:conversation_id/switch",
            post(switch_conversation),
        )
}

pub async fn list_conversations(State(state): State<AppState>) -> Json<Vec<ConversationSummary>> {
    Json(state.session.conversations())
}

pub async fn create_conversation(State(state): State<AppState>) -> (StatusCode, Json<Switched>) {
    let switched = state.session.new_conversation().await;
    (StatusCode::CREATED, Json(switched))
}

#[derive(Serialize)]
pub struct CurrentResp {
    pub conversation: Option<ConversationSummary>,
    pub turns: Vec<Turn>,
}

pub async fn current_conversation(State(state): State<AppState>) -> Json<CurrentResp> {
    Json(CurrentResp {
        conversation: state.session.current_conversation(),
        turns: state.session.history(),
    })
}

pub async fn switch_conversation(
    Path(conversation_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Switched>, ServerError> {
    tracing::info!("Switching to conversation {}", conversation_id);
    let switched = state.session.switch_conversation(&conversation_id).await?;
    Ok(Json(switched))
}

pub async fn delete_conversation(
    Path(conversation_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ConversationSummary>, ServerError> {
    let removed = state.session.delete_conversation(&conversation_id)?;
    Ok(Json(removed))
}
