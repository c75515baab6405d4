use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    errors::ServerError,
    orchestrator::SearchOptions,
    types::{PriorityOrder, ReasoningMode, SearchMode, Turn},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search))
        .route("/draft", get(get_draft).put(put_draft))
}

/// Unset fields fall back to the session defaults. A missing query submits the draft.
#[derive(Deserialize, Debug, Default)]
pub struct SearchReq {
    pub query: Option<String>,
    pub top_k: Option<u32>,
    pub search_mode: Option<SearchMode>,
    pub reasoning_mode: Option<ReasoningMode>,
    pub priority_order: Option<PriorityOrder>,
}

impl SearchReq {
    fn options(&self, defaults: &SearchOptions) -> SearchOptions {
        SearchOptions {
            top_k: self.top_k.unwrap_or(defaults.top_k),
            mode: self.search_mode.unwrap_or(defaults.mode),
            reasoning_mode: self
                .reasoning_mode
                .clone()
                .unwrap_or_else(|| defaults.reasoning_mode.clone()),
            priority_order: self.priority_order.unwrap_or(defaults.priority_order),
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchReq>,
) -> Result<Json<Turn>, ServerError> {
    let options = payload.options(state.session.default_options());
    let turn = state
        .session
        .ask(payload.query.as_deref(), Some(&options))
        .await?;
    Ok(Json(turn))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Draft {
    pub text: String,
}

pub async fn get_draft(State(state): State<AppState>) -> Json<Draft> {
    Json(Draft {
        text: state.session.draft_text(),
    })
}

pub async fn put_draft(State(state): State<AppState>, Json(payload): Json<Draft>) -> Json<Draft> {
    state.session.set_draft(&payload.text);
    Json(payload)
}
