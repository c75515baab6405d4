use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{errors::ServerError, AppState};

pub async fn health_check_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServerError> {
    Ok(Json(json!({
        "status": "ok",
        "active_timers": state.session.active_timers(),
    })))
}
