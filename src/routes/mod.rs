use axum::{routing::get, Router};

mod conversations;
mod documents;
mod health_check;
mod jobs;
mod search;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health_check", get(health_check::health_check_handler))
        .nest(
            "/api",
            Router::new()
                .merge(conversations::routes())
                .merge(documents::routes())
                .merge(jobs::routes())
                .merge(search::routes()),
        )
}
