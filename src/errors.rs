use anyhow::{anyhow, Error};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    conversation::ConversationError, orchestrator::SearchError, session::SessionError,
    upstream::UpstreamError,
};

pub enum ServerError {
    UpstreamError(Error),
    ValidationError(Error),
    NotFound(Error),
    Conflict(Error),
    SearchFailed(Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::UpstreamError(err) => {
                tracing::error!("{:?}", err);
                HTTPError::new(err)
                    .with_status(StatusCode::BAD_GATEWAY)
                    .into_response()
            }
            ServerError::ValidationError(err) => {
                tracing::warn!("{:?}", err);
                HTTPError::new(err)
                    .with_status(StatusCode::BAD_REQUEST)
                    .into_response()
            }
            ServerError::NotFound(err) => {
                tracing::warn!("{:?}", err);
                HTTPError::new(err)
                    .with_status(StatusCode::NOT_FOUND)
                    .into_response()
            }
            ServerError::Conflict(err) => {
                tracing::warn!("{:?}", err);
                HTTPError::new(err)
                    .with_status(StatusCode::CONFLICT)
                    .into_response()
            }
            ServerError::SearchFailed(err) => {
                tracing::error!("{:?}", err);
                HTTPError::new(err)
                    .with_status(StatusCode::BAD_GATEWAY)
                    .into_response()
            }
        }
    }
}

impl From<UpstreamError> for ServerError {
    fn from(err: UpstreamError) -> Self {
        ServerError::UpstreamError(anyhow!(err))
    }
}

impl From<ConversationError> for ServerError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(_) => ServerError::NotFound(anyhow!(err)),
        }
    }
}

impl From<SearchError> for ServerError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::EmptyQuery | SearchError::InvalidTopK(_) => {
                ServerError::ValidationError(anyhow!(err))
            }
            _ => ServerError::SearchFailed(anyhow!(err)),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Search(err) => err.into(),
            SessionError::Conversation(err) => err.into(),
            SessionError::Upstream(err) => err.into(),
            SessionError::Job(_) | SessionError::NothingToUpload => {
                ServerError::ValidationError(anyhow!(err))
            }
            SessionError::ConversationChanged => ServerError::Conflict(anyhow!(err)),
        }
    }
}

#[derive(Debug)]
struct HTTPError {
    error: Error,
    status_code: StatusCode,
}

impl HTTPError {
    fn new(error: Error) -> Self {
        Self {
            error,
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }
}

impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        (
            self.status_code,
            Json(json!({ "error": self.error.to_string() })),
        )
            .into_response()
    }
}
