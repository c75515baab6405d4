use axum::http::{header, HeaderName, Request};
use std::{iter::once, sync::Arc};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    sensitive_headers::{SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tries to load tracing config from environment (RUST_LOG) or uses "info".
pub fn setup_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().include_headers(true))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

/// Keeps auth material out of the trace output.
pub fn sensitive_headers_layers() -> (
    SetSensitiveRequestHeadersLayer,
    SetSensitiveResponseHeadersLayer,
) {
    let headers: Arc<[_]> = Arc::new([header::AUTHORIZATION, header::COOKIE]);
    (
        SetSensitiveRequestHeadersLayer::from_shared(headers),
        SetSensitiveResponseHeadersLayer::from_shared(once(header::SET_COOKIE).collect()),
    )
}

#[derive(Clone, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _: &Request<B>) -> Option<RequestId> {
        uuid::Uuid::new_v4()
            .to_string()
            .parse()
            .ok()
            .map(RequestId::new)
    }
}

/// Stamps each request with an `x-request-id` and echoes it on the response.
pub fn request_id_layers() -> (SetRequestIdLayer<UuidRequestId>, PropagateRequestIdLayer) {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    (
        SetRequestIdLayer::new(header.clone(), UuidRequestId),
        PropagateRequestIdLayer::new(header),
    )
}
