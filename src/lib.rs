use axum::{routing::IntoMakeService, Router, Server};
use hyper::server::conn::AddrIncoming;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{AllowHeaders, Any, CorsLayer},
    timeout::TimeoutLayer,
};

mod cfg;
pub use cfg::*;
mod telemetry;
pub use telemetry::*;
pub mod collection;
pub mod conversation;
mod errors;
pub mod orchestrator;
mod routes;
pub mod session;
pub mod tracker;
pub mod types;
pub mod upstream;

use session::Session;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub cfg: Config,
}

pub fn app(cfg: Config, session: Arc<Session>) -> Router {
    let app_state = AppState { session, cfg };

    let trace_layer = telemetry::trace_layer();
    let (req_headers_layer, resp_headers_layer) = telemetry::sensitive_headers_layers();
    let (request_id_layer, propagate_request_id_layer) = telemetry::request_id_layers();

    let cors_layer = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(600));

    // Outlives the upstream client timeout so its error is what the caller sees.
    let timeout_layer =
        TimeoutLayer::new(app_state.cfg.upstream_timeout + Duration::from_secs(30));

    Router::new()
        .merge(routes::router())
        .layer(cors_layer)
        .layer(timeout_layer)
        .layer(resp_headers_layer)
        .layer(propagate_request_id_layer)
        .layer(trace_layer)
        .layer(req_headers_layer)
        .layer(request_id_layer)
        .with_state(app_state)
}

pub fn run(cfg: Config, session: Arc<Session>) -> Server<AddrIncoming, IntoMakeService<Router>> {
    let addr = cfg.listen_address;
    let app = app(cfg, session);
    axum::Server::bind(&addr).serve(app.into_make_service())
}
