use retrieval_desk::{
    orchestrator::SearchOptions, session::Session, setup_tracing, tracker::TrackerPolicy,
    upstream::HttpUpstream, Configuration,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), hyper::Error> {
    // Loads the .env file located in the environment's current directory or its parents in sequence.
    // .env used only for development, so we discard error in all other cases.
    dotenv::dotenv().ok();

    setup_tracing();

    tracing::debug!("Initializing configuration");
    let cfg = Configuration::new().expect("Failed to load configuration");

    tracing::debug!(upstream = %cfg.upstream_url, "Initializing upstream client");
    let upstream = HttpUpstream::new(&cfg.upstream_url, cfg.upstream_timeout)
        .expect("Failed to build upstream client");

    let session = Session::new(Arc::new(upstream), TrackerPolicy::from_config(&cfg))
        .with_default_options(SearchOptions {
            top_k: cfg.default_top_k,
            ..Default::default()
        });
    let session = Arc::new(session);

    tracing::info!("Starting server on {}...", cfg.listen_address);
    let result = retrieval_desk::run(cfg, session.clone()).await;
    session.teardown();
    result
}
