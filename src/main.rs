//! NeuralDeep relay server
//!
//! Serves `POST /api/chat`, forwarding conversations to the configured
//! completion provider and streaming the reply back.

use neuraldeep::api::{create_router, AppState};
use neuraldeep::config::ServerConfig;
use neuraldeep::relay::Relay;
use tower_http::{
    compression::{
        predicate::{NotForContentType, Predicate},
        CompressionLayer, DefaultPredicate,
    },
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neuraldeep=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env();

    let service = config.llm.build_service()?;
    match &service {
        Some(service) => tracing::info!(
            model = %service.model_id(),
            max_tokens = config.relay.max_tokens,
            timeout_secs = config.relay.timeout.as_secs(),
            "Completion provider configured"
        ),
        None => tracing::warn!(
            "GOOGLE_GENERATIVE_AI_API_KEY is not set; every chat request will fail with a configuration error"
        ),
    }

    let state = AppState::new(Relay::new(service, config.relay), config.body_limit);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Reply frames must reach the client as they are produced.
    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true)
        .compress_when(DefaultPredicate::new().and(NotForContentType::const_new("text/plain")));

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = config.listen_addr();
    tracing::info!("NeuralDeep relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
