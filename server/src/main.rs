use anyhow::Context;
use clap::Parser;
use premium_model::Classifier;
use premium_server::{cors_layer, load_classifier, router, AppState, Config, Predictor};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    // The classifier is loaded once, before the listener opens, and never replaced
    let model = load_classifier(&config.model_path)
        .with_context(|| format!("loading model artifact {}", config.model_path.display()))?;
    tracing::info!(
        path = %config.model_path.display(),
        model = model.name(),
        classes = ?model.classes(),
        "model loaded"
    );

    let state = AppState::new(Predictor::new(Arc::new(model)))
        .with_redacted_errors(config.redact_errors);
    let cors = cors_layer(&config.cors_origins).context("invalid CORS origin")?;

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, "premium-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
