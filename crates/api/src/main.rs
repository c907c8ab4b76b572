use anyhow::{Context, Result};
use csf_api::{build_app, AppConfig};
use csf_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("csf_api");

    let config = AppConfig::from_env().context("invalid startup configuration")?;
    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        model = %config.llm.model,
        reference_root = ?config.reference_root,
        hyphens = config.hyphen_policy.as_str(),
        "nist csf chat api started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
