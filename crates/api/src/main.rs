use std::sync::Arc;

use anyhow::Context;

use todoflow_infra::config::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    todoflow_observability::init();

    let config = ServiceConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "starting todoflow api");

    let services = Arc::new(todoflow_api::app::build_services(&config).await?);
    let app = todoflow_api::app::build_app(services.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;

    services.shutdown().await;
    Ok(())
}
