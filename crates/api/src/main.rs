use std::future::IntoFuture;

use anyhow::Context;

use resellsync_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    resellsync_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind_addr = config.bind_addr;

    let (app, services) =
        resellsync_api::app::build_app(config).context("failed to start services")?;

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    // Open SSE streams never finish on their own, so shutdown does not wait
    // for connections to drain.
    tokio::select! {
        served = axum::serve(listener, app).into_future() => served.context("server error")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
    }

    tokio::task::spawn_blocking(move || services.shutdown()).await?;
    Ok(())
}
