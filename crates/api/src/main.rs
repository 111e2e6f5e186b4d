use std::sync::Arc;

use redelivery_api::app::{self, ApiConfig};
use redelivery_engine::ConsumerConfig;
use redelivery_log::InMemoryLog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    redelivery_observability::init();

    let consumer_config = ConsumerConfig::from_env()?;
    let api_config = ApiConfig::from_env();

    let log = Arc::new(InMemoryLog::with_default_partitions(consumer_config.partitions));
    let (services, consumer) = app::services::start(consumer_config, &api_config, log).await?;
    let app = app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&api_config.http_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    consumer.shutdown().await;
    Ok(())
}
