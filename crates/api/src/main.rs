use anyhow::Context;

use fnapp_api::app::{build_app, AppState};
use fnapp_api::config::AppConfig;
use fnapp_triggers::queue::{ConsumerConfig, InMemoryQueue, QueueConsumer, RetryPolicy};
use fnapp_triggers::{tasks, OrderProcessor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fnapp_observability::init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        route_prefix = %config.route_prefix,
        queue = %config.queue_name,
        max_attempts = config.queue_max_attempts,
        malformed_messages = ?config.malformed_messages,
        timers_enabled = config.timers_enabled,
        "configuration loaded"
    );

    // Queue trigger: orders consumer on a background thread.
    let queue = InMemoryQueue::new(config.queue_name.clone())
        .with_default_retry_policy(RetryPolicy::default().with_max_attempts(config.queue_max_attempts));
    let processor = OrderProcessor::new(config.malformed_messages);
    let consumer = QueueConsumer::new(queue, move |message| processor.handle(message))
        .spawn(ConsumerConfig::default().with_name(format!("{}-consumer", config.queue_name)))
        .context("failed to start queue consumer")?;

    // Timer triggers.
    let mut timers = Vec::new();
    if config.timers_enabled {
        for timer in tasks::default_timers()? {
            timers.push(timer.spawn().context("failed to start timer")?);
        }
    }

    let app = build_app(AppState::in_memory(), &config.route_prefix)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    consumer.shutdown();
    for timer in timers {
        timer.shutdown();
    }
    tracing::info!("stopped");

    Ok(())
}
