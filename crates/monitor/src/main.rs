mod chain;
mod runner;
mod store;
mod telegram;

use sentinel_common::config::AppConfig;
use sentinel_common::db;

use crate::runner::BatchRunner;
use crate::store::PgRequestStore;
use crate::telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_monitor=info,sentinel_engine=info".into()),
        )
        .init();

    tracing::info!("CR Sentinel monitor starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    if config.dry_run {
        tracing::info!("Dry run enabled — alerts will be evaluated but not delivered");
    }

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Collaborators
    let chain = chain::connect(&config.rpc_url).await?;
    let store = PgRequestStore::new(pool);
    let messenger = TelegramMessenger::new(&config.telegram_bot_token);

    let runner = BatchRunner::new(store, chain.clone(), chain, messenger, &config);

    tracing::info!(
        polling_delay_secs = config.polling_delay_secs,
        error_retries = config.error_retries,
        "Starting batch evaluation loop"
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = runner.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Batch runner exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("CR Sentinel monitor stopped.");
    Ok(())
}
