use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Ethereum JSON-RPC URL used for position and price lookups
    pub rpc_url: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Telegram bot token used for alert delivery
    pub telegram_bot_token: String,

    /// Seconds to wait between evaluation passes.
    /// 0 means single-shot mode: run one pass and exit.
    pub polling_delay_secs: u64,

    /// Number of times a failed evaluation pass is retried before the
    /// error becomes fatal for this invocation (default: 3)
    pub error_retries: u32,

    /// Seconds to wait between pass retries (default: 1)
    pub error_retries_timeout_secs: u64,

    /// When true, alert dispatch is skipped and treated as sent
    pub dry_run: bool,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            rpc_url: std::env::var("RPC_URL")
                .map_err(|_| anyhow::anyhow!("RPC_URL environment variable is required"))?,
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").map_err(|_| {
                anyhow::anyhow!("TELEGRAM_BOT_TOKEN environment variable is required")
            })?,
            polling_delay_secs: std::env::var("POLLING_DELAY")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLLING_DELAY must be a valid u64"))?,
            error_retries: std::env::var("ERROR_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ERROR_RETRIES must be a valid u32"))?,
            error_retries_timeout_secs: std::env::var("ERROR_RETRIES_TIMEOUT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ERROR_RETRIES_TIMEOUT must be a valid u64"))?,
            dry_run: std::env::var("DRY_RUN").is_ok_and(|v| v == "true"),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
