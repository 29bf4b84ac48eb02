use thiserror::Error;

/// Common error types used across the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Price feed error: {0}")]
    PriceFeed(String),

    #[error("Message delivery error: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
