//! PostgreSQL-backed monitor request store.

use futures::TryStreamExt;
use futures::stream::BoxStream;
use sqlx::PgPool;

use sentinel_common::error::AppError;
use sentinel_common::types::MonitorRequest;
use sentinel_engine::traits::{DeleteOutcome, RequestStore};

#[derive(Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RequestStore for PgRequestStore {
    /// Streaming cursor over all requests, oldest first. The cursor holds a
    /// connection for the duration of the pass and may time out on large
    /// result sets; the runner treats that as a retryable pass failure.
    fn find_all(&self) -> BoxStream<'_, Result<MonitorRequest, AppError>> {
        Box::pin(
            sqlx::query_as::<_, MonitorRequest>(
                r#"
                SELECT id, chat_target, contract_address, sponsor_address, cr_threshold, created_at
                FROM monitor_requests
                ORDER BY created_at
                "#,
            )
            .fetch(&self.pool)
            .map_err(AppError::from),
        )
    }

    async fn delete(&self, request: &MonitorRequest) -> Result<DeleteOutcome, AppError> {
        let result = sqlx::query("DELETE FROM monitor_requests WHERE id = $1")
            .bind(request.id)
            .execute(&self.pool)
            .await?;

        Ok(if result.rows_affected() > 0 {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }
}
