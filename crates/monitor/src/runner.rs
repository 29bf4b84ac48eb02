//! Batch evaluation loop.
//!
//! Each pass streams every stored monitor request, gathers fresh contract
//! data for it, and hands it to the engine evaluator. Requests are evaluated
//! strictly sequentially inside their own failure boundary; the whole pass
//! sits behind a bounded retry with a fixed backoff, and the outer loop
//! paces repeated passes (or exits after one pass in single-shot mode).

use std::time::Duration;

use alloy::primitives::Address;
use futures::StreamExt;

use sentinel_common::config::AppConfig;
use sentinel_common::error::AppError;
use sentinel_common::types::{MonitorOutcome, MonitorRequest, PriceQuote};
use sentinel_engine::evaluator::{self, ValidatedContractProperties};
use sentinel_engine::traits::{
    DeleteOutcome, Messenger, PositionDataSource, PriceFeed, PriceFeedSource, RequestStore,
};

/// Counters for one completed pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub evaluated: u64,
    pub alerts_sent: u64,
    pub removed: u64,
    pub failed: u64,
}

/// Drives repeated evaluation passes over all stored monitor requests.
pub struct BatchRunner<S, C, F, M> {
    store: S,
    chain: C,
    feeds: F,
    messenger: M,
    polling_delay: Duration,
    error_retries: u32,
    error_retries_timeout: Duration,
    dry_run: bool,
}

impl<S, C, F, M> BatchRunner<S, C, F, M>
where
    S: RequestStore,
    C: PositionDataSource,
    F: PriceFeedSource,
    M: Messenger,
{
    pub fn new(store: S, chain: C, feeds: F, messenger: M, config: &AppConfig) -> Self {
        Self {
            store,
            chain,
            feeds,
            messenger,
            polling_delay: Duration::from_secs(config.polling_delay_secs),
            error_retries: config.error_retries,
            error_retries_timeout: Duration::from_secs(config.error_retries_timeout_secs),
            dry_run: config.dry_run,
        }
    }

    /// Run until externally terminated, or after one pass when the polling
    /// delay is zero (single-shot mode).
    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            self.run_pass_with_retry().await?;

            if self.polling_delay.is_zero() {
                tracing::info!("single-shot mode: pass complete, terminating");
                return Ok(());
            }
            tracing::debug!(
                delay_secs = self.polling_delay.as_secs(),
                "pass complete, waiting polling delay"
            );
            tokio::time::sleep(self.polling_delay).await;
        }
    }

    /// One pass behind the bounded retry policy. Exhausting the retries
    /// surfaces the last error to the process boundary.
    async fn run_pass_with_retry(&self) -> anyhow::Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.run_pass().await {
                Ok(stats) => {
                    tracing::info!(
                        evaluated = stats.evaluated,
                        alerts_sent = stats.alerts_sent,
                        removed = stats.removed,
                        failed = stats.failed,
                        "evaluation pass complete"
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.error_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        retries = self.error_retries,
                        "evaluation pass failed, retrying after backoff"
                    );
                    tokio::time::sleep(self.error_retries_timeout).await;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context("evaluation pass failed after exhausting retries"));
                }
            }
        }
    }

    /// Iterate every stored request once. A cursor error is a pass-level
    /// failure; anything raised while handling a single request is caught
    /// here and never aborts the rest of the pass.
    async fn run_pass(&self) -> Result<PassStats, AppError> {
        let mut stats = PassStats::default();
        let mut requests = self.store.find_all();

        while let Some(item) = requests.next().await {
            let request = item?;

            match self.process_request(&request).await {
                Ok(outcome) => {
                    stats.evaluated += 1;
                    match outcome {
                        MonitorOutcome::Sent => stats.alerts_sent += 1,
                        o if o.is_terminal() => stats.removed += 1,
                        _ => {}
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        request_id = %request.id,
                        contract = %request.contract_address,
                        sponsor = %request.sponsor_address,
                        error = %e,
                        "error while processing monitor request"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Gather fresh data for one request, evaluate it, and apply the
    /// resulting store action.
    async fn process_request(&self, request: &MonitorRequest) -> Result<MonitorOutcome, AppError> {
        let contract: Address = request.contract_address.parse().map_err(|_| {
            AppError::Validation(format!(
                "stored contract address {:?} is not a valid address",
                request.contract_address
            ))
        })?;

        let props = self.chain.contract_properties(contract).await?;
        let props = ValidatedContractProperties::validate(props)?;
        let positions = self.chain.all_positions(contract).await?;

        let mut feed = self.feeds.feed_for(contract).await?;
        feed.refresh().await?;
        let quote = PriceQuote {
            value: feed.current_price(),
            decimals: feed.decimals(),
        };

        let outcome = evaluator::evaluate_request(
            request,
            &props,
            &positions,
            &quote,
            &self.messenger,
            self.dry_run,
        )
        .await?;

        match outcome {
            MonitorOutcome::Sent => {
                tracing::debug!(request_id = %request.id, "notification sent");
            }
            MonitorOutcome::NoNeed => {}
            MonitorOutcome::ErrorUnresolved => {
                tracing::debug!(request_id = %request.id, "position unresolved, request retained");
            }
            // Already logged at the dispatch site.
            MonitorOutcome::ErrorSend => {}
            terminal => match self.store.delete(request).await? {
                DeleteOutcome::Deleted => {
                    tracing::info!(
                        request_id = %request.id,
                        outcome = %terminal,
                        "terminal outcome, monitor request removed"
                    );
                }
                DeleteOutcome::NotFound => {
                    tracing::debug!(
                        request_id = %request.id,
                        "monitor request already removed"
                    );
                }
            },
        }

        Ok(outcome)
    }
}
