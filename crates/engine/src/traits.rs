//! Collaborator contracts consumed by the engine and the batch runner.
//!
//! The core never owns persistence, chain access, or transport; it talks to
//! them through these narrow traits so the runner can be exercised against
//! in-memory stubs.

use alloy::primitives::{Address, U256};
use futures::stream::BoxStream;

use sentinel_common::error::AppError;
use sentinel_common::types::{ContractProperties, MonitorRequest, PositionSet};

/// Result of deleting a request. Deletes are idempotent: removing a record
/// that is already absent is `NotFound`, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Persistent store of monitor requests.
pub trait RequestStore {
    /// Lazy cursor over every stored request. The store may time out
    /// mid-iteration on large result sets; a stream item error is a
    /// pass-level failure, not a per-request one.
    fn find_all(&self) -> BoxStream<'_, Result<MonitorRequest, AppError>>;

    fn delete(
        &self,
        request: &MonitorRequest,
    ) -> impl Future<Output = Result<DeleteOutcome, AppError>> + Send;
}

/// Supplies per-contract constants and the current position snapshot set.
pub trait PositionDataSource {
    fn contract_properties(
        &self,
        contract: Address,
    ) -> impl Future<Output = Result<ContractProperties, AppError>> + Send;

    fn all_positions(
        &self,
        contract: Address,
    ) -> impl Future<Output = Result<PositionSet, AppError>> + Send;
}

/// A price feed for one contract's price identifier.
pub trait PriceFeed {
    fn refresh(&mut self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Latest refreshed price at the feed's native precision, or `None`
    /// when the feed has no opinion.
    fn current_price(&self) -> Option<U256>;

    fn decimals(&self) -> u8;
}

/// Constructs a price feed for a given contract. Feeds are rebuilt every
/// cycle so staleness is bounded to one pass.
pub trait PriceFeedSource {
    type Feed: PriceFeed + Send;

    fn feed_for(
        &self,
        contract: Address,
    ) -> impl Future<Output = Result<Self::Feed, AppError>> + Send;
}

/// Outbound message transport. Formatting beyond plain text is the
/// transport's concern.
pub trait Messenger {
    fn send(
        &self,
        target: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
