use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored watch: a chat recipient tracking one sponsor's position on
/// one contract against a CR threshold.
///
/// The threshold is stored as decimal text (e.g. "1.5" meaning 150%) so the
/// engine can parse it into the canonical fixed-point scale without ever
/// routing the value through a float.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonitorRequest {
    pub id: Uuid,
    /// Opaque recipient handle understood by the messenger (Telegram chat id).
    pub chat_target: String,
    pub contract_address: String,
    pub sponsor_address: String,
    pub cr_threshold: String,
    pub created_at: DateTime<Utc>,
}

/// Per-sponsor facts read from the contract at evaluation time.
/// Amounts are integers at the contract's native decimal precision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub sponsor: Address,
    pub collateral_amount: U256,
    pub withdrawal_request_amount: U256,
    pub tokens_outstanding: U256,
}

/// All positions of a contract plus contract-level values fetched alongside.
#[derive(Debug, Clone, Default)]
pub struct PositionSet {
    pub positions: Vec<PositionSnapshot>,
    /// Canonical-scaled; included in alert text only.
    pub funding_rate_multiplier: U256,
}

impl PositionSet {
    /// Exact-address lookup against the snapshot set. `Address` equality is
    /// byte equality, so hex-case differences in stored strings cannot cause
    /// false negatives once both sides are parsed.
    pub fn find(&self, sponsor: Address) -> Option<&PositionSnapshot> {
        self.positions.iter().find(|p| p.sponsor == sponsor)
    }
}

/// Current price of the price identifier at the feed's native precision.
/// `None` (or zero) means the feed has no opinion.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub value: Option<U256>,
    pub decimals: u8,
}

/// Per-contract constants needed for correct scaling and display.
/// Immutable for the lifetime of one evaluation; re-fetched every cycle.
#[derive(Debug, Clone)]
pub struct ContractProperties {
    pub contract_name: String,
    pub collateral_decimals: u8,
    pub synthetic_decimals: u8,
    pub price_feed_decimals: u8,
    /// Contract-level minimum CR, canonical-scaled.
    pub collateral_requirement: U256,
    pub price_identifier: String,
    pub network_id: u64,
}

/// Result of evaluating one monitor request for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// CR below threshold and the alert was dispatched (or dry run).
    Sent,
    /// CR at or above threshold; nothing to do.
    NoNeed,
    /// Price feed returned no usable value. Terminal.
    ErrorPriceFeed,
    /// Sponsor has no position in the current snapshot set. Terminal.
    ErrorNoPosition,
    /// CR below threshold but dispatch failed; retained, next pass retries.
    ErrorSend,
    /// Collateral or token data not resolvable this cycle; retained.
    ErrorUnresolved,
    /// No synthetic tokens outstanding. Terminal.
    ErrorNoTokenOutstanding,
}

impl MonitorOutcome {
    /// Terminal outcomes retire the watch: the request is deleted from the
    /// store after a best-effort final notification.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitorOutcome::ErrorPriceFeed
                | MonitorOutcome::ErrorNoPosition
                | MonitorOutcome::ErrorNoTokenOutstanding
        )
    }
}

impl std::fmt::Display for MonitorOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorOutcome::Sent => write!(f, "sent"),
            MonitorOutcome::NoNeed => write!(f, "no_need"),
            MonitorOutcome::ErrorPriceFeed => write!(f, "error_price_feed"),
            MonitorOutcome::ErrorNoPosition => write!(f, "error_no_position"),
            MonitorOutcome::ErrorSend => write!(f, "error_send"),
            MonitorOutcome::ErrorUnresolved => write!(f, "error_unresolved"),
            MonitorOutcome::ErrorNoTokenOutstanding => write!(f, "error_no_token_outstanding"),
        }
    }
}
