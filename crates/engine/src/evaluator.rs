//! Per-request evaluation: one monitor request plus freshly fetched
//! position and price data in, one [`MonitorOutcome`] out.
//!
//! The decision logic itself is stateless; the only side effects are the
//! alert dispatch and the best-effort final notices on terminal outcomes.

use alloy::primitives::{Address, U256};

use sentinel_common::error::AppError;
use sentinel_common::types::{
    ContractProperties, MonitorOutcome, MonitorRequest, PositionSet, PriceQuote,
};

use crate::cr_calculator::{self, Cr};
use crate::fixed_point::{self, MAX_DECIMALS};
use crate::traits::Messenger;

/// Fractional digits used when rendering canonical-scaled values.
const FORMAT_MIN_DECIMALS: usize = 2;
const FORMAT_MAX_DECIMALS: usize = 4;

/// Contract properties that passed structural validation.
///
/// Validation is a separate, explicit step so the evaluator itself is a
/// plain function over known-good inputs.
#[derive(Debug, Clone)]
pub struct ValidatedContractProperties(ContractProperties);

impl ValidatedContractProperties {
    pub fn validate(props: ContractProperties) -> Result<Self, AppError> {
        for (label, decimals) in [
            ("collateral_decimals", props.collateral_decimals),
            ("synthetic_decimals", props.synthetic_decimals),
            ("price_feed_decimals", props.price_feed_decimals),
        ] {
            if decimals > MAX_DECIMALS {
                return Err(AppError::Validation(format!(
                    "{label} = {decimals} exceeds supported maximum of {MAX_DECIMALS}"
                )));
            }
        }
        if props.price_identifier.is_empty() {
            return Err(AppError::Validation(
                "contract reports an empty price identifier".to_string(),
            ));
        }
        if props.collateral_requirement.is_zero() {
            return Err(AppError::Validation(
                "contract reports a zero collateral requirement".to_string(),
            ));
        }
        Ok(Self(props))
    }

    pub fn inner(&self) -> &ContractProperties {
        &self.0
    }
}

/// Semantic content of a liquidation-risk alert. Values are pre-formatted
/// decimal strings; transport-level markup is the messenger's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPayload {
    pub contract_name: String,
    pub sponsor: Address,
    pub price_identifier: String,
    pub cr_pct: String,
    pub threshold_pct: String,
    pub price: String,
    pub collateral_requirement_pct: String,
    pub liquidation_price: String,
    pub funding_rate_multiplier: String,
}

impl AlertPayload {
    pub fn render(&self) -> String {
        format!(
            "Liquidation risk alert!\n\
             Position of sponsor {sponsor} on {name} has dropped to {cr}% \
             collateralization, below your {threshold}% alert threshold.\n\n\
             {identifier} price: {price}\n\
             Collateral requirement: {requirement}%\n\
             Liquidation price: {liquidation}\n\
             Cumulative funding rate multiplier: {funding}",
            sponsor = self.sponsor,
            name = self.contract_name,
            cr = self.cr_pct,
            threshold = self.threshold_pct,
            identifier = self.price_identifier,
            price = self.price,
            requirement = self.collateral_requirement_pct,
            liquidation = self.liquidation_price,
            funding = self.funding_rate_multiplier,
        )
    }
}

/// Evaluate one monitor request against the current cycle's data.
///
/// Returns the outcome the runner maps onto store actions. `Err` is
/// reserved for conditions the evaluator cannot classify (malformed stored
/// request); the runner's per-request failure boundary catches those.
pub async fn evaluate_request<M: Messenger>(
    request: &MonitorRequest,
    props: &ValidatedContractProperties,
    positions: &PositionSet,
    quote: &PriceQuote,
    messenger: &M,
    dry_run: bool,
) -> Result<MonitorOutcome, AppError> {
    let props = props.inner();

    let threshold = fixed_point::parse_canonical(&request.cr_threshold).map_err(|e| {
        AppError::Validation(format!(
            "stored CR threshold {:?} is not a decimal: {e}",
            request.cr_threshold
        ))
    })?;

    // A price of exactly zero carries no more information than an absent one.
    let Some(raw_price) = quote.value.filter(|p| !p.is_zero()) else {
        tracing::warn!(
            request_id = %request.id,
            contract = %request.contract_address,
            "price feed returned no usable value; retiring request"
        );
        notify_best_effort(
            messenger,
            request,
            "The price feed for your monitored contract is not returning a usable price.",
        )
        .await;
        return Ok(MonitorOutcome::ErrorPriceFeed);
    };

    let sponsor: Address = request.sponsor_address.parse().map_err(|_| {
        AppError::Validation(format!(
            "stored sponsor address {:?} is not a valid address",
            request.sponsor_address
        ))
    })?;

    let Some(position) = positions.find(sponsor) else {
        notify_best_effort(
            messenger,
            request,
            "No active position found for the given sponsor address.",
        )
        .await;
        return Ok(MonitorOutcome::ErrorNoPosition);
    };

    let Some(raw_backing) = cr_calculator::backing_collateral(
        position.collateral_amount,
        position.withdrawal_request_amount,
    ) else {
        tracing::warn!(
            request_id = %request.id,
            sponsor = %sponsor,
            "withdrawal request exceeds posted collateral; snapshot inconsistent, retrying next cycle"
        );
        return Ok(MonitorOutcome::ErrorUnresolved);
    };

    let normalized = (|| {
        Ok::<_, fixed_point::FixedPointError>((
            fixed_point::to_canonical(raw_backing, props.collateral_decimals)?,
            fixed_point::to_canonical(position.tokens_outstanding, props.synthetic_decimals)?,
            fixed_point::to_canonical(raw_price, props.price_feed_decimals)?,
        ))
    })();
    let (backing, tokens, price) = match normalized {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(
                request_id = %request.id,
                sponsor = %sponsor,
                error = %e,
                "could not normalize position data; retrying next cycle"
            );
            return Ok(MonitorOutcome::ErrorUnresolved);
        }
    };

    let cr = match cr_calculator::collateralization_ratio(backing, tokens, price) {
        Ok(Cr::Undefined) => {
            notify_best_effort(
                messenger,
                request,
                "No synthetic tokens outstanding for the given sponsor address.",
            )
            .await;
            return Ok(MonitorOutcome::ErrorNoTokenOutstanding);
        }
        Ok(Cr::Ratio(cr)) => cr,
        Err(e) => {
            tracing::warn!(
                request_id = %request.id,
                sponsor = %sponsor,
                error = %e,
                "collateralization ratio not computable; retrying next cycle"
            );
            return Ok(MonitorOutcome::ErrorUnresolved);
        }
    };

    if !cr_calculator::is_below_threshold(cr, threshold) {
        return Ok(MonitorOutcome::NoNeed);
    }

    let liquidation_price =
        match cr_calculator::liquidation_price(backing, tokens, props.collateral_requirement) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    request_id = %request.id,
                    sponsor = %sponsor,
                    error = %e,
                    "liquidation price not computable; retrying next cycle"
                );
                return Ok(MonitorOutcome::ErrorUnresolved);
            }
        };

    let payload = AlertPayload {
        contract_name: props.contract_name.clone(),
        sponsor,
        price_identifier: props.price_identifier.clone(),
        cr_pct: format_pct(cr),
        threshold_pct: format_pct(threshold),
        price: format_value(price),
        collateral_requirement_pct: format_pct(props.collateral_requirement),
        // Already at the implicit precision of raw price inputs; displayed
        // without price-feed renormalization.
        liquidation_price: format_value(liquidation_price),
        funding_rate_multiplier: format_value(positions.funding_rate_multiplier),
    };

    if dry_run {
        tracing::info!(
            request_id = %request.id,
            sponsor = %sponsor,
            cr_pct = %payload.cr_pct,
            "dry run: alert suppressed"
        );
        return Ok(MonitorOutcome::Sent);
    }

    match messenger.send(&request.chat_target, &payload.render()).await {
        Ok(()) => Ok(MonitorOutcome::Sent),
        Err(e) => {
            tracing::warn!(
                request_id = %request.id,
                sponsor = %sponsor,
                error = %e,
                "alert dispatch failed; request retained for next pass"
            );
            Ok(MonitorOutcome::ErrorSend)
        }
    }
}

/// Human-readable identity of a request, appended to terminal notices.
fn request_summary(request: &MonitorRequest) -> String {
    format!(
        "Contract: {}\nSponsor: {}\nCR alert threshold: {}",
        request.contract_address, request.sponsor_address, request.cr_threshold
    )
}

/// Final notice before a terminal removal. Failure to deliver never blocks
/// the removal.
async fn notify_best_effort<M: Messenger>(messenger: &M, request: &MonitorRequest, reason: &str) {
    let text = format!(
        "{reason}\n\n{}\n\nRemoving this monitor request.",
        request_summary(request)
    );
    if let Err(e) = messenger.send(&request.chat_target, &text).await {
        tracing::warn!(
            request_id = %request.id,
            error = %e,
            "could not deliver final notice for retired request"
        );
    }
}

/// Canonical-scaled ratio rendered as a percentage string.
fn format_pct(value: U256) -> String {
    let scaled = value.saturating_mul(U256::from(100u8));
    fixed_point::format_canonical(scaled, FORMAT_MIN_DECIMALS, FORMAT_MAX_DECIMALS)
}

fn format_value(value: U256) -> String {
    fixed_point::format_canonical(value, FORMAT_MIN_DECIMALS, FORMAT_MAX_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Utc;
    use sentinel_common::types::PositionSnapshot;

    use crate::fixed_point::{one, pow10};

    /// Records every send; optionally fails all of them.
    struct StubMessenger {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl StubMessenger {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Messenger for StubMessenger {
        async fn send(&self, target: &str, text: &str) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::Delivery("stub transport down".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((target.to_string(), text.to_string()));
            Ok(())
        }
    }

    const SPONSOR: &str = "0x4a29e88cEA7e1505DB9b6491C749Fb5d6d595265";
    const CONTRACT: &str = "0x516f595978D87B67401DaB7AfD8555c3d28a3Af4";

    fn request(threshold: &str) -> MonitorRequest {
        MonitorRequest {
            id: uuid::Uuid::new_v4(),
            chat_target: "424242".to_string(),
            contract_address: CONTRACT.to_string(),
            sponsor_address: SPONSOR.to_string(),
            cr_threshold: threshold.to_string(),
            created_at: Utc::now(),
        }
    }

    fn props() -> ValidatedContractProperties {
        ValidatedContractProperties::validate(ContractProperties {
            contract_name: "uUSD Synthetic".to_string(),
            collateral_decimals: 18,
            synthetic_decimals: 18,
            price_feed_decimals: 18,
            collateral_requirement: U256::from(12u8) * pow10(17), // 1.2 = 120%
            price_identifier: "ETH/USD".to_string(),
            network_id: 1,
        })
        .unwrap()
    }

    fn positions(collateral: U256, withdrawal: U256, tokens: U256) -> PositionSet {
        PositionSet {
            positions: vec![PositionSnapshot {
                sponsor: SPONSOR.parse().unwrap(),
                collateral_amount: collateral,
                withdrawal_request_amount: withdrawal,
                tokens_outstanding: tokens,
            }],
            funding_rate_multiplier: one(),
        }
    }

    fn quote(value: Option<U256>) -> PriceQuote {
        PriceQuote {
            value,
            decimals: 18,
        }
    }

    fn reference_positions() -> PositionSet {
        // collateral 150, tokens 100, no withdrawal => CR 1.5 at price 1.0
        positions(U256::from(150u8) * one(), U256::ZERO, U256::from(100u8) * one())
    }

    #[tokio::test]
    async fn test_cr_above_threshold_is_no_need() {
        let messenger = StubMessenger::new();
        let outcome = evaluate_request(
            &request("1.0"),
            &props(),
            &reference_positions(),
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::NoNeed);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cr_below_threshold_sends_alert() {
        let messenger = StubMessenger::new();
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &reference_positions(),
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::Sent);
        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "424242");

        let text = &sent[0].1;
        assert!(text.contains("uUSD Synthetic"));
        assert!(text.contains("150.00%"), "CR as percentage: {text}");
        assert!(text.contains("200.00%"), "threshold as percentage: {text}");
        assert!(text.contains("ETH/USD price: 1.00"), "spot price: {text}");
        assert!(text.contains("Collateral requirement: 120.00%"), "{text}");
        // 150 / (100 * 1.2) = 1.25
        assert!(text.contains("Liquidation price: 1.25"), "{text}");
        assert!(
            text.contains("Cumulative funding rate multiplier: 1.00"),
            "{text}"
        );
    }

    #[tokio::test]
    async fn test_cr_exactly_at_threshold_does_not_alert() {
        let messenger = StubMessenger::new();
        let outcome = evaluate_request(
            &request("1.5"),
            &props(),
            &reference_positions(),
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::NoNeed);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_error_send() {
        let messenger = StubMessenger::failing();
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &reference_positions(),
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::ErrorSend);
    }

    #[tokio::test]
    async fn test_dry_run_skips_dispatch_but_reports_sent() {
        // A failing transport proves no send was attempted.
        let messenger = StubMessenger::failing();
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &reference_positions(),
            &quote(Some(one())),
            &messenger,
            true,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::Sent);
    }

    #[tokio::test]
    async fn test_absent_price_is_terminal_with_notice() {
        let messenger = StubMessenger::new();
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &reference_positions(),
            &quote(None),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::ErrorPriceFeed);
        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Removing this monitor request"));
    }

    #[tokio::test]
    async fn test_zero_price_is_treated_as_absent() {
        let messenger = StubMessenger::new();
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &reference_positions(),
            &quote(Some(U256::ZERO)),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::ErrorPriceFeed);
    }

    #[tokio::test]
    async fn test_missing_position_is_terminal_with_notice() {
        let messenger = StubMessenger::new();
        let empty = PositionSet::default();
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &empty,
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::ErrorNoPosition);
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_withdrawal_is_unresolved_and_silent() {
        let messenger = StubMessenger::new();
        let set = positions(
            U256::from(10u8) * one(),
            U256::from(11u8) * one(),
            U256::from(100u8) * one(),
        );
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &set,
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::ErrorUnresolved);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_zero_tokens_outstanding_is_terminal_with_notice() {
        let messenger = StubMessenger::new();
        let set = positions(U256::from(150u8) * one(), U256::ZERO, U256::ZERO);
        let outcome = evaluate_request(
            &request("2.0"),
            &props(),
            &set,
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::ErrorNoTokenOutstanding);
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_collateral_always_alerts_for_positive_threshold() {
        // CR of a zero-collateral position is exactly 0, which is below any
        // positive threshold. Deliberate: zero collateral is maximally risky.
        let messenger = StubMessenger::new();
        let set = positions(U256::ZERO, U256::ZERO, U256::from(100u8) * one());
        let outcome = evaluate_request(
            &request("0.01"),
            &props(),
            &set,
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, MonitorOutcome::Sent);
        assert!(messenger.sent()[0].1.contains("0.00%"));
    }

    #[tokio::test]
    async fn test_mixed_native_decimals_normalize_before_comparison() {
        // 8-decimal collateral (150 BTC-style units) against 18-decimal
        // synthetic tokens and a 8-decimal feed still yields CR 1.5.
        let mut props = props().inner().clone();
        props.collateral_decimals = 8;
        props.price_feed_decimals = 8;
        let props = ValidatedContractProperties::validate(props).unwrap();

        let set = positions(
            U256::from(150u8) * pow10(8),
            U256::ZERO,
            U256::from(100u8) * one(),
        );
        let messenger = StubMessenger::new();
        let outcome = evaluate_request(
            &request("1.5"),
            &props,
            &set,
            &quote(Some(pow10(8))),
            &messenger,
            false,
        )
        .await
        .unwrap();

        // Exactly 1.5 against a 1.5 threshold: strict comparison, no alert.
        assert_eq!(outcome, MonitorOutcome::NoNeed);
    }

    #[tokio::test]
    async fn test_malformed_threshold_is_an_evaluator_error() {
        let messenger = StubMessenger::new();
        let result = evaluate_request(
            &request("not-a-number"),
            &props(),
            &reference_positions(),
            &quote(Some(one())),
            &messenger,
            false,
        )
        .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_decimals() {
        let mut bad = props().inner().clone();
        bad.collateral_decimals = 40;
        assert!(ValidatedContractProperties::validate(bad).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_collateral_requirement() {
        let mut bad = props().inner().clone();
        bad.collateral_requirement = U256::ZERO;
        assert!(ValidatedContractProperties::validate(bad).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_identifier() {
        let mut bad = props().inner().clone();
        bad.price_identifier = String::new();
        assert!(ValidatedContractProperties::validate(bad).is_err());
    }
}
