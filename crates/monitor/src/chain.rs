//! On-chain data access for synthetic-token contracts.
//!
//! View-call bindings for the financial contract (position data, scaling
//! constants) and its price oracle. Everything is re-fetched each cycle;
//! nothing here caches across passes.

use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol;

use sentinel_common::error::AppError;
use sentinel_common::types::{ContractProperties, PositionSet, PositionSnapshot};
use sentinel_engine::traits::{PositionDataSource, PriceFeed, PriceFeedSource};

sol! {
    #[sol(rpc)]
    interface ISyntheticContract {
        function name() external view returns (string);
        function priceIdentifier() external view returns (bytes32);
        function collateralDecimals() external view returns (uint8);
        function syntheticDecimals() external view returns (uint8);
        function collateralRequirement() external view returns (uint256);
        function cumulativeFundingRateMultiplier() external view returns (uint256);
        function priceFeed() external view returns (address);
        function getAllSponsors() external view returns (address[]);
        function positions(address sponsor) external view returns (
            uint256 collateralAmount,
            uint256 withdrawalRequestAmount,
            uint256 tokensOutstanding
        );
    }

    #[sol(rpc)]
    interface IPriceOracle {
        function latestAnswer() external view returns (int256);
        function decimals() external view returns (uint8);
    }
}

/// Read-only client for a JSON-RPC endpoint.
#[derive(Clone)]
pub struct ChainClient<P> {
    provider: P,
    network_id: u64,
}

/// Connect to the RPC endpoint and capture the network id.
pub async fn connect(rpc_url: &str) -> anyhow::Result<ChainClient<impl Provider + Clone>> {
    let provider = ProviderBuilder::new().connect_http(rpc_url.parse()?);
    let network_id = provider.get_chain_id().await?;

    tracing::info!(network_id, "Connected to JSON-RPC endpoint");
    Ok(ChainClient {
        provider,
        network_id,
    })
}

fn rpc_err(e: impl std::fmt::Display) -> AppError {
    AppError::Rpc(e.to_string())
}

/// A bytes32 price identifier is UTF-8 padded with trailing zero bytes.
fn decode_identifier(raw: B256) -> String {
    let bytes = raw.as_slice();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl<P: Provider + Clone> PositionDataSource for ChainClient<P> {
    async fn contract_properties(&self, contract: Address) -> Result<ContractProperties, AppError> {
        let synthetic = ISyntheticContract::new(contract, self.provider.clone());

        let contract_name = synthetic.name().call().await.map_err(rpc_err)?;
        let price_identifier =
            decode_identifier(synthetic.priceIdentifier().call().await.map_err(rpc_err)?);
        let collateral_decimals = synthetic.collateralDecimals().call().await.map_err(rpc_err)?;
        let synthetic_decimals = synthetic.syntheticDecimals().call().await.map_err(rpc_err)?;
        let collateral_requirement = synthetic
            .collateralRequirement()
            .call()
            .await
            .map_err(rpc_err)?;

        // All feeds behind the oracle interface report their own precision.
        let oracle_address = synthetic.priceFeed().call().await.map_err(rpc_err)?;
        let oracle = IPriceOracle::new(oracle_address, self.provider.clone());
        let price_feed_decimals = oracle.decimals().call().await.map_err(rpc_err)?;

        Ok(ContractProperties {
            contract_name,
            collateral_decimals,
            synthetic_decimals,
            price_feed_decimals,
            collateral_requirement,
            price_identifier,
            network_id: self.network_id,
        })
    }

    async fn all_positions(&self, contract: Address) -> Result<PositionSet, AppError> {
        let synthetic = ISyntheticContract::new(contract, self.provider.clone());

        let sponsors = synthetic.getAllSponsors().call().await.map_err(rpc_err)?;
        let mut positions = Vec::with_capacity(sponsors.len());
        for sponsor in sponsors {
            let position = synthetic.positions(sponsor).call().await.map_err(rpc_err)?;
            positions.push(PositionSnapshot {
                sponsor,
                collateral_amount: position.collateralAmount,
                withdrawal_request_amount: position.withdrawalRequestAmount,
                tokens_outstanding: position.tokensOutstanding,
            });
        }

        let funding_rate_multiplier = synthetic
            .cumulativeFundingRateMultiplier()
            .call()
            .await
            .map_err(rpc_err)?;

        Ok(PositionSet {
            positions,
            funding_rate_multiplier,
        })
    }
}

/// Oracle-backed price feed for one contract's price identifier.
pub struct OraclePriceFeed<P: Provider + Clone> {
    oracle: IPriceOracle::IPriceOracleInstance<P>,
    decimals: u8,
    latest: Option<U256>,
}

impl<P: Provider + Clone> PriceFeed for OraclePriceFeed<P> {
    async fn refresh(&mut self) -> Result<(), AppError> {
        let answer = self.oracle.latestAnswer().call().await.map_err(rpc_err)?;

        // A negative answer carries no usable opinion.
        self.latest = if answer.is_negative() {
            None
        } else {
            Some(answer.into_raw())
        };
        Ok(())
    }

    fn current_price(&self) -> Option<U256> {
        self.latest
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl<P: Provider + Clone> PriceFeedSource for ChainClient<P> {
    type Feed = OraclePriceFeed<P>;

    async fn feed_for(&self, contract: Address) -> Result<Self::Feed, AppError> {
        let synthetic = ISyntheticContract::new(contract, self.provider.clone());
        let oracle_address = synthetic.priceFeed().call().await.map_err(rpc_err)?;

        let oracle = IPriceOracle::new(oracle_address, self.provider.clone());
        let decimals = oracle.decimals().call().await.map_err(rpc_err)?;

        Ok(OraclePriceFeed {
            oracle,
            decimals,
            latest: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_identifier_strips_padding() {
        let mut raw = [0u8; 32];
        raw[..7].copy_from_slice(b"ETH/USD");
        assert_eq!(decode_identifier(B256::from(raw)), "ETH/USD");
    }

    #[test]
    fn test_decode_identifier_full_width() {
        let raw = [b'A'; 32];
        assert_eq!(decode_identifier(B256::from(raw)), "A".repeat(32));
    }
}
