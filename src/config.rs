//! Registry configuration

use crate::{
    constants::{
        DEFAULT_DEPLOY_PRICE, DEFAULT_FACTORY_SHARE_PERCENT, DEPLOY_PRICE_ENV,
        FACTORY_SHARE_PERCENT_ENV, MAX_FACTORY_SHARE_PERCENT,
    },
    error::FeedError,
};
use serde::{Deserialize, Serialize};

/// Administrator-controlled pricing configuration
///
/// The payment token reference lives next to this struct in the registry as
/// the active `PaymentGateway`; both are replaced together by `update_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Price of deploying an instance (smallest currency unit)
    pub deploy_price: u64,

    /// Percentage of each data update price kept by the registry
    pub factory_share_percent: u8,
}

impl RegistryConfig {
    /// Creates a validated configuration
    pub fn new(deploy_price: u64, factory_share_percent: u8) -> Result<Self, FeedError> {
        let config = Self {
            deploy_price,
            factory_share_percent,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from the environment
    ///
    /// Reads `FEED_REGISTRY_DEPLOY_PRICE` and
    /// `FEED_REGISTRY_FACTORY_SHARE_PERCENT`; unset variables fall back to
    /// the defaults.
    pub fn from_env() -> Result<Self, FeedError> {
        let deploy_price = parse_env(DEPLOY_PRICE_ENV, DEFAULT_DEPLOY_PRICE)?;
        let factory_share_percent =
            parse_env(FACTORY_SHARE_PERCENT_ENV, DEFAULT_FACTORY_SHARE_PERCENT)?;

        Self::new(deploy_price, factory_share_percent)
    }

    /// Checks the share percentage bound
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.factory_share_percent > MAX_FACTORY_SHARE_PERCENT {
            return Err(FeedError::InvalidSharePercent(self.factory_share_percent));
        }
        Ok(())
    }

    /// Amount forwarded to the provider for a data update priced at `price`
    pub fn provider_amount(&self, price: u64) -> u64 {
        let share = price as u128 * self.factory_share_percent as u128 / 100;
        price - share as u64
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            deploy_price: DEFAULT_DEPLOY_PRICE,
            factory_share_percent: DEFAULT_FACTORY_SHARE_PERCENT,
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, FeedError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| FeedError::invalid_config(format!("{}={}: {}", key, raw, e))),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(FeedError::invalid_config(format!("{}: {}", key, e))),
    }
}
