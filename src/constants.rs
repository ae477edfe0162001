//! Constants for the feed registry
//!
//! Protocol limits and derivation seeds are compile-time constants. The only
//! runtime configuration is `RegistryConfig` (see `config.rs`).

use solana_sdk::pubkey::Pubkey;

/// Maximum payload size accepted by a data feed instance (in bytes)
pub const MAX_DATA_SIZE: usize = 5120;

/// Number of slots in an instance's history ring buffer
pub const HISTORY_CAPACITY: usize = 100;

/// Upper bound for the registry's share of data update fees
pub const MAX_FACTORY_SHARE_PERCENT: u8 = 100;

/// Default deploy price (smallest currency unit, 1.0 at 6 decimals)
pub const DEFAULT_DEPLOY_PRICE: u64 = 1_000_000;

/// Default registry share of data update fees
pub const DEFAULT_FACTORY_SHARE_PERCENT: u8 = 10;

/// Environment variable overriding the deploy price
pub const DEPLOY_PRICE_ENV: &str = "FEED_REGISTRY_DEPLOY_PRICE";

/// Environment variable overriding the factory share percentage
pub const FACTORY_SHARE_PERCENT_ENV: &str = "FEED_REGISTRY_FACTORY_SHARE_PERCENT";

/// Program id the registry and instance addresses are derived under
pub const FEED_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x0b, 0x7e, 0x4d, 0x91, 0x2c, 0x55, 0xa3, 0x18, 0xe6, 0x40, 0x9f, 0x73, 0x21, 0xc8, 0x5a, 0x0e,
    0x94, 0x3b, 0xd2, 0x6f, 0x17, 0x88, 0xfa, 0x05, 0x6c, 0xb1, 0x29, 0xe3, 0x4a, 0x90, 0x3d, 0x01,
]);

/// Seed prefix for registry addresses
pub const REGISTRY_SEED: &[u8] = b"feed-registry";

/// Seed prefix for instance addresses
pub const INSTANCE_SEED: &[u8] = b"feed-instance";

/// Domain tag mixed into every signed payment authorization
pub const PAYMENT_DOMAIN: &str = "feed-registry-payment-v1";

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// HTTP request timeout when talking to a facilitator (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Facilitator endpoint for balance queries
pub const FACILITATOR_BALANCE_ENDPOINT: &str = "/balance";

/// Facilitator endpoint for settlements
pub const FACILITATOR_SETTLE_ENDPOINT: &str = "/settle";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "feed-registry/0.1.0";
