//! Error types for the feed registry

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors reported by a payment gateway while querying or settling
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Signature does not cover the transfer tuple
    #[error("Invalid authorization signature")]
    InvalidSignature,

    /// Authorization window has not opened yet
    #[error("Authorization not yet valid (valid after {valid_after}, now {now})")]
    AuthorizationNotYetValid { valid_after: i64, now: i64 },

    /// Authorization window has closed
    #[error("Authorization expired (valid before {valid_before}, now {now})")]
    AuthorizationExpired { valid_before: i64, now: i64 },

    /// Nonce was already consumed by an earlier settlement
    #[error("Authorization nonce already used")]
    NonceAlreadyUsed,

    /// Payer cannot cover the transfer
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Authorization was signed for another token
    #[error("Token mismatch: expected {expected}, got {actual}")]
    TokenMismatch { expected: Pubkey, actual: Pubkey },

    /// Network request failed
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Invalid response from the gateway
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Gateway refused the settlement for a reason it did not classify
    #[error("Settlement rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Coarse classification of a [`FeedError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input (zero identity, bad payload, bad config)
    Validation,
    /// Caller does not hold the required role
    Authorization,
    /// Operation not allowed in the current state
    State,
    /// Balance or authorization failure
    Payment,
    /// Stored data older than the freshness window
    Staleness,
}

/// Errors returned by registry and instance operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Zero address provided")]
    ZeroAddressProvided,

    #[error("Provider must be a wallet account")]
    ProviderShouldBeWallet,

    #[error("Registry must be a program address")]
    RegistryShouldBeProgram,

    #[error("Data must not be empty")]
    EmptyData,

    #[error("Data size {provided} exceeds limit of {max} bytes")]
    DataSizeExceedsLimit { provided: usize, max: usize },

    #[error("Factory share percent {0} exceeds 100")]
    InvalidSharePercent(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("History index {index} out of range (capacity {capacity})")]
    HistoryIndexOutOfRange { index: usize, capacity: usize },

    #[error("Only the provider can call this")]
    OnlyProviderCanCall,

    #[error("Only the registry can call this")]
    OnlyRegistryCanCall,

    #[error("Only the administrator can call this")]
    OnlyAdministratorCanCall,

    #[error("Instance {0} does not exist")]
    InstanceDoesNotExist(Pubkey),

    #[error("Instance status unchanged")]
    NoStatusChange,

    #[error("Instance is not active")]
    InstanceNotActive,

    #[error("No data available")]
    NoDataAvailable,

    #[error("Operation already in progress")]
    ReentrantCall,

    #[error("Insufficient payment: required {required}, available {available}")]
    InsufficientPayment { required: u64, available: u64 },

    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error(
        "Data not updated recently (last update {last_update_timestamp}, window {recommended_freshness_window}s)"
    )]
    DataNotUpdatedRecently {
        last_update_timestamp: i64,
        recommended_freshness_window: u64,
    },
}

impl FeedError {
    /// Creates a DataSizeExceedsLimit error
    pub fn data_too_large(provided: usize, max: usize) -> Self {
        Self::DataSizeExceedsLimit { provided, max }
    }

    /// Creates an InsufficientPayment error
    pub fn insufficient_payment(required: u64, available: u64) -> Self {
        Self::InsufficientPayment {
            required,
            available,
        }
    }

    /// Creates an InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns the category this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            FeedError::ZeroAddressProvided
            | FeedError::ProviderShouldBeWallet
            | FeedError::RegistryShouldBeProgram
            | FeedError::EmptyData
            | FeedError::DataSizeExceedsLimit { .. }
            | FeedError::InvalidSharePercent(_)
            | FeedError::InvalidConfig(_)
            | FeedError::HistoryIndexOutOfRange { .. } => ErrorCategory::Validation,
            FeedError::OnlyProviderCanCall
            | FeedError::OnlyRegistryCanCall
            | FeedError::OnlyAdministratorCanCall => ErrorCategory::Authorization,
            FeedError::InstanceDoesNotExist(_)
            | FeedError::NoStatusChange
            | FeedError::InstanceNotActive
            | FeedError::NoDataAvailable
            | FeedError::ReentrantCall => ErrorCategory::State,
            FeedError::InsufficientPayment { .. } | FeedError::Payment(_) => {
                ErrorCategory::Payment
            }
            FeedError::DataNotUpdatedRecently { .. } => ErrorCategory::Staleness,
        }
    }
}
