//! # Feed Registry
//!
//! A registry of payment-gated, append-only data feeds. Providers pay to
//! deploy a feed instance; the registry administrator pays the provider for
//! every data write, keeping a configurable share. Each instance retains its
//! last 100 writes in a ring buffer and refuses checked reads once its data
//! is older than the provider's freshness window.
//!
//! ## Architecture
//!
//! ```text
//! caller (explicit identity)
//!     ↓
//! Registry  ── transaction lock + reentrancy guard
//!     ↓
//! PaymentGateway (balance check, signed one-time settlement)
//!     ↓
//! DataFeedInstance (validated write into HistoryBuffer)
//!     ↓
//! FeedEvent broadcast
//! ```
//!
//! Payments use signed transfer authorizations: the payer signs the full
//! transfer tuple (token, parties, amount, validity window, nonce) with its
//! wallet key, and the gateway verifies and settles it exactly once.
//!
//! ## Error Handling
//!
//! ```no_run
//! use feed_registry::{ErrorCategory, FeedError, Registry};
//! use solana_sdk::pubkey::Pubkey;
//!
//! # async fn example(registry: &Registry, instance: Pubkey) {
//! let handle = match registry.instance(&instance).await {
//!     Ok(handle) => handle,
//!     Err(e) => return eprintln!("Error: {}", e),
//! };
//!
//! match handle.get_data().await {
//!     Ok(data) => println!("{} bytes", data.len()),
//!     Err(FeedError::DataNotUpdatedRecently { last_update_timestamp, .. }) => {
//!         println!("Stale since {}", last_update_timestamp)
//!     }
//!     Err(e) if e.category() == ErrorCategory::State => println!("Unavailable: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! # }
//! ```

pub mod address;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod gateways;
pub mod guard;
pub mod history;
pub mod instance;
pub mod metrics;
pub mod registry;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RegistryConfig;
pub use error::{ErrorCategory, FeedError, PaymentError};
pub use gateway::{PaymentGateway, Settlement, SignedAuthorization, TransferAuthorization};
pub use instance::{DataFeedInstance, InstanceHandle};
pub use metrics::SettlementStats;
pub use registry::Registry;
pub use store::RegistryStore;
pub use types::{
    DeployParams, FeedEvent, HistoryEntry, InstanceInfo, InstanceRecord, InstanceSnapshot, Page,
    Role,
};
