//! Types for the feed registry

use crate::error::FeedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

/// Roles a caller can hold against a registry or instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owner of the registry: toggles status, sets prices and config
    Administrator,
    /// Owner of a single instance: tunes its freshness window
    Provider,
    /// The registry acting on one of its instances
    Registry,
}

impl Role {
    /// Checks that `caller` is the identity currently holding this role
    pub fn ensure(&self, caller: &Pubkey, holder: &Pubkey) -> Result<(), FeedError> {
        if caller == holder {
            Ok(())
        } else {
            Err(self.denied())
        }
    }

    /// Error reported when a caller lacks this role
    pub fn denied(&self) -> FeedError {
        match self {
            Role::Administrator => FeedError::OnlyAdministratorCanCall,
            Role::Provider => FeedError::OnlyProviderCanCall,
            Role::Registry => FeedError::OnlyRegistryCanCall,
        }
    }
}

/// Registry-side bookkeeping for a deployed instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Instance address
    pub instance: Pubkey,
    /// Provider that deployed the instance
    pub provider: Pubkey,
    /// Deployment timestamp (unix seconds)
    pub created_at: i64,
    /// Whether the instance currently accepts writes and reads
    pub is_active: bool,
}

/// Public view of an instance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub provider: Pubkey,
    pub created_at: i64,
    pub is_active: bool,
}

impl From<&InstanceRecord> for InstanceInfo {
    fn from(record: &InstanceRecord) -> Self {
        Self {
            provider: record.provider,
            created_at: record.created_at,
            is_active: record.is_active,
        }
    }
}

/// A single write retained in an instance's history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub data: Vec<u8>,
    pub timestamp: i64,
}

/// One page of instance addresses plus the size of the full listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Pubkey>,
    pub total: usize,
}

impl Page {
    /// Slices `all` starting at `offset`, at most `limit` entries
    ///
    /// An offset at or past the end yields an empty page, never an error.
    pub fn from_slice(all: &[Pubkey], offset: usize, limit: usize) -> Self {
        let total = all.len();
        if offset >= total {
            return Self {
                items: Vec::new(),
                total,
            };
        }

        let end = offset.saturating_add(limit).min(total);
        Self {
            items: all[offset..end].to_vec(),
            total,
        }
    }
}

/// Parameters supplied by a provider when deploying an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployParams {
    /// Maximum data age (seconds) accepted by the checked read path
    pub freshness_window: u64,
    /// Price the administrator pays per data update
    pub data_update_price: u64,
    /// First payload, validated like any later write
    pub initial_data: Vec<u8>,
}

/// Point-in-time view of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub address: Pubkey,
    pub provider: Pubkey,
    pub registry: Pubkey,
    pub is_active: bool,
    pub data_update_price: u64,
    pub last_update_timestamp: i64,
    pub recommended_freshness_window: u64,
    pub current_data: Vec<u8>,
    pub history_count: usize,
    pub total_writes: u64,
}

/// Events emitted by the registry and its instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedEvent {
    /// A provider deployed a new instance
    InstanceDeployed {
        id: Uuid,
        instance: Pubkey,
        provider: Pubkey,
        timestamp: i64,
    },

    /// The administrator toggled an instance
    InstanceStatusChanged {
        id: Uuid,
        instance: Pubkey,
        provider: Pubkey,
        new_status: bool,
        timestamp: i64,
    },

    /// An instance accepted a new payload
    DataUpdated {
        id: Uuid,
        instance: Pubkey,
        data: Vec<u8>,
        timestamp: i64,
    },

    /// The administrator repriced data updates for an instance
    InstancePriceUpdated {
        id: Uuid,
        instance: Pubkey,
        price: u64,
        timestamp: i64,
    },

    /// Registry pricing or gateway replaced
    ConfigUpdated {
        id: Uuid,
        deploy_price: u64,
        factory_share_percent: u8,
        payment_token: Pubkey,
        timestamp: i64,
    },

    /// Registry administration handed over
    OwnershipTransferred {
        id: Uuid,
        previous_administrator: Pubkey,
        new_administrator: Pubkey,
        timestamp: i64,
    },
}

impl FeedEvent {
    pub fn instance_deployed(instance: Pubkey, provider: Pubkey, timestamp: i64) -> Self {
        Self::InstanceDeployed {
            id: Uuid::new_v4(),
            instance,
            provider,
            timestamp,
        }
    }

    pub fn instance_status_changed(
        instance: Pubkey,
        provider: Pubkey,
        new_status: bool,
        timestamp: i64,
    ) -> Self {
        Self::InstanceStatusChanged {
            id: Uuid::new_v4(),
            instance,
            provider,
            new_status,
            timestamp,
        }
    }

    pub fn data_updated(instance: Pubkey, data: Vec<u8>, timestamp: i64) -> Self {
        Self::DataUpdated {
            id: Uuid::new_v4(),
            instance,
            data,
            timestamp,
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            FeedEvent::InstanceDeployed { id, .. } => *id,
            FeedEvent::InstanceStatusChanged { id, .. } => *id,
            FeedEvent::DataUpdated { id, .. } => *id,
            FeedEvent::InstancePriceUpdated { id, .. } => *id,
            FeedEvent::ConfigUpdated { id, .. } => *id,
            FeedEvent::OwnershipTransferred { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            FeedEvent::InstanceDeployed { .. } => "INSTANCE_DEPLOYED",
            FeedEvent::InstanceStatusChanged { .. } => "INSTANCE_STATUS_CHANGED",
            FeedEvent::DataUpdated { .. } => "DATA_UPDATED",
            FeedEvent::InstancePriceUpdated { .. } => "INSTANCE_PRICE_UPDATED",
            FeedEvent::ConfigUpdated { .. } => "CONFIG_UPDATED",
            FeedEvent::OwnershipTransferred { .. } => "OWNERSHIP_TRANSFERRED",
        }
    }

    /// Unix timestamp the event was emitted at
    pub fn timestamp(&self) -> i64 {
        match self {
            FeedEvent::InstanceDeployed { timestamp, .. }
            | FeedEvent::InstanceStatusChanged { timestamp, .. }
            | FeedEvent::DataUpdated { timestamp, .. }
            | FeedEvent::InstancePriceUpdated { timestamp, .. }
            | FeedEvent::ConfigUpdated { timestamp, .. }
            | FeedEvent::OwnershipTransferred { timestamp, .. } => *timestamp,
        }
    }

    /// Event time as a UTC datetime, if representable
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp(), 0)
    }
}

impl std::fmt::Display for FeedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedEvent::InstanceDeployed {
                instance, provider, ..
            } => write!(f, "Instance {} deployed by {}", instance, provider),
            FeedEvent::InstanceStatusChanged {
                instance,
                new_status,
                ..
            } => write!(f, "Instance {} active: {}", instance, new_status),
            FeedEvent::DataUpdated { instance, data, .. } => {
                write!(f, "Instance {} updated ({} bytes)", instance, data.len())
            }
            FeedEvent::InstancePriceUpdated {
                instance, price, ..
            } => write!(f, "Instance {} update price: {}", instance, price),
            FeedEvent::ConfigUpdated {
                deploy_price,
                factory_share_percent,
                ..
            } => write!(
                f,
                "Config updated: deploy price {}, factory share {}%",
                deploy_price, factory_share_percent
            ),
            FeedEvent::OwnershipTransferred {
                new_administrator, ..
            } => write!(f, "Ownership transferred to {}", new_administrator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: u8) -> Vec<Pubkey> {
        (1..=n).map(|i| Pubkey::new_from_array([i; 32])).collect()
    }

    #[test]
    fn test_role_checks() {
        let holder = Pubkey::new_from_array([9; 32]);
        let other = Pubkey::new_from_array([8; 32]);
        assert!(Role::Provider.ensure(&holder, &holder).is_ok());
        assert_eq!(
            Role::Provider.ensure(&other, &holder),
            Err(FeedError::OnlyProviderCanCall)
        );
        assert_eq!(
            Role::Administrator.ensure(&other, &holder),
            Err(FeedError::OnlyAdministratorCanCall)
        );
    }

    #[test]
    fn test_page_offset_past_end() {
        let all = keys(3);
        let page = Page::from_slice(&all, 3, 10);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);

        let page = Page::from_slice(&all, 50, 1);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_page_clamps_limit() {
        let all = keys(5);
        let page = Page::from_slice(&all, 3, 10);
        assert_eq!(page.items, all[3..].to_vec());
        assert_eq!(page.total, 5);

        let page = Page::from_slice(&all, 1, 2);
        assert_eq!(page.items, all[1..3].to_vec());

        let page = Page::from_slice(&all, 0, usize::MAX);
        assert_eq!(page.items.len(), 5);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = FeedEvent::instance_deployed(Pubkey::default(), Pubkey::default(), 7);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "INSTANCE_DEPLOYED");
        assert_eq!(event.event_type(), "INSTANCE_DEPLOYED");
        assert_eq!(event.timestamp(), 7);
        assert_eq!(event.occurred_at().unwrap().timestamp(), 7);
    }
}
