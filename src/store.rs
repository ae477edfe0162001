//! In-memory registry store

use crate::{
    error::FeedError,
    instance::DataFeedInstance,
    types::{InstanceRecord, Page},
};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Type alias for a shared instance slot
pub type InstanceSlot = Arc<RwLock<DataFeedInstance>>;

#[derive(Default)]
struct StoreState {
    /// Every instance in creation order
    instances: Vec<Pubkey>,
    /// Instances per provider, in creation order
    by_provider: HashMap<Pubkey, Vec<Pubkey>>,
    records: HashMap<Pubkey, InstanceRecord>,
    feeds: HashMap<Pubkey, InstanceSlot>,
    active_count: usize,
}

/// State of a registry: records, orderings, the active counter and the
/// instances themselves
///
/// Created explicitly and handed to a `Registry`; several registries never
/// share one store.
pub struct RegistryStore {
    state: RwLock<StoreState>,
}

impl RegistryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
        }
    }

    /// Commits a freshly deployed instance
    ///
    /// Appends to the global and per-provider sequences. Records start
    /// active, so the active counter increments.
    pub async fn insert(&self, instance: DataFeedInstance, created_at: i64) -> InstanceRecord {
        let record = InstanceRecord {
            instance: instance.address(),
            provider: instance.provider(),
            created_at,
            is_active: instance.is_active(),
        };

        let mut state = self.state.write().await;
        state.instances.push(record.instance);
        state
            .by_provider
            .entry(record.provider)
            .or_default()
            .push(record.instance);
        if record.is_active {
            state.active_count += 1;
        }
        state.records.insert(record.instance, record.clone());
        state
            .feeds
            .insert(record.instance, Arc::new(RwLock::new(instance)));

        tracing::debug!(
            instance = %record.instance,
            provider = %record.provider,
            total = state.instances.len(),
            "Stored instance"
        );
        record
    }

    /// Flips the active flag of a record, keeping the counter in step
    ///
    /// Fails with `NoStatusChange` when the record already has `active`.
    pub async fn set_active(
        &self,
        instance: &Pubkey,
        active: bool,
    ) -> Result<InstanceRecord, FeedError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(instance)
            .ok_or(FeedError::InstanceDoesNotExist(*instance))?;

        if record.is_active == active {
            return Err(FeedError::NoStatusChange);
        }
        record.is_active = active;
        let record = record.clone();

        if active {
            state.active_count += 1;
        } else {
            state.active_count -= 1;
        }
        Ok(record)
    }

    /// Record of `instance`
    pub async fn record(&self, instance: &Pubkey) -> Option<InstanceRecord> {
        self.state.read().await.records.get(instance).cloned()
    }

    /// Shared slot of `instance`
    pub async fn feed(&self, instance: &Pubkey) -> Option<InstanceSlot> {
        self.state.read().await.feeds.get(instance).cloned()
    }

    /// Page over all instances in creation order
    pub async fn page_all(&self, offset: usize, limit: usize) -> Page {
        let state = self.state.read().await;
        Page::from_slice(&state.instances, offset, limit)
    }

    /// Page over the instances of `provider` in creation order
    pub async fn page_provider(&self, provider: &Pubkey, offset: usize, limit: usize) -> Page {
        let state = self.state.read().await;
        let owned = state
            .by_provider
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Page::from_slice(owned, offset, limit)
    }

    /// Number of deployed instances
    pub async fn len(&self) -> usize {
        self.state.read().await.instances.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of active instances
    pub async fn active_count(&self) -> usize {
        self.state.read().await.active_count
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}
