//! Data feed instance: a provider-owned payload with bounded history

use crate::{
    address::{is_wallet, is_zero},
    clock::Clock,
    constants::MAX_DATA_SIZE,
    error::FeedError,
    history::HistoryBuffer,
    types::{FeedEvent, HistoryEntry, InstanceSnapshot, Role},
};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// A single payment-gated data feed
///
/// Writes go through the owning registry only; the provider may tune the
/// freshness window. Reads require the instance to be active.
#[derive(Debug)]
pub struct DataFeedInstance {
    address: Pubkey,
    provider: Pubkey,
    registry: Pubkey,
    is_active: bool,
    data_update_price: u64,
    last_update_timestamp: i64,
    recommended_freshness_window: u64,
    current_data: Vec<u8>,
    history: HistoryBuffer,
    events: broadcast::Sender<FeedEvent>,
}

impl DataFeedInstance {
    /// Creates an active instance holding `initial_data`
    ///
    /// The initial payload passes the same validation as `update_data`.
    /// No event is emitted; the deployer announces the instance once it is
    /// committed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Pubkey,
        provider: Pubkey,
        registry: Pubkey,
        freshness_window: u64,
        data_update_price: u64,
        initial_data: Vec<u8>,
        now: i64,
        events: broadcast::Sender<FeedEvent>,
    ) -> Result<Self, FeedError> {
        if is_zero(&address) || is_zero(&provider) || is_zero(&registry) {
            return Err(FeedError::ZeroAddressProvided);
        }
        if !is_wallet(&provider) {
            return Err(FeedError::ProviderShouldBeWallet);
        }
        if is_wallet(&registry) {
            return Err(FeedError::RegistryShouldBeProgram);
        }
        validate_data(&initial_data)?;

        let mut instance = Self {
            address,
            provider,
            registry,
            is_active: true,
            data_update_price,
            last_update_timestamp: now,
            recommended_freshness_window: freshness_window,
            current_data: Vec::new(),
            history: HistoryBuffer::new(),
            events,
        };
        instance.write(initial_data, now);

        Ok(instance)
    }

    /// Sets the freshness window enforced by `get_data`
    pub fn set_recommended_update_duration(
        &mut self,
        caller: &Pubkey,
        duration: u64,
    ) -> Result<(), FeedError> {
        Role::Provider.ensure(caller, &self.provider)?;
        self.recommended_freshness_window = duration;
        tracing::debug!(
            instance = %self.address,
            window_secs = duration,
            "Freshness window updated"
        );
        Ok(())
    }

    /// Sets the price the registry pays the provider per update
    pub fn set_data_update_price(&mut self, caller: &Pubkey, price: u64) -> Result<(), FeedError> {
        Role::Registry.ensure(caller, &self.registry)?;
        self.data_update_price = price;
        Ok(())
    }

    /// Activates or deactivates the instance
    pub fn set_status(&mut self, caller: &Pubkey, active: bool) -> Result<(), FeedError> {
        Role::Registry.ensure(caller, &self.registry)?;
        self.is_active = active;
        Ok(())
    }

    /// Checks everything `update_data` would check, without writing
    pub fn ensure_can_update(&self, caller: &Pubkey, data: &[u8]) -> Result<(), FeedError> {
        Role::Registry.ensure(caller, &self.registry)?;
        if !self.is_active {
            return Err(FeedError::InstanceNotActive);
        }
        validate_data(data)
    }

    /// Appends a new payload and emits `DataUpdated`
    pub fn update_data(&mut self, caller: &Pubkey, data: Vec<u8>, now: i64) -> Result<(), FeedError> {
        self.ensure_can_update(caller, &data)?;
        self.write(data.clone(), now);

        let _ = self
            .events
            .send(FeedEvent::data_updated(self.address, data, now));
        Ok(())
    }

    /// Current payload, rejected once older than the freshness window
    pub fn get_data(&self, now: i64) -> Result<&[u8], FeedError> {
        self.ensure_readable()?;
        if self.is_stale(now) {
            return Err(FeedError::DataNotUpdatedRecently {
                last_update_timestamp: self.last_update_timestamp,
                recommended_freshness_window: self.recommended_freshness_window,
            });
        }
        self.current()
    }

    /// Current payload regardless of its age
    pub fn get_data_without_check(&self) -> Result<&[u8], FeedError> {
        self.ensure_readable()?;
        self.current()
    }

    /// History slot at `index`
    pub fn history(&self, index: usize) -> Result<&HistoryEntry, FeedError> {
        self.history.get(index)
    }

    /// Returns true when `now - last_update_timestamp` exceeds the window
    pub fn is_stale(&self, now: i64) -> bool {
        let age = now.saturating_sub(self.last_update_timestamp).max(0) as u64;
        age > self.recommended_freshness_window
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn provider(&self) -> Pubkey {
        self.provider
    }

    pub fn registry(&self) -> Pubkey {
        self.registry
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn data_update_price(&self) -> u64 {
        self.data_update_price
    }

    pub fn last_update_timestamp(&self) -> i64 {
        self.last_update_timestamp
    }

    pub fn recommended_freshness_window(&self) -> u64 {
        self.recommended_freshness_window
    }

    /// Number of populated history slots
    pub fn history_count(&self) -> usize {
        self.history.count()
    }

    pub fn total_writes(&self) -> u64 {
        self.history.total_writes()
    }

    pub fn latest_entry(&self) -> Option<&HistoryEntry> {
        self.history.latest()
    }

    /// Populated history, oldest first
    pub fn recent_history(&self) -> Vec<HistoryEntry> {
        self.history.entries().into_iter().cloned().collect()
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            address: self.address,
            provider: self.provider,
            registry: self.registry,
            is_active: self.is_active,
            data_update_price: self.data_update_price,
            last_update_timestamp: self.last_update_timestamp,
            recommended_freshness_window: self.recommended_freshness_window,
            current_data: self.current_data.clone(),
            history_count: self.history.count(),
            total_writes: self.history.total_writes(),
        }
    }

    fn write(&mut self, data: Vec<u8>, now: i64) {
        self.history.push(HistoryEntry {
            data: data.clone(),
            timestamp: now,
        });
        self.current_data = data;
        self.last_update_timestamp = now;

        tracing::debug!(
            instance = %self.address,
            bytes = self.current_data.len(),
            history_count = self.history.count(),
            "Data written"
        );
    }

    fn ensure_readable(&self) -> Result<(), FeedError> {
        if !self.is_active {
            return Err(FeedError::InstanceNotActive);
        }
        Ok(())
    }

    fn current(&self) -> Result<&[u8], FeedError> {
        if self.current_data.is_empty() {
            return Err(FeedError::NoDataAvailable);
        }
        Ok(&self.current_data)
    }
}

fn validate_data(data: &[u8]) -> Result<(), FeedError> {
    if data.is_empty() {
        return Err(FeedError::EmptyData);
    }
    if data.len() > MAX_DATA_SIZE {
        return Err(FeedError::data_too_large(data.len(), MAX_DATA_SIZE));
    }
    Ok(())
}

/// Shared handle to an instance owned by a registry
///
/// Pairs the instance with the registry clock so readers and the provider
/// can talk to the instance directly.
#[derive(Clone)]
pub struct InstanceHandle {
    inner: Arc<RwLock<DataFeedInstance>>,
    clock: Arc<dyn Clock>,
}

impl InstanceHandle {
    pub(crate) fn new(inner: Arc<RwLock<DataFeedInstance>>, clock: Arc<dyn Clock>) -> Self {
        Self { inner, clock }
    }

    /// Current payload, subject to the freshness window
    pub async fn get_data(&self) -> Result<Vec<u8>, FeedError> {
        let now = self.clock.unix_timestamp();
        let instance = self.inner.read().await;
        let data = instance.get_data(now)?.to_vec();
        Ok(data)
    }

    /// Current payload regardless of age
    pub async fn get_data_without_check(&self) -> Result<Vec<u8>, FeedError> {
        let instance = self.inner.read().await;
        let data = instance.get_data_without_check()?.to_vec();
        Ok(data)
    }

    /// History slot at `index`
    pub async fn history(&self, index: usize) -> Result<HistoryEntry, FeedError> {
        let instance = self.inner.read().await;
        let entry = instance.history(index)?.clone();
        Ok(entry)
    }

    /// Populated history, oldest first
    pub async fn recent_history(&self) -> Vec<HistoryEntry> {
        self.inner.read().await.recent_history()
    }

    /// Provider-only freshness window update
    pub async fn set_recommended_update_duration(
        &self,
        caller: &Pubkey,
        duration: u64,
    ) -> Result<(), FeedError> {
        let mut instance = self.inner.write().await;
        instance.set_recommended_update_duration(caller, duration)
    }

    pub async fn snapshot(&self) -> InstanceSnapshot {
        self.inner.read().await.snapshot()
    }
}
