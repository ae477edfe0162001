//! Feed registry service
//!
//! Deploys payment-gated data feed instances, keeps the directory of them and
//! administers their status, pricing and paid updates.

use crate::{
    address::{derive_instance_address, derive_registry_address, is_zero},
    clock::{Clock, SystemClock},
    config::RegistryConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    error::FeedError,
    gateway::{PaymentGateway, SignedAuthorization, TransferAuthorization},
    guard::{is_settling, settlement_scope, GuardedOperation, ReentrancyGuard},
    instance::{DataFeedInstance, InstanceHandle},
    metrics::{SettlementMetrics, SettlementStats},
    store::RegistryStore,
    types::{DeployParams, FeedEvent, InstanceInfo, Page, Role},
};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

/// Administrator-owned settings, replaced by `update_config` and
/// `transfer_ownership`
struct Settings {
    administrator: Pubkey,
    config: RegistryConfig,
    gateway: Arc<dyn PaymentGateway>,
}

/// Registry of payment-gated data feeds
///
/// Every mutating operation takes the caller's identity explicitly and runs
/// under a transaction lock, so operations apply in a single total order.
/// Funded operations (`deploy_instance`, `update_instance_data`) check every
/// precondition before settling and commit only after settlement succeeds.
///
/// # Example
/// ```no_run
/// use feed_registry::{
///     gateway::{random_nonce, sign_authorization, PaymentGateway},
///     gateways::LedgerGateway,
///     DeployParams, Registry, RegistryConfig, SystemClock,
/// };
/// use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let admin = Keypair::new().pubkey();
/// let gateway = Arc::new(LedgerGateway::new(Pubkey::new_from_array([1; 32]), Arc::new(SystemClock)));
/// let registry = Registry::new(admin, RegistryConfig::new(1_000, 10)?, gateway.clone())?;
///
/// let provider = Keypair::new();
/// gateway.mint(provider.pubkey(), 1_000).await;
/// let now = chrono::Utc::now().timestamp();
/// let auth = sign_authorization(&provider, &gateway.token(), &admin, 1_000, now - 60, now + 60, random_nonce());
///
/// let instance = registry
///     .deploy_instance(
///         &provider.pubkey(),
///         DeployParams { freshness_window: 60, data_update_price: 500, initial_data: b"42".to_vec() },
///         &auth,
///     )
///     .await?;
/// let data = registry.instance(&instance).await?.get_data().await?;
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    address: Pubkey,
    settings: RwLock<Settings>,
    store: Arc<RegistryStore>,
    clock: Arc<dyn Clock>,
    guard: ReentrancyGuard,
    tx_lock: Mutex<()>,
    events: broadcast::Sender<FeedEvent>,
    metrics: SettlementMetrics,
}

impl Registry {
    /// Creates a registry with an empty store and the system clock
    pub fn new(
        administrator: Pubkey,
        config: RegistryConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, FeedError> {
        Self::with_parts(
            administrator,
            config,
            gateway,
            Arc::new(RegistryStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Creates a registry over an explicit store and clock
    pub fn with_parts(
        administrator: Pubkey,
        config: RegistryConfig,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<RegistryStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FeedError> {
        if is_zero(&administrator) {
            return Err(FeedError::ZeroAddressProvided);
        }
        config.validate()?;

        let address = derive_registry_address(&Uuid::new_v4());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let metrics = SettlementMetrics::new(gateway.gateway_name());

        tracing::info!(
            registry = %address,
            administrator = %administrator,
            deploy_price = config.deploy_price,
            factory_share_percent = config.factory_share_percent,
            gateway = gateway.gateway_name(),
            "Feed registry created"
        );

        Ok(Self {
            address,
            settings: RwLock::new(Settings {
                administrator,
                config,
                gateway,
            }),
            store,
            clock,
            guard: ReentrancyGuard::new(),
            tx_lock: Mutex::new(()),
            events,
            metrics,
        })
    }

    /// Deploys a new instance owned by `caller`
    ///
    /// Charges `deploy_price` from the caller to the administrator using
    /// `authorization`. On any failure no instance is recorded and no funds
    /// move.
    pub async fn deploy_instance(
        &self,
        caller: &Pubkey,
        params: DeployParams,
        authorization: &SignedAuthorization,
    ) -> Result<Pubkey, FeedError> {
        let _tx = self.begin().await?;
        let _guard = self.guard.enter(GuardedOperation::Deploy)?;

        let (administrator, deploy_price, gateway) = {
            let settings = self.settings.read().await;
            (
                settings.administrator,
                settings.config.deploy_price,
                settings.gateway.clone(),
            )
        };

        let now = self.clock.unix_timestamp();
        let index = self.store.len().await as u64;
        let address = derive_instance_address(&self.address, index);
        let initial_data = params.initial_data.clone();

        let instance = DataFeedInstance::new(
            address,
            *caller,
            self.address,
            params.freshness_window,
            params.data_update_price,
            params.initial_data,
            now,
            self.events.clone(),
        )?;

        self.charge(
            gateway.as_ref(),
            caller,
            &administrator,
            deploy_price,
            authorization,
        )
        .await?;

        let record = self.store.insert(instance, now).await;
        self.publish(FeedEvent::data_updated(address, initial_data, now));
        self.publish(FeedEvent::instance_deployed(address, record.provider, now));

        tracing::info!(
            instance = %address,
            provider = %record.provider,
            deploy_price,
            "Instance deployed"
        );
        Ok(address)
    }

    /// Activates or deactivates an instance
    pub async fn set_instance_status(
        &self,
        caller: &Pubkey,
        instance: &Pubkey,
        active: bool,
    ) -> Result<(), FeedError> {
        let _tx = self.begin().await?;
        self.ensure_administrator(caller).await?;

        let slot = self.slot(instance).await?;
        let mut feed = slot.write().await;

        let record = self.store.set_active(instance, active).await?;
        feed.set_status(&self.address, active)?;

        let now = self.clock.unix_timestamp();
        self.publish(FeedEvent::instance_status_changed(
            *instance,
            record.provider,
            active,
            now,
        ));

        tracing::info!(instance = %instance, active, "Instance status changed");
        Ok(())
    }

    /// Sets the price the administrator pays per data update
    pub async fn set_instance_update_price(
        &self,
        caller: &Pubkey,
        instance: &Pubkey,
        price: u64,
    ) -> Result<(), FeedError> {
        let _tx = self.begin().await?;
        self.ensure_administrator(caller).await?;

        let slot = self.slot(instance).await?;
        slot.write().await.set_data_update_price(&self.address, price)?;

        self.publish(FeedEvent::InstancePriceUpdated {
            id: Uuid::new_v4(),
            instance: *instance,
            price,
            timestamp: self.clock.unix_timestamp(),
        });

        tracing::info!(instance = %instance, price, "Instance update price changed");
        Ok(())
    }

    /// Writes `data` into an instance, paying its provider
    ///
    /// The provider receives the instance's update price minus the
    /// registry's share; the administrator funds it through
    /// `authorization`. The write is validated before settlement and
    /// applied after it, so a failed settlement leaves the instance
    /// untouched.
    pub async fn update_instance_data(
        &self,
        caller: &Pubkey,
        instance: &Pubkey,
        data: Vec<u8>,
        authorization: &SignedAuthorization,
    ) -> Result<(), FeedError> {
        let _tx = self.begin().await?;
        let _guard = self.guard.enter(GuardedOperation::UpdateData(*instance))?;

        let (administrator, config, gateway) = {
            let settings = self.settings.read().await;
            (
                settings.administrator,
                settings.config,
                settings.gateway.clone(),
            )
        };
        Role::Administrator.ensure(caller, &administrator)?;

        let slot = self.slot(instance).await?;
        let (provider, price) = {
            let feed = slot.read().await;
            feed.ensure_can_update(&self.address, &data)?;
            (feed.provider(), feed.data_update_price())
        };
        let provider_amount = config.provider_amount(price);

        self.charge(
            gateway.as_ref(),
            &administrator,
            &provider,
            provider_amount,
            authorization,
        )
        .await?;

        let bytes = data.len();
        let now = self.clock.unix_timestamp();
        // Status and price only change under the transaction lock, so the
        // checks above still hold
        slot.write().await.update_data(&self.address, data, now)?;

        tracing::info!(
            instance = %instance,
            provider = %provider,
            provider_amount,
            bytes,
            "Instance data updated"
        );
        Ok(())
    }

    /// Replaces pricing and the payment gateway wholesale
    pub async fn update_config(
        &self,
        caller: &Pubkey,
        config: RegistryConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<(), FeedError> {
        let _tx = self.begin().await?;
        config.validate()?;

        let mut settings = self.settings.write().await;
        Role::Administrator.ensure(caller, &settings.administrator)?;

        let gateway_changed = settings.gateway.gateway_name() != gateway.gateway_name()
            || settings.gateway.token() != gateway.token();
        let payment_token = gateway.token();
        settings.config = config;
        settings.gateway = gateway;
        drop(settings);

        if gateway_changed {
            self.metrics.reset(self.gateway_name().await).await;
        }

        self.publish(FeedEvent::ConfigUpdated {
            id: Uuid::new_v4(),
            deploy_price: config.deploy_price,
            factory_share_percent: config.factory_share_percent,
            payment_token,
            timestamp: self.clock.unix_timestamp(),
        });

        tracing::info!(
            deploy_price = config.deploy_price,
            factory_share_percent = config.factory_share_percent,
            payment_token = %payment_token,
            "Registry config updated"
        );
        Ok(())
    }

    /// Hands administration to `new_administrator`
    pub async fn transfer_ownership(
        &self,
        caller: &Pubkey,
        new_administrator: Pubkey,
    ) -> Result<(), FeedError> {
        let _tx = self.begin().await?;
        if is_zero(&new_administrator) {
            return Err(FeedError::ZeroAddressProvided);
        }

        let mut settings = self.settings.write().await;
        Role::Administrator.ensure(caller, &settings.administrator)?;
        let previous_administrator = settings.administrator;
        settings.administrator = new_administrator;
        drop(settings);

        self.publish(FeedEvent::OwnershipTransferred {
            id: Uuid::new_v4(),
            previous_administrator,
            new_administrator,
            timestamp: self.clock.unix_timestamp(),
        });

        tracing::info!(
            previous = %previous_administrator,
            new = %new_administrator,
            "Registry ownership transferred"
        );
        Ok(())
    }

    /// Page over all instances in creation order
    pub async fn get_all_instances(&self, offset: usize, limit: usize) -> Page {
        self.store.page_all(offset, limit).await
    }

    /// Page over the instances deployed by `provider`
    pub async fn get_provider_instances(
        &self,
        provider: &Pubkey,
        offset: usize,
        limit: usize,
    ) -> Page {
        self.store.page_provider(provider, offset, limit).await
    }

    /// Provider, creation time and status of an instance
    pub async fn get_instance_info(&self, instance: &Pubkey) -> Result<InstanceInfo, FeedError> {
        self.store
            .record(instance)
            .await
            .map(|record| InstanceInfo::from(&record))
            .ok_or(FeedError::InstanceDoesNotExist(*instance))
    }

    /// Handle for reading an instance or calling its provider operations
    pub async fn instance(&self, instance: &Pubkey) -> Result<InstanceHandle, FeedError> {
        let slot = self.slot(instance).await?;
        Ok(InstanceHandle::new(slot, self.clock.clone()))
    }

    /// Number of active instances
    pub async fn active_count(&self) -> usize {
        self.store.active_count().await
    }

    /// Number of deployed instances
    pub async fn total_instances(&self) -> usize {
        self.store.len().await
    }

    pub async fn administrator(&self) -> Pubkey {
        self.settings.read().await.administrator
    }

    pub async fn config(&self) -> RegistryConfig {
        self.settings.read().await.config
    }

    /// Token the current gateway settles
    pub async fn payment_token(&self) -> Pubkey {
        self.settings.read().await.gateway.token()
    }

    async fn gateway_name(&self) -> &'static str {
        self.settings.read().await.gateway.gateway_name()
    }

    /// Registry identity, the caller the instances accept writes from
    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// Subscribes to registry and instance events
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Settlement latency and success statistics
    pub async fn settlement_metrics(&self) -> SettlementStats {
        self.metrics.get_stats().await
    }

    /// Opens a unit of work
    ///
    /// Calls made by a gateway from inside one of this registry's
    /// settlements are rejected instead of waiting on the lock they are
    /// nested in.
    async fn begin(&self) -> Result<MutexGuard<'_, ()>, FeedError> {
        if is_settling(&self.address) {
            tracing::warn!(registry = %self.address, "Rejected call from inside settlement");
            return Err(FeedError::ReentrantCall);
        }
        Ok(self.tx_lock.lock().await)
    }

    async fn ensure_administrator(&self, caller: &Pubkey) -> Result<(), FeedError> {
        let settings = self.settings.read().await;
        Role::Administrator.ensure(caller, &settings.administrator)
    }

    async fn slot(&self, instance: &Pubkey) -> Result<crate::store::InstanceSlot, FeedError> {
        self.store
            .feed(instance)
            .await
            .ok_or(FeedError::InstanceDoesNotExist(*instance))
    }

    /// Checks the payer's balance and settles `amount` from `from` to `to`
    ///
    /// Zero amounts still go through the gateway, so the authorization is
    /// verified and its nonce consumed.
    async fn charge(
        &self,
        gateway: &dyn PaymentGateway,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
        authorization: &SignedAuthorization,
    ) -> Result<(), FeedError> {
        let available = gateway.balance_of(from).await?;
        if available < amount {
            tracing::warn!(
                payer = %from,
                required = amount,
                available,
                "Insufficient payment"
            );
            return Err(FeedError::insufficient_payment(amount, available));
        }

        let transfer = TransferAuthorization::new(gateway.token(), *from, *to, amount, authorization);
        let start = Instant::now();
        let result =
            settlement_scope(self.address, gateway.settle_with_authorization(&transfer)).await;
        self.metrics
            .record_settlement(start.elapsed(), result.is_ok(), amount)
            .await;

        match result {
            Ok(settlement) => {
                tracing::debug!(
                    from = %settlement.from,
                    to = %settlement.to,
                    amount = settlement.amount,
                    gateway = gateway.gateway_name(),
                    "Payment settled"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(payer = %from, amount, error = %e, "Payment settlement failed");
                Err(e.into())
            }
        }
    }

    fn publish(&self, event: FeedEvent) {
        tracing::debug!(
            event_id = %event.id(),
            event_type = event.event_type(),
            "{}",
            event
        );
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
