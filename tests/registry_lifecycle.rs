//! End-to-end lifecycle of a feed instance over the in-memory ledger

use feed_registry::{
    gateway::{random_nonce, sign_authorization},
    gateways::LedgerGateway,
    Clock, DeployParams, ErrorCategory, FeedError, ManualClock, PaymentError, PaymentGateway,
    Registry, RegistryConfig, RegistryStore, SignedAuthorization,
};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use std::sync::Arc;

const DEPLOY_PRICE: u64 = 1_000;
const UPDATE_PRICE: u64 = 200;

struct Setup {
    registry: Registry,
    ledger: Arc<LedgerGateway>,
    clock: Arc<ManualClock>,
    admin: Keypair,
    provider: Keypair,
}

async fn setup() -> Setup {
    setup_with_price(DEPLOY_PRICE).await
}

async fn setup_with_price(deploy_price: u64) -> Setup {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let ledger = Arc::new(LedgerGateway::new(
        Pubkey::new_from_array([5; 32]),
        clock.clone(),
    ));
    let admin = Keypair::new();
    let provider = Keypair::new();
    ledger.mint(provider.pubkey(), DEPLOY_PRICE).await;
    ledger.mint(admin.pubkey(), 10_000).await;

    let registry = Registry::with_parts(
        admin.pubkey(),
        RegistryConfig::new(deploy_price, 10).unwrap(),
        ledger.clone(),
        Arc::new(RegistryStore::new()),
        clock.clone(),
    )
    .unwrap();

    Setup {
        registry,
        ledger,
        clock,
        admin,
        provider,
    }
}

fn authorize(s: &Setup, payer: &Keypair, to: &Pubkey, amount: u64) -> SignedAuthorization {
    let now = s.clock.unix_timestamp();
    sign_authorization(
        payer,
        &s.ledger.token(),
        to,
        amount,
        now - 60,
        now + 60,
        random_nonce(),
    )
}

#[tokio::test]
async fn test_feed_lifecycle() {
    let s = setup().await;
    let admin = s.admin.pubkey();
    let provider = s.provider.pubkey();

    let auth = authorize(&s, &s.provider, &admin, DEPLOY_PRICE);
    let instance = s
        .registry
        .deploy_instance(
            &provider,
            DeployParams {
                freshness_window: 10,
                data_update_price: UPDATE_PRICE,
                initial_data: b"A".to_vec(),
            },
            &auth,
        )
        .await
        .unwrap();

    assert_eq!(s.ledger.balance_of(&provider).await.unwrap(), 0);
    assert_eq!(s.ledger.balance_of(&admin).await.unwrap(), 10_000 + DEPLOY_PRICE);

    let handle = s.registry.instance(&instance).await.unwrap();
    assert_eq!(handle.snapshot().await.history_count, 1);
    assert_eq!(handle.get_data().await.unwrap(), b"A");

    // Past the freshness window only the unchecked read succeeds
    s.clock.advance(11);
    let stale = handle.get_data().await.unwrap_err();
    assert_eq!(stale.category(), ErrorCategory::Staleness);
    assert_eq!(handle.get_data_without_check().await.unwrap(), b"A");

    s.registry
        .set_instance_status(&admin, &instance, false)
        .await
        .unwrap();
    assert_eq!(handle.get_data().await, Err(FeedError::InstanceNotActive));
    assert_eq!(
        handle.get_data_without_check().await.unwrap_err().category(),
        ErrorCategory::State
    );

    s.registry
        .set_instance_status(&admin, &instance, true)
        .await
        .unwrap();
    assert_eq!(handle.get_data_without_check().await.unwrap(), b"A");
    assert!(matches!(
        handle.get_data().await,
        Err(FeedError::DataNotUpdatedRecently { .. })
    ));

    let auth = authorize(&s, &s.admin, &provider, 180);
    s.registry
        .update_instance_data(&admin, &instance, b"B".to_vec(), &auth)
        .await
        .unwrap();

    assert_eq!(handle.get_data().await.unwrap(), b"B");
    assert_eq!(s.ledger.balance_of(&provider).await.unwrap(), 180);
    assert_eq!(handle.snapshot().await.history_count, 2);

    let recent: Vec<Vec<u8>> = handle
        .recent_history()
        .await
        .into_iter()
        .map(|entry| entry.data)
        .collect();
    assert_eq!(recent, vec![b"A".to_vec(), b"B".to_vec()]);
}

#[tokio::test]
async fn test_authorization_must_match_charge() {
    let s = setup().await;
    let admin = s.admin.pubkey();
    let provider = s.provider.pubkey();
    let params = DeployParams {
        freshness_window: 10,
        data_update_price: UPDATE_PRICE,
        initial_data: b"A".to_vec(),
    };

    // Signed for less than the deploy price
    let auth = authorize(&s, &s.provider, &admin, DEPLOY_PRICE - 1);
    let err = s
        .registry
        .deploy_instance(&provider, params.clone(), &auth)
        .await
        .unwrap_err();
    assert_eq!(err, FeedError::Payment(PaymentError::InvalidSignature));
    assert_eq!(s.registry.total_instances().await, 0);
    assert_eq!(s.ledger.balance_of(&provider).await.unwrap(), DEPLOY_PRICE);

    let auth = authorize(&s, &s.provider, &admin, DEPLOY_PRICE);
    s.registry
        .deploy_instance(&provider, params.clone(), &auth)
        .await
        .unwrap();

    // A settled authorization cannot be replayed
    s.ledger.mint(provider, DEPLOY_PRICE).await;
    let err = s
        .registry
        .deploy_instance(&provider, params, &auth)
        .await
        .unwrap_err();
    assert_eq!(err, FeedError::Payment(PaymentError::NonceAlreadyUsed));
    assert_eq!(s.registry.total_instances().await, 1);
    assert_eq!(s.registry.active_count().await, 1);
}

#[tokio::test]
async fn test_expired_authorization_leaves_instance_untouched() {
    let s = setup().await;
    let admin = s.admin.pubkey();
    let provider = s.provider.pubkey();

    let auth = authorize(&s, &s.provider, &admin, DEPLOY_PRICE);
    let instance = s
        .registry
        .deploy_instance(
            &provider,
            DeployParams {
                freshness_window: 3_600,
                data_update_price: UPDATE_PRICE,
                initial_data: b"A".to_vec(),
            },
            &auth,
        )
        .await
        .unwrap();

    let auth = authorize(&s, &s.admin, &provider, 180);
    s.clock.advance(61);
    let err = s
        .registry
        .update_instance_data(&admin, &instance, b"B".to_vec(), &auth)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeedError::Payment(PaymentError::AuthorizationExpired { .. })
    ));

    let handle = s.registry.instance(&instance).await.unwrap();
    assert_eq!(handle.get_data().await.unwrap(), b"A");
    assert_eq!(handle.snapshot().await.total_writes, 1);
    assert_eq!(s.ledger.balance_of(&provider).await.unwrap(), 0);
}

#[tokio::test]
async fn test_free_deploy_still_verifies_authorization() {
    let s = setup_with_price(0).await;
    let admin = s.admin.pubkey();
    let provider = s.provider.pubkey();
    let params = DeployParams {
        freshness_window: 10,
        data_update_price: UPDATE_PRICE,
        initial_data: b"A".to_vec(),
    };

    let forged = SignedAuthorization {
        valid_after: 0,
        valid_before: 1,
        nonce: random_nonce(),
        signature: Signature::from([0u8; 64]),
    };
    let err = s
        .registry
        .deploy_instance(&provider, params.clone(), &forged)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeedError::Payment(PaymentError::AuthorizationExpired { .. })
    ));

    let unsigned = SignedAuthorization {
        valid_after: 0,
        valid_before: i64::MAX,
        ..forged
    };
    let err = s
        .registry
        .deploy_instance(&provider, params.clone(), &unsigned)
        .await
        .unwrap_err();
    assert_eq!(err, FeedError::Payment(PaymentError::InvalidSignature));
    assert_eq!(s.registry.total_instances().await, 0);

    // A properly signed zero-amount authorization is consumed
    let auth = authorize(&s, &s.provider, &admin, 0);
    s.registry
        .deploy_instance(&provider, params.clone(), &auth)
        .await
        .unwrap();
    assert!(s.ledger.is_nonce_used(&provider, &auth.nonce).await);
    assert_eq!(s.ledger.balance_of(&provider).await.unwrap(), DEPLOY_PRICE);

    let err = s
        .registry
        .deploy_instance(&provider, params, &auth)
        .await
        .unwrap_err();
    assert_eq!(err, FeedError::Payment(PaymentError::NonceAlreadyUsed));
    assert_eq!(s.registry.total_instances().await, 1);
}
