//! In-memory token ledger gateway

use crate::{
    clock::Clock,
    error::PaymentError,
    gateway::{PaymentGateway, Settlement, TransferAuthorization},
};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Pubkey, u64>,
    used_nonces: HashSet<(Pubkey, [u8; 32])>,
}

/// Gateway settling authorizations against an in-memory ledger
///
/// Performs the full authorization check: window against the injected
/// clock, per-payer nonce replay, ed25519 signature over the transfer
/// message, then balance.
pub struct LedgerGateway {
    token: Pubkey,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
}

impl LedgerGateway {
    /// Creates an empty ledger for `token`
    pub fn new(token: Pubkey, clock: Arc<dyn Clock>) -> Self {
        Self {
            token,
            clock,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Credits `amount` to `owner`
    pub async fn mint(&self, owner: Pubkey, amount: u64) {
        let mut state = self.state.write().await;
        let balance = state.balances.entry(owner).or_insert(0);
        *balance = balance.saturating_add(amount);
        tracing::debug!(owner = %owner, amount, "Minted to ledger");
    }

    /// Returns true if `nonce` was consumed for `owner`
    pub async fn is_nonce_used(&self, owner: &Pubkey, nonce: &[u8; 32]) -> bool {
        let state = self.state.read().await;
        state.used_nonces.contains(&(*owner, *nonce))
    }
}

#[async_trait]
impl PaymentGateway for LedgerGateway {
    async fn balance_of(&self, owner: &Pubkey) -> Result<u64, PaymentError> {
        let state = self.state.read().await;
        Ok(state.balances.get(owner).copied().unwrap_or(0))
    }

    async fn settle_with_authorization(
        &self,
        transfer: &TransferAuthorization,
    ) -> Result<Settlement, PaymentError> {
        if transfer.token != self.token {
            return Err(PaymentError::TokenMismatch {
                expected: self.token,
                actual: transfer.token,
            });
        }

        let now = self.clock.unix_timestamp();
        if now < transfer.valid_after {
            return Err(PaymentError::AuthorizationNotYetValid {
                valid_after: transfer.valid_after,
                now,
            });
        }
        if now > transfer.valid_before {
            return Err(PaymentError::AuthorizationExpired {
                valid_before: transfer.valid_before,
                now,
            });
        }

        let mut state = self.state.write().await;
        let key = (transfer.from, transfer.nonce);
        if state.used_nonces.contains(&key) {
            return Err(PaymentError::NonceAlreadyUsed);
        }
        if !transfer.verify_signature() {
            return Err(PaymentError::InvalidSignature);
        }

        let available = state.balances.get(&transfer.from).copied().unwrap_or(0);
        if available < transfer.amount {
            return Err(PaymentError::InsufficientFunds {
                required: transfer.amount,
                available,
            });
        }

        state.balances.insert(transfer.from, available - transfer.amount);
        let credited = state.balances.entry(transfer.to).or_insert(0);
        *credited = credited.saturating_add(transfer.amount);
        state.used_nonces.insert(key);

        tracing::debug!(
            from = %transfer.from,
            to = %transfer.to,
            amount = transfer.amount,
            "Settled transfer"
        );

        Ok(Settlement {
            from: transfer.from,
            to: transfer.to,
            amount: transfer.amount,
            settled_at: now,
        })
    }

    fn token(&self) -> Pubkey {
        self.token
    }

    fn gateway_name(&self) -> &'static str {
        "ledger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        gateway::{random_nonce, sign_authorization},
    };
    use solana_sdk::signature::Keypair;
    use solana_sdk::signer::Signer;

    const T0: i64 = 1_700_000_000;

    struct Fixture {
        clock: Arc<ManualClock>,
        gateway: LedgerGateway,
        payer: Keypair,
        payee: Pubkey,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(T0));
        let gateway = LedgerGateway::new(Pubkey::new_from_array([5; 32]), clock.clone());
        let payer = Keypair::new();
        gateway.mint(payer.pubkey(), 1_000).await;
        Fixture {
            clock,
            gateway,
            payer,
            payee: Keypair::new().pubkey(),
        }
    }

    fn transfer(f: &Fixture, amount: u64, valid_after: i64, valid_before: i64) -> TransferAuthorization {
        let token = f.gateway.token();
        let auth = sign_authorization(
            &f.payer,
            &token,
            &f.payee,
            amount,
            valid_after,
            valid_before,
            random_nonce(),
        );
        TransferAuthorization::new(token, f.payer.pubkey(), f.payee, amount, &auth)
    }

    #[tokio::test]
    async fn test_settles_and_moves_balance() {
        let f = fixture().await;
        let t = transfer(&f, 400, T0 - 10, T0 + 10);

        let settlement = f.gateway.settle_with_authorization(&t).await.unwrap();
        assert_eq!(settlement.amount, 400);
        assert_eq!(settlement.settled_at, T0);
        assert_eq!(f.gateway.balance_of(&f.payer.pubkey()).await.unwrap(), 600);
        assert_eq!(f.gateway.balance_of(&f.payee).await.unwrap(), 400);
        assert!(f.gateway.is_nonce_used(&f.payer.pubkey(), &t.nonce).await);
    }

    #[tokio::test]
    async fn test_rejects_replayed_nonce() {
        let f = fixture().await;
        let t = transfer(&f, 100, T0, T0);

        f.gateway.settle_with_authorization(&t).await.unwrap();
        assert_eq!(
            f.gateway.settle_with_authorization(&t).await,
            Err(PaymentError::NonceAlreadyUsed)
        );
        assert_eq!(f.gateway.balance_of(&f.payer.pubkey()).await.unwrap(), 900);
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let f = fixture().await;

        let early = transfer(&f, 1, T0 + 1, T0 + 5);
        assert_eq!(
            f.gateway.settle_with_authorization(&early).await,
            Err(PaymentError::AuthorizationNotYetValid {
                valid_after: T0 + 1,
                now: T0
            })
        );

        let late = transfer(&f, 1, T0 - 5, T0 - 1);
        assert_eq!(
            f.gateway.settle_with_authorization(&late).await,
            Err(PaymentError::AuthorizationExpired {
                valid_before: T0 - 1,
                now: T0
            })
        );

        f.clock.advance(1);
        assert!(f.gateway.settle_with_authorization(&early).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_tampered_amount() {
        let f = fixture().await;
        let mut t = transfer(&f, 100, T0, T0 + 1);
        t.amount = 900;

        assert_eq!(
            f.gateway.settle_with_authorization(&t).await,
            Err(PaymentError::InvalidSignature)
        );
        assert!(!f.gateway.is_nonce_used(&f.payer.pubkey(), &t.nonce).await);
    }

    #[tokio::test]
    async fn test_rejects_overdraft() {
        let f = fixture().await;
        let t = transfer(&f, 1_001, T0, T0 + 1);

        assert_eq!(
            f.gateway.settle_with_authorization(&t).await,
            Err(PaymentError::InsufficientFunds {
                required: 1_001,
                available: 1_000
            })
        );
    }

    #[tokio::test]
    async fn test_rejects_foreign_token() {
        let f = fixture().await;
        let mut t = transfer(&f, 1, T0, T0 + 1);
        t.token = Pubkey::new_from_array([6; 32]);

        assert!(matches!(
            f.gateway.settle_with_authorization(&t).await,
            Err(PaymentError::TokenMismatch { .. })
        ));
    }
}
