//! Payment gateway abstraction for settling signed transfer authorizations

use crate::{constants::PAYMENT_DOMAIN, error::PaymentError};
use async_trait::async_trait;
use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use uuid::Uuid;

/// Payer-supplied half of a transfer authorization
///
/// The payer signs over the full transfer tuple; the registry fills in the
/// parties and the amount it computed when it settles. If those differ from
/// what the payer signed, the gateway rejects the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAuthorization {
    /// Earliest unix timestamp the authorization may be settled at
    pub valid_after: i64,
    /// Latest unix timestamp the authorization may be settled at
    pub valid_before: i64,
    /// One-time nonce, consumed on settlement
    pub nonce: [u8; 32],
    /// ed25519 signature of the payer over the transfer message
    pub signature: Signature,
}

/// Fully specified transfer handed to a gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAuthorization {
    pub token: Pubkey,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
    pub valid_after: i64,
    pub valid_before: i64,
    pub nonce: [u8; 32],
    pub signature: Signature,
}

/// Canonical byte layout the payer signs
#[derive(BorshSerialize)]
struct AuthorizationMessage<'a> {
    domain: &'a str,
    token: [u8; 32],
    from: [u8; 32],
    to: [u8; 32],
    amount: u64,
    valid_after: i64,
    valid_before: i64,
    nonce: [u8; 32],
}

impl TransferAuthorization {
    /// Combines a payer authorization with the transfer it should cover
    pub fn new(
        token: Pubkey,
        from: Pubkey,
        to: Pubkey,
        amount: u64,
        authorization: &SignedAuthorization,
    ) -> Self {
        Self {
            token,
            from,
            to,
            amount,
            valid_after: authorization.valid_after,
            valid_before: authorization.valid_before,
            nonce: authorization.nonce,
            signature: authorization.signature,
        }
    }

    /// Bytes covered by the signature
    pub fn message(&self) -> Vec<u8> {
        signing_message(
            &self.token,
            &self.from,
            &self.to,
            self.amount,
            self.valid_after,
            self.valid_before,
            &self.nonce,
        )
    }

    /// Returns true if `signature` was produced by `from` over `message()`
    pub fn verify_signature(&self) -> bool {
        self.signature.verify(self.from.as_ref(), &self.message())
    }
}

/// Builds the message a payer signs for a transfer
pub fn signing_message(
    token: &Pubkey,
    from: &Pubkey,
    to: &Pubkey,
    amount: u64,
    valid_after: i64,
    valid_before: i64,
    nonce: &[u8; 32],
) -> Vec<u8> {
    let message = AuthorizationMessage {
        domain: PAYMENT_DOMAIN,
        token: token.to_bytes(),
        from: from.to_bytes(),
        to: to.to_bytes(),
        amount,
        valid_after,
        valid_before,
        nonce: *nonce,
    };
    // Writing into a Vec cannot fail
    borsh::to_vec(&message).unwrap_or_default()
}

/// Signs a transfer of `amount` from `payer` to `to`
pub fn sign_authorization(
    payer: &Keypair,
    token: &Pubkey,
    to: &Pubkey,
    amount: u64,
    valid_after: i64,
    valid_before: i64,
    nonce: [u8; 32],
) -> SignedAuthorization {
    let message = signing_message(
        token,
        &payer.pubkey(),
        to,
        amount,
        valid_after,
        valid_before,
        &nonce,
    );

    SignedAuthorization {
        valid_after,
        valid_before,
        nonce,
        signature: payer.sign_message(&message),
    }
}

/// Generates a random authorization nonce
pub fn random_nonce() -> [u8; 32] {
    let mut nonce = [0u8; 32];
    nonce[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    nonce[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    nonce
}

/// Verified outcome of a settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
    pub settled_at: i64,
}

/// Trait for payment gateways
///
/// Implementations hold balances of a single token and settle one-time,
/// time-windowed transfer authorizations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Settleable balance of `owner`
    async fn balance_of(&self, owner: &Pubkey) -> Result<u64, PaymentError>;

    /// Verifies and settles a transfer
    ///
    /// Fails if the window has not opened or has closed, the nonce was used,
    /// the signature does not cover the transfer, or funds are short.
    async fn settle_with_authorization(
        &self,
        transfer: &TransferAuthorization,
    ) -> Result<Settlement, PaymentError>;

    /// Token the gateway settles
    fn token(&self) -> Pubkey;

    /// Returns the name of this gateway
    fn gateway_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock gateway for testing
    ///
    /// Skips signature checks; balances and failures are scripted.
    pub struct MockGateway {
        token: Pubkey,
        balances: Arc<Mutex<HashMap<Pubkey, u64>>>,
        settle_error: Arc<Mutex<Option<PaymentError>>>,
        settlements: Arc<Mutex<Vec<TransferAuthorization>>>,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self {
                token: Pubkey::new_from_array([42; 32]),
                balances: Arc::new(Mutex::new(HashMap::new())),
                settle_error: Arc::new(Mutex::new(None)),
                settlements: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn set_balance(&self, owner: Pubkey, amount: u64) {
            self.balances.lock().unwrap().insert(owner, amount);
        }

        pub fn balance(&self, owner: &Pubkey) -> u64 {
            self.balances
                .lock()
                .unwrap()
                .get(owner)
                .copied()
                .unwrap_or(0)
        }

        /// Makes every following settlement fail with `error`
        pub fn fail_settlements(&self, error: PaymentError) {
            *self.settle_error.lock().unwrap() = Some(error);
        }

        pub fn settlements(&self) -> Vec<TransferAuthorization> {
            self.settlements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn balance_of(&self, owner: &Pubkey) -> Result<u64, PaymentError> {
            Ok(self.balance(owner))
        }

        async fn settle_with_authorization(
            &self,
            transfer: &TransferAuthorization,
        ) -> Result<Settlement, PaymentError> {
            if let Some(err) = self.settle_error.lock().unwrap().clone() {
                return Err(err);
            }

            let mut balances = self.balances.lock().unwrap();
            let available = balances.get(&transfer.from).copied().unwrap_or(0);
            if available < transfer.amount {
                return Err(PaymentError::InsufficientFunds {
                    required: transfer.amount,
                    available,
                });
            }
            balances.insert(transfer.from, available - transfer.amount);
            *balances.entry(transfer.to).or_insert(0) += transfer.amount;
            drop(balances);

            self.settlements.lock().unwrap().push(transfer.clone());
            Ok(Settlement {
                from: transfer.from,
                to: transfer.to,
                amount: transfer.amount,
                settled_at: transfer.valid_after,
            })
        }

        fn token(&self) -> Pubkey {
            self.token
        }

        fn gateway_name(&self) -> &'static str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_covers_transfer_tuple() {
        let payer = Keypair::new();
        let token = Pubkey::new_from_array([1; 32]);
        let to = Keypair::new().pubkey();
        let nonce = random_nonce();
        let auth = sign_authorization(&payer, &token, &to, 500, 0, 100, nonce);

        let transfer = TransferAuthorization::new(token, payer.pubkey(), to, 500, &auth);
        assert!(transfer.verify_signature());

        let inflated = TransferAuthorization::new(token, payer.pubkey(), to, 501, &auth);
        assert!(!inflated.verify_signature());

        let redirected =
            TransferAuthorization::new(token, payer.pubkey(), Keypair::new().pubkey(), 500, &auth);
        assert!(!redirected.verify_signature());

        let other_token =
            TransferAuthorization::new(Pubkey::new_from_array([2; 32]), payer.pubkey(), to, 500, &auth);
        assert!(!other_token.verify_signature());
    }

    #[test]
    fn test_random_nonces_differ() {
        assert_ne!(random_nonce(), random_nonce());
    }
}
