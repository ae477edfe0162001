//! Identity classification and address derivation
//!
//! Wallet identities are ed25519 public keys and lie on the curve. Registry
//! and instance identities are program-derived addresses, which are off the
//! curve by construction, so no private key can sign for them.

use crate::constants::{FEED_PROGRAM_ID, INSTANCE_SEED, REGISTRY_SEED};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

/// True for the all-zero identity
pub fn is_zero(key: &Pubkey) -> bool {
    *key == Pubkey::default()
}

/// True for identities backed by a keypair
pub fn is_wallet(key: &Pubkey) -> bool {
    key.is_on_curve()
}

/// Derives a fresh registry address
pub fn derive_registry_address(salt: &Uuid) -> Pubkey {
    Pubkey::find_program_address(&[REGISTRY_SEED, salt.as_bytes()], &FEED_PROGRAM_ID).0
}

/// Derives the address of the `index`-th instance of `registry`
pub fn derive_instance_address(registry: &Pubkey, index: u64) -> Pubkey {
    Pubkey::find_program_address(
        &[INSTANCE_SEED, registry.as_ref(), &index.to_le_bytes()],
        &FEED_PROGRAM_ID,
    )
    .0
}
