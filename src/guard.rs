//! Reentrancy guard for funded registry operations

use crate::error::FeedError;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

tokio::task_local! {
    /// Registry whose settlement the current task is inside of
    static SETTLING_FOR: Pubkey;
}

/// Runs `settlement` marked as a settlement of `registry`
///
/// Anything the gateway calls back into while `settlement` runs sees
/// `is_settling(registry)` as true.
pub async fn settlement_scope<F: Future>(registry: Pubkey, settlement: F) -> F::Output {
    SETTLING_FOR.scope(registry, settlement).await
}

/// Returns true when called from inside a settlement of `registry`
pub fn is_settling(registry: &Pubkey) -> bool {
    SETTLING_FOR
        .try_with(|current| current == registry)
        .unwrap_or(false)
}

/// Funded operations that may not overlap with themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedOperation {
    Deploy,
    UpdateData(Pubkey),
}

/// Set of funded operations currently in flight
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    active: Arc<Mutex<HashSet<GuardedOperation>>>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `operation` as in flight until the returned guard drops
    ///
    /// Fails with `ReentrantCall` if the same operation is already in
    /// flight. The registry enters it while holding its transaction lock, so
    /// independent callers queue on the lock instead of failing here.
    pub fn enter(&self, operation: GuardedOperation) -> Result<OperationGuard, FeedError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(operation) {
            tracing::warn!(operation = ?operation, "Rejected reentrant call");
            return Err(FeedError::ReentrantCall);
        }

        Ok(OperationGuard {
            operation,
            active: self.active.clone(),
        })
    }
}

/// RAII guard releasing its operation on drop
#[derive(Debug)]
pub struct OperationGuard {
    operation: GuardedOperation,
    active: Arc<Mutex<HashSet<GuardedOperation>>>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.operation);
    }
}
