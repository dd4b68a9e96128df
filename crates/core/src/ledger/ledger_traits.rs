use async_trait::async_trait;
use log::debug;
use std::future::Future;

use super::ledger_model::LedgerBatch;
use crate::constants::MAX_CONFLICT_RETRIES;
use crate::errors::Result;

/// Atomic writer for ledger mutations.
#[async_trait]
pub trait LedgerStoreTrait: Send + Sync {
    async fn commit(&self, batch: LedgerBatch) -> Result<()>;
}

/// Re-runs a read-modify-write operation while it loses optimistic
/// concurrency races, up to `MAX_CONFLICT_RETRIES` attempts.
pub async fn retry_on_conflict<T, F, Fut>(operation: &str, mut attempt_fn: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match attempt_fn().await {
            Err(err) if err.is_conflict() && attempt < MAX_CONFLICT_RETRIES => {
                debug!(
                    "{} lost a concurrent update (attempt {}): {}",
                    operation, attempt, err
                );
                attempt += 1;
                tokio::task::yield_now().await;
            }
            other => return other,
        }
    }
}
