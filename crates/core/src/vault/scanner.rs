//! Checkpointed, windowed scanning of one vault's event log.

use backoff::ExponentialBackoff;
use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use super::normalizer::normalize;
use super::reconciler::{ReconcileSummary, Reconciler};
use super::vault_model::{VaultAuditRecord, VaultConfig, VaultEventKind};
use super::vault_traits::{CheckpointRepositoryTrait, VaultAuditRepositoryTrait, VaultEventSource};
use crate::errors::{Error, Result};

/// One lock per (network, vault). A scan that cannot take its lock is
/// skipped rather than queued.
#[derive(Default)]
pub struct ScanLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ScanLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, key: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.try_lock_owned().ok()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub vault_key: String,
    /// Another scan of the same vault was running.
    pub skipped: bool,
    pub cancelled: bool,
    pub from_block: Option<u64>,
    /// Last block covered by a committed checkpoint during this run.
    pub checkpoint: Option<u64>,
    pub windows: usize,
    pub events_recorded: usize,
    pub orphans_retried: ReconcileSummary,
    pub reconciled: ReconcileSummary,
}

pub struct VaultScanner {
    config: VaultConfig,
    source: Arc<dyn VaultEventSource>,
    checkpoints: Arc<dyn CheckpointRepositoryTrait>,
    audit_repository: Arc<dyn VaultAuditRepositoryTrait>,
    reconciler: Arc<Reconciler>,
    locks: Arc<ScanLockRegistry>,
}

impl VaultScanner {
    pub fn new(
        config: VaultConfig,
        source: Arc<dyn VaultEventSource>,
        checkpoints: Arc<dyn CheckpointRepositoryTrait>,
        audit_repository: Arc<dyn VaultAuditRepositoryTrait>,
        reconciler: Arc<Reconciler>,
        locks: Arc<ScanLockRegistry>,
    ) -> Self {
        Self {
            config: config.normalized(),
            source,
            checkpoints,
            audit_repository,
            reconciler,
            locks,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Runs `operation` with exponential backoff while it fails with
    /// `ExternalFetchFailure`. Returns `Ok(None)` if cancelled first.
    async fn fetch_with_retry<T, F, Fut>(
        &self,
        what: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(self.config.max_retry_elapsed_secs)),
            ..ExponentialBackoff::default()
        };
        let attempt = backoff::future::retry_notify(
            policy,
            || {
                let fut = operation();
                async move {
                    fut.await.map_err(|err| match err {
                        Error::ExternalFetchFailure(_) => backoff::Error::transient(err),
                        other => backoff::Error::permanent(other),
                    })
                }
            },
            |err: Error, wait: Duration| {
                warn!(
                    "{} for vault {} failed, retrying in {:?}: {}",
                    what,
                    self.config.key(),
                    wait,
                    err
                );
            },
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            result = attempt => result.map(Some),
        }
    }

    /// Scans from the stored checkpoint to the current chain head.
    ///
    /// Each window of at most `max_block_range` blocks is fetched for all
    /// three event kinds, recorded in the audit store, reconciled, and only
    /// then checkpointed. Any fetch, decode or storage failure ends the run
    /// with the checkpoint at the last fully stored window.
    pub async fn scan_once(&self, cancel: &CancellationToken) -> Result<ScanReport> {
        let key = self.config.key();
        let mut report = ScanReport {
            vault_key: key.clone(),
            ..ScanReport::default()
        };
        let Some(_guard) = self.locks.try_acquire(&key) else {
            debug!("Scan of {} already running; skipping", key);
            report.skipped = true;
            return Ok(report);
        };

        match self
            .reconciler
            .retry_claimable_orphans(&self.config.vault_address)
            .await
        {
            Ok(summary) => report.orphans_retried = summary,
            Err(err) => warn!("Orphan retry for {} failed: {}", key, err),
        }

        let network = self.config.network.as_str();
        let vault = self.config.vault_address.as_str();
        let mut from = match self.checkpoints.get_checkpoint(network, vault)? {
            Some(checkpoint) => checkpoint.last_processed_block.saturating_add(1),
            None => self.config.start_block,
        };
        report.from_block = Some(from);

        let Some(head) = self
            .fetch_with_retry("latest block", cancel, || self.source.latest_block())
            .await?
        else {
            report.cancelled = true;
            return Ok(report);
        };

        let window = self.config.max_block_range.max(1);
        while from <= head {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let to = from.saturating_add(window - 1).min(head);

            let mut raw_logs = Vec::new();
            for kind in VaultEventKind::ALL {
                let what = format!("{} logs {}..={}", kind, from, to);
                let fetched = self
                    .fetch_with_retry(&what, cancel, || {
                        self.source.fetch_logs(vault, kind, from, to)
                    })
                    .await?;
                match fetched {
                    Some(logs) => raw_logs.extend(logs),
                    None => {
                        report.cancelled = true;
                        return Ok(report);
                    }
                }
            }

            let mut events = raw_logs
                .iter()
                .map(|raw| normalize(network, vault, raw))
                .collect::<Result<Vec<_>>>()?;
            events.sort_by_key(|e| (e.block_number, e.log_index));

            let now = Utc::now();
            let records: Vec<VaultAuditRecord> = events
                .into_iter()
                .map(|event| VaultAuditRecord::new(event, now))
                .collect();
            let inserted = self
                .audit_repository
                .record_events(records.clone())
                .await?;
            report.events_recorded += inserted;
            report
                .reconciled
                .merge(self.reconciler.reconcile_records(&records).await);

            let checkpoint = self
                .checkpoints
                .advance_checkpoint(network, vault, to)
                .await?;
            report.checkpoint = Some(checkpoint.last_processed_block);
            report.windows += 1;
            debug!(
                "Scanned {} blocks {}..={}: {} logs, {} new",
                key,
                from,
                to,
                records.len(),
                inserted
            );
            from = to.saturating_add(1);
            if to == u64::MAX {
                break;
            }
        }

        if report.windows > 0 {
            info!(
                "Scan of {} reached block {:?}: {} events recorded, {} matched, {} orphaned",
                key,
                report.checkpoint,
                report.events_recorded,
                report.reconciled.matched_transaction_ids.len(),
                report.reconciled.orphaned
            );
        }
        Ok(report)
    }
}
