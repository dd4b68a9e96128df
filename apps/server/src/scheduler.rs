//! Background scheduler for vault scanning.
//!
//! Every configured vault gets its own loop; vaults scan concurrently and a
//! slow or failing vault never delays another.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use vaultledger_core::vault::VaultScanner;

use crate::main_lib::AppState;

/// Spawns one scan loop per configured vault. The loops stop when
/// `state.shutdown` is cancelled.
pub fn start_vault_scanners(state: Arc<AppState>) -> Vec<JoinHandle<()>> {
    state
        .scanners
        .iter()
        .cloned()
        .map(|scanner| {
            let shutdown = state.shutdown.clone();
            tokio::spawn(async move { run_scan_loop(scanner, shutdown).await })
        })
        .collect()
}

async fn run_scan_loop(scanner: Arc<VaultScanner>, shutdown: CancellationToken) {
    let key = scanner.config().key();
    let period = Duration::from_secs(scanner.config().poll_interval_secs.max(1));
    info!("Vault scanner {} started ({:?} interval)", key, period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        run_scheduled_scan(&scanner, &shutdown).await;
    }
    info!("Vault scanner {} stopped", key);
}

/// Runs a single scheduled scan.
async fn run_scheduled_scan(scanner: &VaultScanner, shutdown: &CancellationToken) {
    match scanner.scan_once(shutdown).await {
        Ok(report) if report.skipped => {
            debug!("Scan of {} skipped: previous run still active", report.vault_key);
        }
        Ok(report) => {
            debug!(
                "Scan of {} covered {} windows up to {:?}: {} events, {} matched, {} orphaned",
                report.vault_key,
                report.windows,
                report.checkpoint,
                report.events_recorded,
                report.reconciled.matched_transaction_ids.len(),
                report.reconciled.orphaned
            );
        }
        Err(e) => {
            error!("Scan of {} failed: {}", scanner.config().key(), e);
        }
    }
}
