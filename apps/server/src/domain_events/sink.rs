use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultledger_core::events::{DomainEvent, DomainEventSink};

/// Sink used by the server. Events are buffered in a channel until
/// [`WebDomainEventSink::start_worker`] is called.
pub struct WebDomainEventSink {
    tx: mpsc::UnboundedSender<DomainEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<DomainEvent>>>,
}

impl WebDomainEventSink {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Starts the worker. Calling it a second time does nothing.
    pub fn start_worker(&self, shutdown: CancellationToken) {
        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(mut rx) = rx else {
            warn!("Domain event worker already started");
            return;
        };
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => log_event(&event),
                        None => break,
                    },
                }
            }
            debug!("Domain event worker stopped");
        });
    }
}

impl Default for WebDomainEventSink {
    fn default() -> Self {
        Self::new()
    }
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::GoalsChanged { goal_ids } => {
            debug!(goal_ids = ?goal_ids, "goals changed");
        }
        DomainEvent::GroupGoalChanged { group_goal_id } => {
            debug!(group_goal_id = %group_goal_id, "group goal changed");
        }
        DomainEvent::TransactionsReconciled {
            vault_address,
            transaction_ids,
        } => {
            info!(
                vault = %vault_address,
                count = transaction_ids.len(),
                "transactions reconciled"
            );
        }
        DomainEvent::OrphanEventsRecorded {
            vault_address,
            count,
        } => {
            warn!(vault = %vault_address, count = *count, "vault events left orphaned");
        }
    }
}

impl DomainEventSink for WebDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        // Only fails once the worker is gone, i.e. during shutdown.
        let _ = self.tx.send(event);
    }
}
