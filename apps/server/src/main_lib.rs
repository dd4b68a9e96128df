use std::sync::Arc;

use crate::{config::Config, domain_events::WebDomainEventSink};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use vaultledger_chain::{HttpPriceOracle, RpcVaultEventSource};
use vaultledger_core::{
    events::DomainEventSink,
    goals::{GoalService, GoalServiceTrait},
    group_goals::{GroupGoalService, GroupGoalServiceTrait},
    ledger::LedgerConfig,
    transactions::SavingsTransactionRepositoryTrait,
    vault::{
        CheckpointRepositoryTrait, Reconciler, ScanLockRegistry, VaultAuditRepositoryTrait,
        VaultScanner,
    },
};
use vaultledger_storage_sqlite::{
    db, CheckpointRepository, GoalRepository, GroupGoalRepository, SavingsTransactionRepository,
    SqliteLedgerStore, VaultAuditRepository,
};

pub struct AppState {
    pub goal_service: Arc<dyn GoalServiceTrait>,
    pub group_goal_service: Arc<dyn GroupGoalServiceTrait>,
    pub transaction_repository: Arc<dyn SavingsTransactionRepositoryTrait>,
    pub audit_repository: Arc<dyn VaultAuditRepositoryTrait>,
    pub checkpoint_repository: Arc<dyn CheckpointRepositoryTrait>,
    pub reconciler: Arc<Reconciler>,
    /// One scanner per configured (network, vault).
    pub scanners: Vec<Arc<VaultScanner>>,
    pub ledger_config: LedgerConfig,
    pub db_path: String,
    /// Cancelled on shutdown; scans and the event worker stop on it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn scanner(&self, network: &str, vault_address: &str) -> Option<Arc<VaultScanner>> {
        let network = network.trim().to_lowercase();
        let vault_address = vault_address.trim().to_lowercase();
        self.scanners
            .iter()
            .find(|s| s.config().network == network && s.config().vault_address == vault_address)
            .cloned()
    }
}

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());

    let shutdown = CancellationToken::new();
    let domain_event_sink = Arc::new(WebDomainEventSink::new());
    domain_event_sink.start_worker(shutdown.clone());
    let event_sink: Arc<dyn DomainEventSink> = domain_event_sink;

    let transaction_repository = Arc::new(SavingsTransactionRepository::new(pool.clone()));
    let audit_repository = Arc::new(VaultAuditRepository::new(pool.clone(), writer.clone()));
    let checkpoint_repository = Arc::new(CheckpointRepository::new(pool.clone(), writer.clone()));
    let ledger_store = Arc::new(SqliteLedgerStore::new(writer.clone()));

    let mut goal_service = GoalService::new(
        Arc::new(GoalRepository::new(pool.clone(), writer.clone())),
        transaction_repository.clone(),
        ledger_store.clone(),
        event_sink.clone(),
        config.ledger.clone(),
    );
    if let Some(url) = &config.price_oracle_url {
        tracing::info!("Using price oracle at {}", url);
        goal_service = goal_service
            .with_price_oracle(Arc::new(HttpPriceOracle::new(url, config.request_timeout)?));
    }
    let goal_service: Arc<dyn GoalServiceTrait> = Arc::new(goal_service);

    let group_goal_service: Arc<dyn GroupGoalServiceTrait> = Arc::new(GroupGoalService::new(
        Arc::new(GroupGoalRepository::new(pool.clone(), writer.clone())),
        transaction_repository.clone(),
        ledger_store.clone(),
        event_sink.clone(),
        config.ledger.clone(),
    ));

    let reconciler = Arc::new(Reconciler::new(
        audit_repository.clone(),
        transaction_repository.clone(),
        ledger_store.clone(),
        goal_service.clone(),
        group_goal_service.clone(),
        event_sink.clone(),
    ));

    let locks = Arc::new(ScanLockRegistry::new());
    let mut scanners = Vec::with_capacity(config.vaults.len());
    for vault in &config.vaults {
        let source = RpcVaultEventSource::from_config(vault, config.request_timeout)?;
        scanners.push(Arc::new(VaultScanner::new(
            vault.clone(),
            Arc::new(source),
            checkpoint_repository.clone(),
            audit_repository.clone(),
            reconciler.clone(),
            locks.clone(),
        )));
        tracing::info!("Configured scanner for vault {}", vault.key());
    }

    Ok(Arc::new(AppState {
        goal_service,
        group_goal_service,
        transaction_repository,
        audit_repository,
        checkpoint_repository,
        reconciler,
        scanners,
        ledger_config: config.ledger.clone(),
        db_path,
        shutdown,
    }))
}
