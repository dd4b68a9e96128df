use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    models::{EventsQuery, VaultStatus},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use vaultledger_core::vault::{ReconcileSummary, ScanCheckpoint, ScanReport, VaultAuditRecord};

const DEFAULT_EVENT_LIMIT: i64 = 100;
const MAX_EVENT_LIMIT: i64 = 1_000;

async fn list_vaults(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<VaultStatus>>> {
    let mut vaults = Vec::with_capacity(state.scanners.len());
    for scanner in &state.scanners {
        let config = scanner.config();
        let checkpoint = state
            .checkpoint_repository
            .get_checkpoint(&config.network, &config.vault_address)?;
        vaults.push(VaultStatus::new(config, checkpoint));
    }
    Ok(Json(vaults))
}

async fn get_checkpoint(
    Path((network, vault)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ScanCheckpoint>> {
    state
        .checkpoint_repository
        .get_checkpoint(&network.to_lowercase(), &vault.to_lowercase())?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn list_events(
    Path((network, vault)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<VaultAuditRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    if !(1..=MAX_EVENT_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_EVENT_LIMIT
        )));
    }
    let events = state.audit_repository.list_events(
        &network.to_lowercase(),
        &vault.to_lowercase(),
        limit,
    )?;
    Ok(Json(events))
}

/// Runs a scan now instead of waiting for the next tick.
async fn scan_now(
    Path((network, vault)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ScanReport>> {
    let scanner = state.scanner(&network, &vault).ok_or(ApiError::NotFound)?;
    let report = scanner.scan_once(&state.shutdown.child_token()).await?;
    Ok(Json(report))
}

async fn retry_orphans(
    Path((network, vault)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ReconcileSummary>> {
    let scanner = state.scanner(&network, &vault).ok_or(ApiError::NotFound)?;
    let summary = state
        .reconciler
        .retry_orphans(Some(scanner.config().vault_address.as_str()))
        .await?;
    Ok(Json(summary))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vaults", get(list_vaults))
        .route("/vaults/{network}/{vault}/checkpoint", get(get_checkpoint))
        .route("/vaults/{network}/{vault}/events", get(list_events))
        .route("/vaults/{network}/{vault}/scan", post(scan_now))
        .route("/vaults/{network}/{vault}/orphans/retry", post(retry_orphans))
}
