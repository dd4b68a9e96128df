use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState, models::FailTransactionRequest};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use vaultledger_core::transactions::{ChainSubmission, SavingsTransaction};

async fn get_transaction(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SavingsTransaction>> {
    Ok(Json(state.transaction_repository.get_transaction(&id)?))
}

/// Records the signing layer's hash for a pending transaction created
/// without one.
async fn attach_submission(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChainSubmission>,
) -> ApiResult<Json<SavingsTransaction>> {
    let tx = state.reconciler.attach_chain_submission(&id, body).await?;
    Ok(Json(tx))
}

async fn fail_transaction(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<FailTransactionRequest>,
) -> ApiResult<Json<SavingsTransaction>> {
    let tx = state.reconciler.fail_transaction(&id, &body.reason).await?;
    Ok(Json(tx))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transactions/{id}", get(get_transaction))
        .route("/transactions/{id}/submission", post(attach_submission))
        .route("/transactions/{id}/fail", post(fail_transaction))
}
