use std::sync::Arc;

use crate::{
    error::ApiResult,
    main_lib::AppState,
    models::{AmountRequest, InterestRequest, OwnerQuery, QuickSaveRequest, StatusUpdate, ValuationQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use vaultledger_core::goals::{
    Goal, GoalDepositRequest, GoalTransferRequest, GoalTransferResult, GoalValuation,
    GoalWithTransaction, GoalWithdrawalRequest, InterestAccrual, NewGoal,
};
use vaultledger_core::transactions::SavingsTransaction;

async fn list_goals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Json<Vec<Goal>>> {
    let goals = state.goal_service.list_goals(&query.owner_id)?;
    Ok(Json(goals))
}

async fn create_goal(
    State(state): State<Arc<AppState>>,
    Json(goal): Json<NewGoal>,
) -> ApiResult<Json<Goal>> {
    let g = state.goal_service.create_goal(goal).await?;
    Ok(Json(g))
}

async fn ensure_quick_save_goal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuickSaveRequest>,
) -> ApiResult<Json<Goal>> {
    let g = state
        .goal_service
        .ensure_quick_save_goal(&body.owner_id, body.token)
        .await?;
    Ok(Json(g))
}

async fn get_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Goal>> {
    Ok(Json(state.goal_service.get_goal(&id)?))
}

async fn delete_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.goal_service.delete_goal(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_goal_status(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Json<Goal>> {
    let g = state.goal_service.update_goal_status(&id, body.status).await?;
    Ok(Json(g))
}

async fn deposit(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<Json<GoalWithTransaction>> {
    let result = state
        .goal_service
        .deposit_to_goal(GoalDepositRequest {
            goal_id: id,
            amount: body.amount,
            submission: body.submission,
        })
        .await?;
    Ok(Json(result))
}

async fn withdraw(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<Json<GoalWithTransaction>> {
    let result = state
        .goal_service
        .withdraw_from_goal(GoalWithdrawalRequest {
            goal_id: id,
            amount: body.amount,
            submission: body.submission,
        })
        .await?;
    Ok(Json(result))
}

async fn transfer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoalTransferRequest>,
) -> ApiResult<Json<GoalTransferResult>> {
    let result = state.goal_service.transfer_between_goals(body).await?;
    Ok(Json(result))
}

async fn calculate_interest(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<InterestRequest>,
) -> ApiResult<Json<InterestAccrual>> {
    let as_of = body.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let result = state.goal_service.calculate_interest(&id, as_of).await?;
    Ok(Json(result))
}

async fn value_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValuationQuery>,
) -> ApiResult<Json<GoalValuation>> {
    let valuation = state.goal_service.value_goal(&id, &query.quote).await?;
    Ok(Json(valuation))
}

async fn list_goal_transactions(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<SavingsTransaction>>> {
    Ok(Json(state.goal_service.list_goal_transactions(&id)?))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/goals", get(list_goals).post(create_goal))
        .route("/goals/quick-save", post(ensure_quick_save_goal))
        .route("/goals/transfers", post(transfer))
        .route("/goals/{id}", get(get_goal).delete(delete_goal))
        .route("/goals/{id}/status", put(update_goal_status))
        .route("/goals/{id}/deposits", post(deposit))
        .route("/goals/{id}/withdrawals", post(withdraw))
        .route("/goals/{id}/interest", post(calculate_interest))
        .route("/goals/{id}/valuation", get(value_goal))
        .route("/goals/{id}/transactions", get(list_goal_transactions))
}
