use std::sync::Arc;

use crate::{
    error::ApiResult,
    main_lib::AppState,
    models::{ApproveMemberRequest, ContributionRequest, TransferOwnershipRequest, UserQuery},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use vaultledger_core::group_goals::{
    GroupContributionRequest, GroupGoal, GroupGoalWithTransaction, GroupLeaveResult, NewGroupGoal,
};
use vaultledger_core::transactions::SavingsTransaction;

async fn list_group_goals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Vec<GroupGoal>>> {
    Ok(Json(state.group_goal_service.list_group_goals(&query.user_id)?))
}

async fn create_group_goal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewGroupGoal>,
) -> ApiResult<Json<GroupGoal>> {
    Ok(Json(state.group_goal_service.create_group_goal(body).await?))
}

async fn get_group_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<GroupGoal>> {
    Ok(Json(state.group_goal_service.get_group_goal(&id)?))
}

async fn join_group_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UserQuery>,
) -> ApiResult<Json<GroupGoal>> {
    let group = state
        .group_goal_service
        .join_group_goal(&id, &body.user_id)
        .await?;
    Ok(Json(group))
}

async fn approve_member(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApproveMemberRequest>,
) -> ApiResult<Json<GroupGoal>> {
    let group = state
        .group_goal_service
        .approve_member(&id, &body.approver_id, &body.user_id)
        .await?;
    Ok(Json(group))
}

async fn transfer_ownership(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<TransferOwnershipRequest>,
) -> ApiResult<Json<GroupGoal>> {
    let group = state
        .group_goal_service
        .transfer_ownership(&id, &body.owner_id, &body.new_owner_id)
        .await?;
    Ok(Json(group))
}

async fn leave_group_goal(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<UserQuery>,
) -> ApiResult<Json<GroupLeaveResult>> {
    let result = state
        .group_goal_service
        .leave_group_goal(&id, &body.user_id)
        .await?;
    Ok(Json(result))
}

async fn contribute(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ContributionRequest>,
) -> ApiResult<Json<GroupGoalWithTransaction>> {
    let result = state
        .group_goal_service
        .contribute_to_group_goal(GroupContributionRequest {
            group_goal_id: id,
            user_id: body.user_id,
            amount: body.amount,
            submission: body.submission,
        })
        .await?;
    Ok(Json(result))
}

async fn list_group_goal_transactions(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<SavingsTransaction>>> {
    Ok(Json(
        state.group_goal_service.list_group_goal_transactions(&id)?,
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/group-goals", get(list_group_goals).post(create_group_goal))
        .route("/group-goals/{id}", get(get_group_goal))
        .route("/group-goals/{id}/join", post(join_group_goal))
        .route("/group-goals/{id}/approve", post(approve_member))
        .route("/group-goals/{id}/transfer-ownership", post(transfer_ownership))
        .route("/group-goals/{id}/leave", post(leave_group_goal))
        .route("/group-goals/{id}/contributions", post(contribute))
        .route(
            "/group-goals/{id}/transactions",
            get(list_group_goal_transactions),
        )
}
