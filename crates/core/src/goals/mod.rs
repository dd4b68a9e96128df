//! Goals module - single-owner ledger engine, models and traits.

mod goals_model;
mod goals_service;
mod goals_traits;

#[cfg(test)]
mod goals_service_tests;

pub use goals_model::{
    compute_progress, Goal, GoalDepositRequest, GoalStatus, GoalTransferRequest,
    GoalTransferResult, GoalValuation, GoalWithTransaction, GoalWithdrawalRequest,
    InterestAccrual, NewGoal, TokenIdentity,
};
pub use goals_service::GoalService;
pub use goals_traits::{GoalRepositoryTrait, GoalServiceTrait};
