//! Group goals module - multi-party ledger engine with membership lifecycle.

mod contribution_shares;
mod group_goals_model;
mod group_goals_service;
mod group_goals_traits;


pub use contribution_shares::allocate_percentages;
pub use group_goals_model::{
    GroupContributionRequest, GroupGoal, GroupGoalMember, GroupGoalWithTransaction,
    GroupLeaveResult, MemberRole, MemberStatus, NewGroupGoal,
};
pub use group_goals_service::GroupGoalService;
pub use group_goals_traits::{GroupGoalRepositoryTrait, GroupGoalServiceTrait};
