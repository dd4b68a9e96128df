mod model;
pub(crate) mod repository;

pub use model::{GroupGoalDB, GroupGoalMemberDB};
pub use repository::GroupGoalRepository;
