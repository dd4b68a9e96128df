mod model;
pub(crate) mod repository;

pub use model::GoalDB;
pub use repository::GoalRepository;
