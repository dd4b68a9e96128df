mod model;
pub(crate) mod repository;

pub use model::SavingsTransactionDB;
pub use repository::SavingsTransactionRepository;
