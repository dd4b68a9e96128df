//! Savings transactions module - ledger entries and their read repository.

mod transactions_model;
mod transactions_traits;

pub use transactions_model::{
    ChainSubmission, SavingsTransaction, TransactionStatus, TransactionType, TransactionUpdate,
};
pub use transactions_traits::SavingsTransactionRepositoryTrait;
