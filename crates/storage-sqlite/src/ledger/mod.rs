mod repository;

pub use repository::SqliteLedgerStore;
