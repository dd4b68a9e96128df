mod model;
pub(crate) mod repository;

pub use model::VaultEventDB;
pub use repository::VaultAuditRepository;
