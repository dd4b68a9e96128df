mod model;
mod repository;

pub use model::ScanCheckpointDB;
pub use repository::CheckpointRepository;
