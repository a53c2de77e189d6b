pub mod repo;
pub mod services;

pub use repo::HistoryEntry;
