pub mod backup;
pub mod documents;

pub use backup::BackupManager;
pub use documents::DocumentStore;
