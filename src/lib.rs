pub mod admin;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod ids;
pub mod records;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod users;
pub mod validate;

pub use crate::error::ServiceError;
pub use crate::state::AppState;
