pub mod dto;
pub mod repo;
pub mod services;

pub use repo::{AdminAccount, SystemSettings};
