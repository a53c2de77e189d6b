pub mod dto;
pub mod password;
pub mod repo;
pub mod services;

pub use repo::User;
