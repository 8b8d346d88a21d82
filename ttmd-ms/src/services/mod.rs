//! External API clients

pub mod github_client;
pub mod ncm_client;
