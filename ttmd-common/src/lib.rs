//! # TTMD Common Library
//!
//! Shared code for the TTMD mirror service:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Database pool and schema initialization

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
