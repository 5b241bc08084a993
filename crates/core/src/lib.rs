//! Core types and shared functionality for the PayLater offline cache.
//!
//! This crate provides:
//! - Cache storage with SQLite backend
//! - Request/response model
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod resource;

pub use cache::{CacheDb, StoreInfo};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use resource::{Request, RequestMode, Response};
