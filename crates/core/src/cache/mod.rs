//! SQLite-backed cache storage.
//!
//! Models the browser cache-storage API on top of a single SQLite file with
//! async access via tokio-rusqlite:
//!
//! - Named stores, one per cache generation
//! - Entries keyed by SHA-256 of method and URL, overwrite on put
//! - Whole-store deletion for generation eviction
//! - The active-generation record that survives restarts

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod registration;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use stores::StoreInfo;
