//! Offline resource cache worker.
//!
//! Mirrors the three events a browser dispatches to a service worker:
//!
//! - **install**: precache the manifest into the generation's store
//! - **activate**: delete every other generation's store and claim requests
//! - **fetch**: answer GET requests network-first (navigations) or
//!   cache-first (everything else), falling back to the offline placeholder
//!
//! `Registration` plays the controlling environment: it dispatches those
//! events and routes requests to whichever worker is active.

pub mod lifecycle;
pub mod manifest;
pub mod registration;
pub mod strategy;
pub mod worker;
pub mod writes;

#[cfg(test)]
pub(crate) mod testing;

pub use lifecycle::WorkerState;
pub use manifest::PrecacheManifest;
pub use registration::Registration;
pub use strategy::{Interception, ResponseSource, Strategy};
pub use worker::OfflineWorker;
