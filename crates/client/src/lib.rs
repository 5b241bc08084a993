//! Network access for the PayLater offline cache.
//!
//! This crate provides the `Network` seam the worker fetches through, its
//! reqwest-backed implementation, and locator resolution.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, is_interceptable, resolve};
