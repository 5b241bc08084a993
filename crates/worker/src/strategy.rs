//! Request classification and interception outcomes.

use paylater_client::is_interceptable;
use paylater_core::{Request, Response};
use std::fmt;

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Try the network, fall back to the store, then the offline page.
    NetworkFirst,
    /// Try the store, fall back to the network, then the offline page.
    CacheFirst,
}

impl Strategy {
    /// Pick the strategy for a request, or None if the worker must leave it
    /// to the environment (non-GET methods and non-http(s) schemes).
    pub fn for_request(request: &Request) -> Option<Self> {
        if !request.is_get() || !is_interceptable(&request.url) {
            return None;
        }
        if request.is_navigation() { Some(Strategy::NetworkFirst) } else { Some(Strategy::CacheFirst) }
    }
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The offline placeholder, served because nothing better was available.
    Offline,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Network => f.write_str("network"),
            ResponseSource::Cache => f.write_str("cache"),
            ResponseSource::Offline => f.write_str("offline"),
        }
    }
}

/// Result of dispatching a fetch event to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Not handled; the environment performs its default request.
    Passthrough,
    /// Handled with a response.
    Respond { response: Response, source: ResponseSource },
    /// Handled, but every tier failed; the request fails like a network error.
    Unavailable,
}

impl Interception {
    pub(crate) fn respond(source: ResponseSource, response: Response) -> Self {
        Interception::Respond { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            Interception::Respond { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Interception::Respond { source, .. } => Some(*source),
            _ => None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Interception::Passthrough)
    }
}
