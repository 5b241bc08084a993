//! Request and response model shared by the worker, the network client and
//! the cache store.

use serde::{Deserialize, Serialize};
use url::Url;

/// How a request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    /// Script, stylesheet, image, font and everything else a page pulls in.
    Resource,
}

/// An outgoing request seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
}

impl Request {
    /// Build a request. The method is normalized to upper case and the URL
    /// fragment is dropped, since fragments never reach the network.
    pub fn new(method: &str, mut url: Url, mode: RequestMode) -> Self {
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url, mode }
    }

    /// A GET sub-resource request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Resource)
    }

    /// A GET navigation request.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response, either fresh from the network or replayed from a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// A 200 response with the given body and no headers.
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), status: 200, headers: Vec::new(), body: body.into() }
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response may be written to a store. Error statuses are
    /// stored like any other answer; partial content can never be replayed
    /// as a whole resource.
    pub fn is_cacheable(&self) -> bool {
        self.status != 206
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
