//! Locator resolution for manifests and intercepted requests.

use url::Url;

/// Error type for locator resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty locator")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid locator: {0}")]
    InvalidUrl(String),
}

/// Resolve a locator against `base`.
///
/// Absolute URLs are taken as-is, anything else (`/app.js`, `offline.html`)
/// is joined onto `base`. Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Lowercase the host
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
///
/// Only http and https results are accepted.
pub fn resolve(base: &Url, locator: &str) -> Result<Url, UrlError> {
    let trimmed = locator.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    if !is_interceptable(&parsed) {
        return Err(UrlError::UnsupportedScheme(parsed.scheme().to_string()));
    }

    if let Some(host) = parsed.host_str() {
        let host = host.to_lowercase();
        parsed
            .set_host(Some(&host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether requests to this URL go through the cache at all. Extension,
/// data and blob URLs are left to the environment.
pub fn is_interceptable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
