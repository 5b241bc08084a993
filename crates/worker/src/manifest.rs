//! The precache manifest of one generation.

use paylater_client::resolve;
use paylater_core::{AppConfig, Error};
use url::Url;

/// Resolved resources a generation stores at install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheManifest {
    generation: String,
    offline_url: Url,
    entries: Vec<Url>,
}

impl PrecacheManifest {
    /// Resolve `locators` and `offline_locator` against `origin`.
    ///
    /// Duplicate locators collapse to their first occurrence.
    pub fn new<S: AsRef<str>>(
        generation: &str, origin: &Url, locators: &[S], offline_locator: &str,
    ) -> Result<Self, Error> {
        let generation = generation.trim();
        if generation.is_empty() {
            return Err(Error::InvalidInput("generation must not be empty".into()));
        }

        let mut entries: Vec<Url> = Vec::with_capacity(locators.len());
        for locator in locators {
            let url = resolve_locator(origin, locator.as_ref())?;
            if entries.contains(&url) {
                tracing::debug!(%url, "duplicate precache locator ignored");
                continue;
            }
            entries.push(url);
        }

        let offline_url = resolve_locator(origin, offline_locator)?;

        Ok(Self { generation: generation.to_string(), offline_url, entries })
    }

    /// Build the manifest described by the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin =
            Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin {}: {e}", config.origin)))?;
        Self::new(&config.generation, &origin, &config.precache, &config.offline_url)
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn offline_url(&self) -> &Url {
        &self.offline_url
    }

    pub fn entries(&self) -> &[Url] {
        &self.entries
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.entries.contains(url)
    }
}

fn resolve_locator(origin: &Url, locator: &str) -> Result<Url, Error> {
    resolve(origin, locator).map_err(|e| Error::InvalidUrl(format!("{locator}: {e}")))
}
