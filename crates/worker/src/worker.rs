//! The offline worker: one cache generation and its event handlers.

use crate::lifecycle::{StateCell, WorkerState};
use crate::manifest::PrecacheManifest;
use crate::strategy::{Interception, ResponseSource, Strategy};
use crate::writes::PendingWrites;
use futures_util::future::try_join_all;
use paylater_client::Network;
use paylater_core::{CacheDb, Error, Request, Response};
use std::sync::Arc;

/// Handles install, activate and fetch events for one generation.
///
/// Shared behind `Arc` by every in-flight request; the only mutable state it
/// touches is its lifecycle state and the cache store.
pub struct OfflineWorker {
    db: CacheDb,
    network: Arc<dyn Network>,
    manifest: PrecacheManifest,
    state: StateCell,
    writes: PendingWrites,
}

impl OfflineWorker {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, manifest: PrecacheManifest) -> Self {
        Self::with_state(db, network, manifest, WorkerState::Uninitialized)
    }

    /// A worker whose generation was activated by an earlier process.
    pub(crate) fn resumed(db: CacheDb, network: Arc<dyn Network>, manifest: PrecacheManifest) -> Self {
        Self::with_state(db, network, manifest, WorkerState::Active)
    }

    fn with_state(db: CacheDb, network: Arc<dyn Network>, manifest: PrecacheManifest, state: WorkerState) -> Self {
        Self { db, network, manifest, state: StateCell::new(state), writes: PendingWrites::default() }
    }

    pub fn generation(&self) -> &str {
        self.manifest.generation()
    }

    pub fn manifest(&self) -> &PrecacheManifest {
        &self.manifest
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Install event: open this generation's store and precache the manifest.
    ///
    /// All-or-nothing: if any resource cannot be fetched, or answers with a
    /// status that cannot be cached, nothing further is written and the
    /// worker returns to `Uninitialized` so the install can be retried.
    /// Entries written by an earlier attempt are left in place.
    pub async fn install(&self) -> Result<(), Error> {
        self.state.advance(WorkerState::Uninitialized, WorkerState::Installing)?;

        match self.precache().await {
            Ok(count) => {
                self.state.advance(WorkerState::Installing, WorkerState::Installed)?;
                tracing::info!(generation = self.generation(), entries = count, "cache installed");
                Ok(())
            }
            Err(e) => {
                self.state.force(WorkerState::Uninitialized);
                tracing::error!(generation = self.generation(), code = e.code(), error = %e, "cache installation failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let generation = self.generation();
        self.db.open_store(generation).await?;

        let fetches = self.manifest.entries().iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { locator: url.to_string(), reason: e.to_string() })?;
            if !response.is_ok() || !response.is_cacheable() {
                return Err(Error::InstallFailed {
                    locator: url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok::<_, Error>((request, response))
        });
        let fetched = try_join_all(fetches).await?;

        for (request, response) in &fetched {
            self.db
                .put_entry(generation, &request.method, request.url.as_str(), response)
                .await
                .map_err(|e| Error::InstallFailed { locator: request.url.to_string(), reason: e.to_string() })?;
        }

        Ok(fetched.len())
    }

    /// Activate event: delete every store but this generation's and record
    /// this generation as the one controlling requests.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.state.advance(WorkerState::Installed, WorkerState::Activating)?;

        match self.evict_stale_stores().await {
            Ok(deleted) => {
                self.state.advance(WorkerState::Activating, WorkerState::Active)?;
                tracing::info!(generation = self.generation(), deleted = deleted.len(), "cache activated");
                Ok(deleted)
            }
            Err(e) => {
                self.state.force(WorkerState::Installed);
                tracing::error!(generation = self.generation(), code = e.code(), error = %e, "cache activation failed");
                Err(e)
            }
        }
    }

    async fn evict_stale_stores(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.db.store_names().await? {
            if name == self.generation() {
                continue;
            }
            if self.db.delete_store(&name).await? {
                tracing::debug!(store = %name, "deleted stale cache store");
                deleted.push(name);
            }
        }
        self.db.set_active_generation(self.generation()).await?;
        Ok(deleted)
    }

    /// Fetch event.
    ///
    /// Never fails: errors are absorbed into the fallback tiers, and when
    /// every tier fails the result is `Interception::Unavailable`.
    pub async fn handle_fetch(&self, request: &Request) -> Interception {
        if !self.state().can_intercept() {
            return Interception::Passthrough;
        }

        match Strategy::for_request(request) {
            None => Interception::Passthrough,
            Some(Strategy::NetworkFirst) => self.network_first(request).await,
            Some(Strategy::CacheFirst) => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &Request) -> Interception {
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_copy(request, &response);
                Interception::respond(ResponseSource::Network, response)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network unavailable, trying cache");
                match self.lookup(request).await {
                    Some(cached) => Interception::respond(ResponseSource::Cache, cached),
                    None => self.offline_fallback().await,
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Interception {
        if let Some(cached) = self.lookup(request).await {
            return Interception::respond(ResponseSource::Cache, cached);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.store_copy(request, &response);
                Interception::respond(ResponseSource::Network, response)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "cache miss and network unavailable");
                self.offline_fallback().await
            }
        }
    }

    /// Store read; a failing read counts as a miss.
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self
            .db
            .match_entry(self.generation(), &request.method, request.url.as_str())
            .await
        {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn offline_fallback(&self) -> Interception {
        let placeholder = Request::get(self.manifest.offline_url().clone());
        match self.lookup(&placeholder).await {
            Some(response) => Interception::respond(ResponseSource::Offline, response),
            None => {
                tracing::warn!(offline_url = %placeholder.url, "offline placeholder is not cached");
                Interception::Unavailable
            }
        }
    }

    /// Queue a copy of `response` for the store without delaying the caller.
    /// A worker that has been retired mid-request writes nothing, so it
    /// cannot recreate a store its successor evicted.
    fn store_copy(&self, request: &Request, response: &Response) {
        if !self.state().can_intercept() {
            tracing::debug!(url = %request.url, generation = self.generation(), "worker retired, response not cached");
            return;
        }
        if !response.is_cacheable() {
            tracing::debug!(url = %request.url, status = response.status, "response not cacheable");
            return;
        }

        let db = self.db.clone();
        let store = self.generation().to_string();
        let method = request.method.clone();
        let url = request.url.to_string();
        let response = response.clone();

        self.writes.spawn(async move {
            if let Err(e) = db.put_entry(&store, &method, &url, &response).await {
                tracing::warn!(store = %store, url = %url, error = %e, "failed to cache response");
            }
        });
    }

    /// Wait for queued cache writes to finish.
    pub async fn settle(&self) {
        self.writes.settle().await;
    }

    /// Mark this worker as replaced by a newer generation.
    pub(crate) fn retire(&self) {
        self.state.force(WorkerState::Redundant);
    }

    /// Hand control back after the successor failed to activate.
    pub(crate) fn reinstate(&self) {
        self.state.force(WorkerState::Active);
    }
}
