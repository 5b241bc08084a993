//! The controlling environment: dispatches lifecycle events and routes
//! fetches to the active worker.

use crate::manifest::PrecacheManifest;
use crate::strategy::Interception;
use crate::worker::OfflineWorker;
use paylater_client::Network;
use paylater_core::{CacheDb, Error, Request};
use std::sync::{Arc, PoisonError, RwLock};

/// Owns the active worker for one scope.
pub struct Registration {
    db: CacheDb,
    network: Arc<dyn Network>,
    active: RwLock<Option<Arc<OfflineWorker>>>,
}

impl Registration {
    /// A registration with no active worker.
    pub fn new(db: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { db, network, active: RwLock::new(None) }
    }

    /// Pick up the worker a previous process activated, if it belongs to
    /// `manifest`'s generation and its store still exists.
    pub async fn restore(db: CacheDb, network: Arc<dyn Network>, manifest: PrecacheManifest) -> Result<Self, Error> {
        let registration = Self::new(db.clone(), Arc::clone(&network));

        match db.active_generation().await? {
            Some(generation) if generation == manifest.generation() && db.has_store(&generation).await? => {
                tracing::debug!(generation = %generation, "restored active worker");
                let worker = OfflineWorker::resumed(db, network, manifest);
                registration.set_active(Some(Arc::new(worker)));
            }
            Some(generation) => {
                tracing::info!(
                    active = %generation,
                    configured = manifest.generation(),
                    "active generation differs from configuration; register to update"
                );
            }
            None => tracing::debug!("no active worker recorded"),
        }

        Ok(registration)
    }

    /// Install a worker for `manifest` and, since it skips waiting, activate
    /// it right away.
    ///
    /// The previous worker serves until the install succeeds. It is retired
    /// and its queued writes settled before activation evicts its store; if
    /// activation then fails it is reinstated.
    pub async fn register(&self, manifest: PrecacheManifest) -> Result<Arc<OfflineWorker>, Error> {
        let worker = Arc::new(OfflineWorker::new(self.db.clone(), Arc::clone(&self.network), manifest));

        worker.install().await?;

        let previous = self.set_active(Some(Arc::clone(&worker)));
        if let Some(previous) = &previous {
            previous.retire();
            previous.settle().await;
            tracing::debug!(generation = previous.generation(), "previous worker is redundant");
        }

        if let Err(e) = worker.activate().await {
            if let Some(previous) = &previous {
                previous.reinstate();
                tracing::warn!(generation = previous.generation(), "previous worker reinstated");
            }
            self.set_active(previous);
            return Err(e);
        }

        Ok(worker)
    }

    /// The worker currently controlling requests.
    pub fn active(&self) -> Option<Arc<OfflineWorker>> {
        self.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Dispatch a fetch event. Without an active worker every request passes
    /// through.
    pub async fn dispatch_fetch(&self, request: &Request) -> Interception {
        match self.active() {
            Some(worker) => worker.handle_fetch(request).await,
            None => Interception::Passthrough,
        }
    }

    /// Wait for the active worker's queued cache writes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active() {
            worker.settle().await;
        }
    }

    fn set_active(&self, worker: Option<Arc<OfflineWorker>>) -> Option<Arc<OfflineWorker>> {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *active, worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::WorkerState;
    use crate::strategy::ResponseSource;
    use crate::testing::{FileCache, MockNetwork, origin, url};
    use paylater_core::Response;

    fn manifest(generation: &str, locators: &[&str]) -> PrecacheManifest {
        PrecacheManifest::new(generation, &origin(), locators, "/offline.html").unwrap()
    }

    fn shell_network() -> Arc<MockNetwork> {
        let network = MockNetwork::new();
        network.route("/", "<h1>home</h1>");
        network.route("/app.js", "console.log('v1')");
        network.route("/offline.html", "<h1>offline</h1>");
        network
    }

    #[tokio::test]
    async fn test_upgrade_scenario() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v0", "GET", url("/app.js").as_str(), &Response::ok(url("/app.js").as_str(), "stale"))
            .await
            .unwrap();
        let network = shell_network();
        let registration = Registration::new(db.clone(), network.clone());

        registration
            .register(manifest("v1", &["/app.js", "/offline.html"]))
            .await
            .unwrap();

        assert_eq!(db.store_names().await.unwrap(), vec!["v1".to_string()]);

        network.set_offline(true);
        let outcome = registration.dispatch_fetch(&Request::navigate(url("/"))).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Offline));
        assert_eq!(outcome.response().unwrap().text(), "<h1>offline</h1>");

        let script = registration.dispatch_fetch(&Request::get(url("/app.js"))).await;
        assert_eq!(script.response().unwrap().text(), "console.log('v1')");
    }

    #[tokio::test]
    async fn test_no_active_worker_passes_through() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        let registration = Registration::new(db, network.clone());

        let outcome = registration.dispatch_fetch(&Request::navigate(url("/"))).await;
        assert!(outcome.is_passthrough());
        assert!(network.calls().is_empty());
    }

    #[tokio::test]
    async fn test_new_generation_retires_previous_worker() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        let registration = Registration::new(db.clone(), network.clone());

        let v1 = registration.register(manifest("v1", &["/", "/offline.html"])).await.unwrap();
        let v2 = registration.register(manifest("v2", &["/", "/app.js", "/offline.html"])).await.unwrap();

        assert_eq!(v1.state(), WorkerState::Redundant);
        assert_eq!(v2.state(), WorkerState::Active);
        assert_eq!(registration.active().unwrap().generation(), "v2");
        assert_eq!(db.store_names().await.unwrap(), vec!["v2".to_string()]);
        assert_eq!(db.active_generation().await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_worker() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        let registration = Registration::new(db.clone(), network.clone());
        registration.register(manifest("v1", &["/", "/offline.html"])).await.unwrap();

        let result = registration.register(manifest("v2", &["/", "/missing.css"])).await;

        assert!(matches!(result, Err(Error::InstallFailed { .. })));
        let active = registration.active().unwrap();
        assert_eq!(active.generation(), "v1");
        assert_eq!(active.state(), WorkerState::Active);
        assert_eq!(db.active_generation().await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_restore_resumes_active_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        Registration::new(db.clone(), network.clone())
            .register(manifest("v1", &["/", "/offline.html"]))
            .await
            .unwrap();

        let restored = Registration::restore(db, network.clone(), manifest("v1", &["/", "/offline.html"]))
            .await
            .unwrap();
        network.set_offline(true);

        let worker = restored.active().unwrap();
        assert_eq!(worker.state(), WorkerState::Active);
        let outcome = restored.dispatch_fetch(&Request::navigate(url("/"))).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    }

    #[tokio::test]
    async fn test_restore_ignores_other_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        Registration::new(db.clone(), network.clone())
            .register(manifest("v1", &["/"]))
            .await
            .unwrap();

        let restored = Registration::restore(db, network, manifest("v2", &["/"])).await.unwrap();
        assert!(restored.active().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_and_settle() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        let registration = Arc::new(Registration::new(db.clone(), network.clone()));
        registration.register(manifest("v1", &["/", "/offline.html"])).await.unwrap();
        network.route("/styles.css", "body {}");

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let registration = Arc::clone(&registration);
                tokio::spawn(async move { registration.dispatch_fetch(&Request::get(url("/styles.css"))).await })
            })
            .collect();
        for task in tasks {
            let outcome = task.await.unwrap();
            assert_eq!(outcome.response().unwrap().text(), "body {}");
        }

        registration.settle().await;
        let cached = db.match_entry("v1", "GET", url("/styles.css").as_str()).await.unwrap();
        assert_eq!(cached.map(|r| r.text()).as_deref(), Some("body {}"));
    }

    #[tokio::test]
    async fn test_previous_worker_writes_settle_before_eviction() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = shell_network();
        let registration = Registration::new(db.clone(), network.clone());
        let v1 = registration.register(manifest("v1", &["/", "/offline.html"])).await.unwrap();
        network.route("/styles.css", "body {}");

        // leaves a write queued on v1
        v1.handle_fetch(&Request::get(url("/styles.css"))).await;
        registration.register(manifest("v2", &["/", "/offline.html"])).await.unwrap();
        v1.settle().await;

        assert_eq!(db.store_names().await.unwrap(), vec!["v2".to_string()]);
        assert!(v1.handle_fetch(&Request::get(url("/styles.css"))).await.is_passthrough());
        assert_eq!(db.store_names().await.unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_activation_reinstates_previous_worker() {
        let cache = FileCache::open("failed-activation").await;
        let network = shell_network();
        let registration = Registration::new(cache.db.clone(), network.clone());
        registration.register(manifest("v1", &["/", "/offline.html"])).await.unwrap();
        cache
            .execute(
                "CREATE TRIGGER keep_stores BEFORE DELETE ON cache_stores
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            )
            .await;

        let result = registration.register(manifest("v2", &["/", "/offline.html"])).await;

        assert!(matches!(result, Err(Error::Database(_))));
        let active = registration.active().unwrap();
        assert_eq!(active.generation(), "v1");
        assert_eq!(active.state(), WorkerState::Active);
        assert_eq!(cache.db.active_generation().await.unwrap(), Some("v1".to_string()));

        network.set_offline(true);
        let outcome = registration.dispatch_fetch(&Request::navigate(url("/"))).await;
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    }
}
