//! In-memory network double that records every call.

use async_trait::async_trait;
use paylater_client::Network;
use paylater_core::{CacheDb, Error, Request, Response};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

const ORIGIN: &str = "http://paylater.test/";

pub(crate) fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

/// Resolve `locator` against the test origin.
pub(crate) fn url(locator: &str) -> Url {
    origin().join(locator).unwrap()
}

#[derive(Default)]
pub(crate) struct MockNetwork {
    routes: Mutex<HashMap<String, (u16, String)>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` with status 200 for `locator` (resolved against ORIGIN).
    pub(crate) fn route(&self, locator: &str, body: &str) {
        self.route_status(locator, 200, body);
    }

    pub(crate) fn route_status(&self, locator: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url(locator).to_string(), (status, body.to_string()));
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method, request.url));

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: connection refused", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, body) = route.unwrap_or((404, "not found".to_string()));
        Ok(Response {
            url: request.url.to_string(),
            status,
            headers: vec![("content-type".into(), "text/plain".into())],
            body: body.into_bytes(),
        })
    }
}

/// A file-backed cache with a second raw connection to the same database,
/// for tests that tamper with rows or schema under a running worker.
pub(crate) struct FileCache {
    pub(crate) db: CacheDb,
    raw: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl FileCache {
    pub(crate) async fn open(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("paylater-worker-{}-{name}.sqlite", std::process::id()));
        remove_database(&path);
        let db = CacheDb::open(&path).await.unwrap();
        let raw = tokio_rusqlite::Connection::open(&path).await.unwrap();
        Self { db, raw, path }
    }

    pub(crate) async fn execute(&self, sql: &'static str) {
        self.raw.call(move |conn| conn.execute_batch(sql)).await.unwrap();
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        remove_database(&self.path);
    }
}

fn remove_database(path: &std::path::Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
