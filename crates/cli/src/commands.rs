//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use paylater_client::{FetchClient, FetchConfig, Network, resolve};
use paylater_core::{AppConfig, CacheDb, Request, RequestMode};
use paylater_worker::{Interception, PrecacheManifest, Registration};
use std::io::Write;
use std::sync::Arc;
use url::Url;

fn network(config: &AppConfig) -> Result<Arc<dyn Network>> {
    let client = FetchClient::new(FetchConfig::from(config))?;
    Ok(Arc::new(client))
}

fn origin(config: &AppConfig) -> Result<Url> {
    Url::parse(&config.origin).with_context(|| format!("invalid origin: {}", config.origin))
}

pub async fn register(config: &AppConfig, db: &CacheDb) -> Result<()> {
    let manifest = PrecacheManifest::from_config(config)?;
    let registration = Registration::new(db.clone(), network(config)?);

    let worker = registration.register(manifest).await?;
    let entries = db.count_entries(worker.generation()).await?;
    println!("active generation {} ({} entries)", worker.generation(), entries);
    Ok(())
}

pub async fn fetch(config: &AppConfig, db: CacheDb, locator: &str, method: &str, navigate: bool) -> Result<()> {
    let url = resolve(&origin(config)?, locator)?;
    let mode = if navigate { RequestMode::Navigate } else { RequestMode::Resource };
    let request = Request::new(method, url, mode);

    let network = network(config)?;
    let manifest = PrecacheManifest::from_config(config)?;
    let registration = Registration::restore(db, Arc::clone(&network), manifest).await?;

    let response = match registration.dispatch_fetch(&request).await {
        Interception::Respond { response, source } => {
            tracing::info!(
                url = %request.url,
                %source,
                status = response.status,
                content_type = response.content_type().unwrap_or("-"),
                "served"
            );
            response
        }
        Interception::Passthrough => {
            tracing::info!(url = %request.url, method = %request.method, "not intercepted");
            network.fetch(&request).await?
        }
        Interception::Unavailable => bail!("{} is unavailable: network, cache and offline page all failed", request.url),
    };

    registration.settle().await;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response.body)?;
    stdout.flush()?;
    Ok(())
}

pub async fn stores(db: &CacheDb, list_entries: bool) -> Result<()> {
    let active = db.active_generation().await?;
    for store in db.store_infos().await? {
        let marker = if active.as_deref() == Some(store.name.as_str()) { "*" } else { " " };
        println!("{} {}\t{} entries\tcreated {}", marker, store.name, store.entries, store.created_at);
        if list_entries {
            for url in db.entry_urls(&store.name).await? {
                println!("    {url}");
            }
        }
    }
    if active.is_none() {
        println!("no active generation");
    }
    Ok(())
}
