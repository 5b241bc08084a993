//! Stored responses.
//!
//! Entries are keyed by request (method + URL) within a store. Writing an
//! entry for a key that already exists overwrites it; concurrent writers to
//! the same key resolve as last-write-wins.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use crate::resource::Response;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Store a response under `(method, url)` in `store`, creating the store
    /// if needed.
    pub async fn put_entry(&self, store: &str, method: &str, url: &str, response: &Response) -> Result<(), Error> {
        let store = store.to_string();
        let method = method.to_ascii_uppercase();
        let url = url.to_string();
        let key_hash = compute_request_key(&method, &url);
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::CorruptEntry(format!("cannot encode headers: {e}")))?;
        let response_url = response.url.clone();
        let status = response.status;
        let body = response.body.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![store, now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries
                        (store, key_hash, method, url, response_url, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(store, key_hash) DO UPDATE SET
                        response_url = excluded.response_url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![store, key_hash, method, url, response_url, status, headers_json, body, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for `(method, url)` in `store`.
    ///
    /// Returns None if either the store or the entry is missing.
    pub async fn match_entry(&self, store: &str, method: &str, url: &str) -> Result<Option<Response>, Error> {
        let store = store.to_string();
        let key_hash = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT response_url, status, headers_json, body FROM cache_entries
                     WHERE store = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, body)) => {
                        let headers = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("{url}: {e}")))?;
                        Ok(Some(Response { url, status, headers, body }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in `store`, in storage order.
    pub async fn entry_urls(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY stored_at ASC, url ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
