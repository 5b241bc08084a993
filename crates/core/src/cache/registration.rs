//! The persisted record of which generation controls requests.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// The generation recorded by the last completed activation.
    pub async fn active_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result =
                    conn.query_row("SELECT active_generation FROM registration WHERE id = 1", [], |row| row.get(0));
                match result {
                    Ok(generation) => Ok(Some(generation)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Record `generation` as the one controlling requests.
    pub async fn set_active_generation(&self, generation: &str) -> Result<(), Error> {
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO registration (id, active_generation, activated_at) VALUES (1, ?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET
                        active_generation = excluded.active_generation,
                        activated_at = excluded.activated_at",
                    params![generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
