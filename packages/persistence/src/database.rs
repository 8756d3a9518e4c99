use async_trait::async_trait;
use log::{info, warn};
use sqlx::{AnyPool, Row};
use tokio::sync::{Mutex, RwLock};

use infohash_filter::DurableStore;
use krpc_protocol::NodeID;

use crate::errors::{Error, Result};
use crate::metadata::{self, DecodedMetadata};
use crate::schema;
use crate::stats::{Counters, Snapshot};

struct PendingTorrent {
    info_hash: NodeID,
    name: String,
    total_size: i64,
    discovered_on: i64,
}

struct PendingFile {
    info_hash: NodeID,
    size: i64,
    path: String,
}

/// The buffered, batched relational store façade (C8). Buffers rows in
/// memory and flushes them in one atomic transaction once `commit_n` rows
/// have accumulated, mirroring the original's `Database.add_metadata`/
/// `__commit_metadata` pair.
pub struct Database {
    pool: RwLock<AnyPool>,
    database_url: String,
    commit_n: usize,
    pending_metadata: Mutex<Vec<PendingTorrent>>,
    pending_files: Mutex<Vec<PendingFile>>,
    counters: Counters,
}

impl Database {
    pub async fn connect(database_url: &str, commit_n: usize) -> Result<Database> {
        let pool = schema::connect(database_url).await?;
        Ok(Database {
            pool: RwLock::new(pool),
            database_url: database_url.to_string(),
            commit_n: commit_n.max(1),
            pending_metadata: Mutex::new(Vec::new()),
            pending_files: Mutex::new(Vec::new()),
            counters: Counters::default(),
        })
    }

    pub fn stats_snapshot(&self) -> Snapshot {
        self.counters.take_snapshot()
    }

    /// Decodes `raw_info`, validates it, and appends it to the pending
    /// batch, triggering a commit once `commit_n` rows have accumulated.
    /// Returns `false` (without treating it as an error) on malformed
    /// metadata — a dishonest or buggy peer, not a crawler bug — matching
    /// the original's broad "not critical" catch in `add_metadata`.
    pub async fn add_metadata(&self, info_hash: NodeID, raw_info: &[u8]) -> bool {
        let DecodedMetadata { name, total_size, files } = match metadata::decode_info(raw_info) {
            Ok(decoded) => decoded,
            Err(err) => {
                info!("metadata for {} is malformed, discarding: {}", info_hash, err);
                return false;
            }
        };

        let discovered_on = chrono::Utc::now().timestamp();
        {
            let mut pending_metadata = self.pending_metadata.lock().await;
            let mut pending_files = self.pending_files.lock().await;

            pending_metadata.push(PendingTorrent { info_hash, name: name.clone(), total_size, discovered_on });
            pending_files.extend(files.into_iter().map(|f| PendingFile { info_hash, size: f.size, path: f.path }));

            info!("Added: `{}`", name);

            if pending_metadata.len() < self.commit_n {
                return true;
            }
        }

        if let Err(err) = self.commit().await {
            warn!("commit failed, batch retained for retry: {}", err);
        }
        true
    }

    /// Flushes any residual batch; called on shutdown.
    pub async fn flush(&self) -> Result<()> {
        if self.pending_metadata.lock().await.is_empty() {
            return Ok(());
        }
        self.commit().await
    }

    async fn commit(&self) -> Result<()> {
        let mut pending_metadata = self.pending_metadata.lock().await;
        let mut pending_files = self.pending_files.lock().await;
        if pending_metadata.is_empty() {
            return Ok(());
        }

        let n = pending_metadata.len();
        let result = self.commit_batch(&pending_metadata, &pending_files).await;

        match result {
            Ok(()) => {
                info!("{} metadata ({} files) are committed to the database.", pending_metadata.len(), pending_files.len());
                self.counters.record_added(n as u64);
                pending_metadata.clear();
                pending_files.clear();
                Ok(())
            }
            Err(Error::UniqueViolation) => {
                warn!("could not commit metadata to the database because of collisions! ({} metadata dropped)", n);
                self.counters.record_errors(n as u64);
                pending_metadata.clear();
                pending_files.clear();
                Err(Error::UniqueViolation)
            }
            Err(err @ Error::BackendUnavailable(_)) => {
                warn!("database backend unavailable, reconnecting and retaining {} pending metadata: {}", n, err);
                if let Ok(fresh_pool) = schema::connect(&self.database_url).await {
                    *self.pool.write().await = fresh_pool;
                }
                Err(err)
            }
            Err(err) => {
                warn!("could not commit metadata to the database! ({} metadata pending): {}", n, err);
                self.counters.record_errors(n as u64);
                pending_metadata.clear();
                pending_files.clear();
                Err(err)
            }
        }
    }

    async fn commit_batch(&self, pending_metadata: &[PendingTorrent], pending_files: &[PendingFile]) -> Result<()> {
        let pool = self.pool.read().await;
        let mut tx = pool.begin().await.map_err(classify)?;

        for torrent in pending_metadata {
            sqlx::query("INSERT INTO torrents (info_hash, name, total_size, discovered_on) VALUES (?, ?, ?, ?)")
                .bind(torrent.info_hash.as_bytes().to_vec())
                .bind(&torrent.name)
                .bind(torrent.total_size)
                .bind(torrent.discovered_on)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        for file in pending_files {
            sqlx::query(
                "INSERT INTO files (torrent_id, size, path) \
                 VALUES ((SELECT id FROM torrents WHERE info_hash = ?), ?, ?)",
            )
            .bind(file.info_hash.as_bytes().to_vec())
            .bind(file.size)
            .bind(&file.path)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    async fn pending_contains(&self, info_hash: &NodeID) -> bool {
        self.pending_metadata.lock().await.iter().any(|t| &t.info_hash == info_hash)
    }
}

/// Maps an `sqlx::Error` onto our error kinds: unique-constraint
/// violations drop the batch, everything that smells like a dead
/// connection triggers a reconnect, everything else is a generic failure.
fn classify(err: sqlx::Error) -> Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return Error::UniqueViolation;
        }
    }
    match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => Error::BackendUnavailable(err.to_string()),
        _ => Error::Sqlx(err),
    }
}

#[async_trait]
impl DurableStore for Database {
    async fn contains_info_hash(&self, info_hash: &NodeID) -> infohash_filter::Result<bool> {
        if self.pending_contains(info_hash).await {
            return Ok(true);
        }

        let pool = self.pool.read().await;
        let row = sqlx::query("SELECT 1 AS present FROM torrents WHERE info_hash = ?")
            .bind(info_hash.as_bytes().to_vec())
            .fetch_optional(&*pool)
            .await
            .map_err(|err| infohash_filter::Error::BackendUnavailable(err.to_string()))?;
        Ok(row.is_some())
    }

    async fn all_info_hashes(&self, chunk_size: usize) -> infohash_filter::Result<Vec<Vec<NodeID>>> {
        let pool = self.pool.read().await;
        let mut blocks = Vec::new();
        let mut offset: i64 = 0;
        let limit = chunk_size.max(1) as i64;

        loop {
            let rows = sqlx::query("SELECT info_hash FROM torrents ORDER BY id LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(&*pool)
                .await
                .map_err(|err| infohash_filter::Error::BackendUnavailable(err.to_string()))?;

            if rows.is_empty() {
                break;
            }

            let mut block = Vec::with_capacity(rows.len());
            for row in &rows {
                let bytes: Vec<u8> = row.try_get("info_hash").map_err(|err| infohash_filter::Error::BackendUnavailable(err.to_string()))?;
                if let Some(id) = NodeID::from_slice(&bytes) {
                    block.push(id);
                }
            }
            let fetched = rows.len();
            blocks.push(block);
            offset += fetched as i64;

            if fetched < limit as usize {
                break;
            }
        }

        Ok(blocks)
    }
}
