use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::errors::Result;

/// Creates `torrents`/`files` if they don't already exist, and for SQLite
/// backends sets WAL journal mode and turns foreign keys on (spec.md §6).
/// The two schema variants differ only in how the primary key
/// auto-increments; everything else is portable SQL the `Any` driver can
/// run against either backend.
pub async fn connect(database_url: &str) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();
    let pool = AnyPoolOptions::new().max_connections(5).connect(database_url).await?;

    if database_url.starts_with("sqlite:") {
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    }

    init_schema(&pool, database_url.starts_with("sqlite:")).await?;
    Ok(pool)
}

async fn init_schema(pool: &AnyPool, is_sqlite: bool) -> Result<()> {
    let torrents_id = if is_sqlite { "INTEGER PRIMARY KEY AUTOINCREMENT" } else { "SERIAL PRIMARY KEY" };
    let files_id = torrents_id;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS torrents (
            id {torrents_id},
            info_hash BLOB UNIQUE NOT NULL,
            name TEXT NOT NULL,
            total_size BIGINT NOT NULL CHECK (total_size > 0),
            discovered_on BIGINT NOT NULL CHECK (discovered_on > 0)
        )"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS files (
            id {files_id},
            torrent_id INTEGER NOT NULL REFERENCES torrents(id) ON DELETE CASCADE,
            size BIGINT NOT NULL,
            path TEXT NOT NULL
        )"
    ))
    .execute(pool)
    .await?;

    Ok(())
}
