//! SQLite-backed catalogue store implementation.
//!
//! Handles connection, migrations, and timestamp helpers. Pack CRUD lives in `packs`.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the catalogue database.
///
/// Stored under the XDG state directory:
/// `~/.local/state/packsync/catalogue.db`.
#[derive(Clone)]
pub struct CatalogueDb {
    pub(crate) pool: Pool<Sqlite>,
}

impl CatalogueDb {
    /// Open (or create) the default catalogue database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let state_dir = config::state_dir()?;
        Self::open_at(state_dir.join("catalogue.db")).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = CatalogueDb { pool };
        db.migrate().await?;
        tracing::debug!(path = %path.display(), "catalogue opened");
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // `path` is the dedupe key; `downloaded_at` doubles as the completion list.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS packs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                artist TEXT NOT NULL,
                file_name TEXT,
                downloaded_at INTEGER,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<CatalogueDb> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = CatalogueDb { pool };
    db.migrate().await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_uri_escapes_special_chars() {
        let uri = path_to_sqlite_uri(Path::new("/tmp/my state/#1.db"));
        assert_eq!(uri, "sqlite:///tmp/my%20state/%231.db");
    }
}
