//! Pack read/write operations.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, CatalogueDb};
use super::types::{CatalogueCounts, PackMetadata, PackRecord};

fn record_from_row(row: &SqliteRow) -> PackRecord {
    PackRecord {
        id: row.get("id"),
        meta: PackMetadata {
            path: row.get("path"),
            title: row.get("title"),
            artist: row.get("artist"),
        },
        file_name: row.get("file_name"),
        downloaded_at: row.get("downloaded_at"),
    }
}

impl CatalogueDb {
    /// Append packs, skipping any whose `path` is already stored.
    /// Returns the number of newly inserted packs.
    pub async fn add_packs(&self, packs: &[PackMetadata]) -> Result<u64> {
        let now = unix_timestamp();
        let mut inserted = 0u64;
        let mut tx = self.pool.begin().await?;
        for pack in packs {
            let r = sqlx::query(
                r#"
                INSERT OR IGNORE INTO packs (path, title, artist, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&pack.path)
            .bind(&pack.title)
            .bind(&pack.artist)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += r.rows_affected();
        }
        tx.commit().await?;
        tracing::debug!(offered = packs.len(), inserted, "catalogue packs added");
        Ok(inserted)
    }

    /// All packs in insertion order.
    pub async fn list_packs(&self) -> Result<Vec<PackRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, path, title, artist, file_name, downloaded_at
            FROM packs
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Packs not yet downloaded, in insertion order (the run's backlog).
    pub async fn pending_packs(&self) -> Result<Vec<PackMetadata>> {
        let rows = sqlx::query(
            r#"
            SELECT id, path, title, artist, file_name, downloaded_at
            FROM packs
            WHERE downloaded_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| record_from_row(r).meta).collect())
    }

    pub async fn get_pack(&self, path: &str) -> Result<Option<PackRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, path, title, artist, file_name, downloaded_at
            FROM packs
            WHERE path = ?1
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Record a completed download. Returns false if the pack is unknown.
    pub async fn mark_downloaded(&self, path: &str, file_name: Option<&str>) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE packs
            SET downloaded_at = ?1,
                file_name = COALESCE(?2, file_name)
            WHERE path = ?3
            "#,
        )
        .bind(now)
        .bind(file_name)
        .bind(path)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Forget a completed download so the next run fetches the pack again.
    pub async fn reset(&self, path: &str) -> Result<bool> {
        let r = sqlx::query(
            r#"
            UPDATE packs
            SET downloaded_at = NULL,
                file_name = NULL
            WHERE path = ?1
            "#,
        )
        .bind(path)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Permanently remove a pack row. Local files are left alone.
    pub async fn remove(&self, path: &str) -> Result<bool> {
        let r = sqlx::query(
            r#"
            DELETE FROM packs
            WHERE path = ?1
            "#,
        )
        .bind(path)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    pub async fn counts(&self) -> Result<CatalogueCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(downloaded_at) AS downloaded
            FROM packs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.get("total");
        let downloaded: i64 = row.get("downloaded");
        Ok(CatalogueCounts {
            total: total.max(0) as u64,
            downloaded: downloaded.max(0) as u64,
        })
    }
}
