//! `packsync remove <path>` – drop a pack from the catalogue. Downloaded
//! files are left in place.

use anyhow::Result;
use packsync_core::catalogue::CatalogueDb;

pub async fn run_remove(db: &CatalogueDb, path: &str) -> Result<()> {
    if !db.remove(path).await? {
        anyhow::bail!("no pack with path {}", path);
    }
    tracing::debug!(path, "removed pack");
    println!("Removed {path}");
    Ok(())
}
