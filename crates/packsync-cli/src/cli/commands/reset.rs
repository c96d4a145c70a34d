//! `packsync reset <path>` – forget that a pack was downloaded.

use anyhow::Result;
use packsync_core::catalogue::CatalogueDb;

pub async fn run_reset(db: &CatalogueDb, path: &str) -> Result<()> {
    if !db.reset(path).await? {
        anyhow::bail!("no pack with path {}", path);
    }
    println!("Reset {path}");
    Ok(())
}
