//! `packsync import <file>` – load pack metadata into the catalogue.

use anyhow::Result;
use packsync_core::catalogue::CatalogueDb;
use std::path::Path;

pub async fn run_import(db: &CatalogueDb, path: &Path) -> Result<()> {
    let (parsed, inserted) = db.import_json(path).await?;
    tracing::info!(path = %path.display(), parsed, inserted, "imported catalogue");
    println!(
        "Imported {} new pack(s) ({} already known)",
        inserted,
        (parsed as u64).saturating_sub(inserted)
    );
    Ok(())
}
