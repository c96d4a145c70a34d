//! `packsync status` – list packs and download counts.

use anyhow::Result;
use packsync_core::catalogue::CatalogueDb;

pub async fn run_status(db: &CatalogueDb) -> Result<()> {
    let packs = db.list_packs().await?;
    if packs.is_empty() {
        println!("No packs in catalogue.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<24} {}", "ID", "STATE", "ARTIST", "TITLE");
    for p in &packs {
        let state = if p.is_downloaded() { "downloaded" } else { "pending" };
        println!(
            "{:<6} {:<10} {:<24} {}",
            p.id, state, p.meta.artist, p.meta.title
        );
    }
    let counts = db.counts().await?;
    println!(
        "\n{} pack(s): {} downloaded, {} pending",
        counts.total,
        counts.downloaded,
        counts.pending()
    );
    Ok(())
}
