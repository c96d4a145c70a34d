//! Import catalogue metadata from JSON.
//!
//! Accepts either a bare list of packs or a store document `{"packs": [...]}`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::db::CatalogueDb;
use super::types::PackMetadata;

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogueFile {
    List(Vec<PackMetadata>),
    Store { packs: Vec<PackMetadata> },
}

/// Parse catalogue JSON. Every pack needs a non-empty path, title and artist.
pub fn parse_catalogue_json(data: &str) -> Result<Vec<PackMetadata>> {
    let file: CatalogueFile = serde_json::from_str(data).context("parse catalogue JSON")?;
    let packs = match file {
        CatalogueFile::List(p) | CatalogueFile::Store { packs: p } => p,
    };
    for (i, p) in packs.iter().enumerate() {
        if p.path.trim().is_empty() || p.title.trim().is_empty() || p.artist.trim().is_empty() {
            anyhow::bail!("pack #{} is missing path, title or artist", i);
        }
    }
    Ok(packs)
}

impl CatalogueDb {
    /// Load a catalogue JSON file and append its packs (deduped by path).
    /// Returns (packs in file, newly inserted).
    pub async fn import_json(&self, path: &Path) -> Result<(usize, u64)> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read catalogue file {}", path.display()))?;
        let packs = parse_catalogue_json(&data)?;
        let inserted = self.add_packs(&packs).await?;
        Ok((packs.len(), inserted))
    }
}
