//! Types used by the catalogue store.

use serde::{Deserialize, Serialize};

/// Row id of a pack in the catalogue.
pub type PackId = i64;

/// Metadata scraped for one catalogue entry. `path` is the entry's page path
/// on the source site and is the dedupe key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackMetadata {
    pub path: String,
    pub title: String,
    pub artist: String,
}

impl PackMetadata {
    pub fn new(
        path: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// Stored pack with download bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRecord {
    pub id: PackId,
    pub meta: PackMetadata,
    /// Local file name once downloaded.
    pub file_name: Option<String>,
    /// Unix seconds of the completed download.
    pub downloaded_at: Option<i64>,
}

impl PackRecord {
    pub fn is_downloaded(&self) -> bool {
        self.downloaded_at.is_some()
    }
}

/// Summary view used by the CLI `status` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogueCounts {
    pub total: u64,
    pub downloaded: u64,
}

impl CatalogueCounts {
    pub fn pending(&self) -> u64 {
        self.total.saturating_sub(self.downloaded)
    }
}
