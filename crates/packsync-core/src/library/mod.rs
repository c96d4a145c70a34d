//! Local sample library layout.
//!
//! Packs land at `<root>/samples/<artist>/<title><ext>`, with artist and
//! title sanitized into single path components. A pack counts as cached when
//! a finished file named `<title>` or `<title>.*` exists in its artist
//! directory.

pub mod naming;

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalogue::PackMetadata;

pub use naming::{extension_of, sanitize_component, suggested_filename};

/// Suffix of a body still being written.
pub const PART_SUFFIX: &str = ".part";

#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artist_dir(&self, artist: &str) -> PathBuf {
        self.root.join("samples").join(sanitize_component(artist))
    }

    /// Final location for `pack` with extension `ext` (leading dot, or empty).
    pub fn packed_path(&self, pack: &PackMetadata, ext: &str) -> PathBuf {
        self.artist_dir(&pack.artist)
            .join(format!("{}{}", sanitize_component(&pack.title), ext))
    }

    /// Temporary path the body is streamed to before the final rename.
    pub fn part_path(final_path: &Path) -> PathBuf {
        let mut name = final_path.as_os_str().to_os_string();
        name.push(PART_SUFFIX);
        PathBuf::from(name)
    }

    /// Whether a finished file for `pack` already exists.
    pub fn is_cached(&self, pack: &PackMetadata) -> Result<bool> {
        Ok(self.cached_file(pack)?.is_some())
    }

    /// Path of the finished file for `pack`, if any.
    pub fn cached_file(&self, pack: &PackMetadata) -> Result<Option<PathBuf>> {
        let dir = self.artist_dir(&pack.artist);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
        };
        let stem = sanitize_component(&pack.title);
        let prefix = format!("{}.", stem);
        for entry in entries {
            let entry = entry.with_context(|| format!("read {}", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let matches = name == stem || name.starts_with(&prefix);
            if matches && !name.ends_with(PART_SUFFIX) {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}
