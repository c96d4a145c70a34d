//! Persistent catalogue store (SQLite via sqlx).
//!
//! Holds the scraped pack metadata (append with dedupe by path) and which
//! packs have already been downloaded. A run's backlog is every pack not yet
//! marked downloaded.

mod db;
mod import;
mod packs;
mod types;

pub use db::CatalogueDb;
pub use import::parse_catalogue_json;
pub use types::{CatalogueCounts, PackId, PackMetadata, PackRecord};
