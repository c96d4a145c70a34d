//! CLI command handlers, one file per command.

mod import;
mod remove;
mod reset;
mod run;
mod status;

pub use import::run_import;
pub use remove::run_remove;
pub use reset::run_reset;
pub use run::{run_downloads, RunOptions};
pub use status::run_status;
