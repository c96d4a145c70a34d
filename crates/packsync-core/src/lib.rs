pub mod catalogue;
pub mod config;
pub mod correlate;
pub mod library;
pub mod logging;
pub mod probe;
pub mod progress;
pub mod scheduler;
pub mod transfer;
