//! Tests for the run subcommand.

use super::parse;
use crate::cli::CliCommand;
use std::path::Path;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["packsync", "run"]) {
        CliCommand::Run {
            jobs,
            base_url,
            download_dir,
            direct,
        } => {
            assert!(jobs.is_none());
            assert!(base_url.is_none());
            assert!(download_dir.is_none());
            assert!(!direct);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_all_flags() {
    match parse(&[
        "packsync",
        "run",
        "--jobs",
        "4",
        "--base-url",
        "https://www.example.com",
        "--download-dir",
        "/srv/samples",
        "--direct",
    ]) {
        CliCommand::Run {
            jobs,
            base_url,
            download_dir,
            direct,
        } => {
            assert_eq!(jobs, Some(4));
            assert_eq!(base_url.as_deref(), Some("https://www.example.com"));
            assert_eq!(download_dir.as_deref(), Some(Path::new("/srv/samples")));
            assert!(direct);
        }
        _ => panic!("expected Run with flags"),
    }
}

#[test]
fn cli_parse_run_rejects_bad_jobs() {
    use clap::Parser;
    assert!(crate::cli::Cli::try_parse_from(["packsync", "run", "--jobs", "many"]).is_err());
}
