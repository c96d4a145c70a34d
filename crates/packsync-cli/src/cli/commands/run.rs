//! `packsync run` – download every pending pack.
//!
//! Default mode drives the correlation engine over the HTTP backend; `--direct`
//! hands two-phase tasks to the slot runner instead.

use anyhow::{Context, Result};
use packsync_core::catalogue::{CatalogueDb, PackMetadata};
use packsync_core::config::PacksyncConfig;
use packsync_core::correlate::{self, DownloadEvent, SourceEvent};
use packsync_core::library::Library;
use packsync_core::progress::ProgressBoard;
use packsync_core::scheduler::{self, task, Initiated, SlotRelease, Task};
use packsync_core::transfer::HttpBackend;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::cli::board::BoardPainter;

const DRAW_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
pub struct RunOptions {
    pub jobs: Option<usize>,
    pub base_url: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub direct: bool,
}

pub async fn run_downloads(db: &CatalogueDb, cfg: &PacksyncConfig, opts: RunOptions) -> Result<()> {
    let concurrency = opts.jobs.unwrap_or(cfg.concurrency).max(1);
    let base_url = opts
        .base_url
        .or_else(|| cfg.base_url.clone())
        .context("no base URL: pass --base-url or set base_url in config.toml")?;
    let root = match opts.download_dir {
        Some(dir) => dir,
        None => cfg.resolved_download_dir()?,
    };
    let library = Library::new(root);

    let backlog = skip_cached(db, &library).await?;
    if backlog.is_empty() {
        println!("Nothing to download.");
        return Ok(());
    }
    tracing::info!(
        pending = backlog.len(),
        concurrency,
        library = %library.root().display(),
        direct = opts.direct,
        "starting run"
    );

    let (backend, source) = HttpBackend::new(library, &base_url, cfg.headers.clone())?;
    if opts.direct {
        run_direct(db, backend, backlog, concurrency, cfg.slot_release).await
    } else {
        run_correlated(db, backend, source, backlog, concurrency).await
    }
}

/// Pending packs without a finished file; packs already on disk are marked
/// downloaded.
async fn skip_cached(db: &CatalogueDb, library: &Library) -> Result<Vec<PackMetadata>> {
    let mut backlog = Vec::new();
    for pack in db.pending_packs().await? {
        if library.is_cached(&pack)? {
            record_download(db, library, &pack).await?;
            tracing::info!(pack = %pack.path, "already in library, skipping");
        } else {
            backlog.push(pack);
        }
    }
    Ok(backlog)
}

async fn record_download(db: &CatalogueDb, library: &Library, pack: &PackMetadata) -> Result<()> {
    let file_name = library.cached_file(pack)?.and_then(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
    });
    db.mark_downloaded(&pack.path, file_name.as_deref()).await?;
    Ok(())
}

async fn run_correlated(
    db: &CatalogueDb,
    backend: HttpBackend,
    source: mpsc::Receiver<SourceEvent>,
    backlog: Vec<PackMetadata>,
    concurrency: usize,
) -> Result<()> {
    let mut board = ProgressBoard::new(backlog.len(), concurrency);
    let trigger_backend = backend.clone();
    let mut downloads = correlate::start(
        concurrency,
        backlog,
        move |pack: PackMetadata| {
            let backend = trigger_backend.clone();
            async move { backend.trigger(pack).await }
        },
        source,
    );

    let mut painter = BoardPainter::stdout();
    let mut last_draw: Option<Instant> = None;
    while let Some(event) = downloads.next().await {
        match &event {
            DownloadEvent::Triggered { item, locator, .. } => {
                let session = backend
                    .begin(locator)
                    .with_context(|| format!("start transfer for {}", item.path))?;
                tracing::debug!(pack = %item.path, session = %session, "transfer started");
            }
            DownloadEvent::Completed { item, .. } => {
                record_download(db, backend.library(), item).await?;
            }
            DownloadEvent::Canceled { item, .. } => {
                tracing::warn!(pack = %item.path, "download canceled");
            }
            _ => {}
        }
        board.apply(&event, |p| format!("{} - {}", p.artist, p.title));

        let throttled = matches!(event, DownloadEvent::InProgress { .. })
            && last_draw.is_some_and(|at| at.elapsed() < DRAW_INTERVAL);
        if !throttled {
            painter.draw(&board.render())?;
            last_draw = Some(Instant::now());
        }
    }

    let summary = downloads.finish().await?;
    tracing::info!(?summary, "run finished");
    if summary.interrupted {
        anyhow::bail!(
            "run interrupted after {} of {} pack(s)",
            summary.completed + summary.canceled,
            summary.total
        );
    }
    println!(
        "Downloaded {} of {} pack(s), {} canceled",
        summary.completed, summary.total, summary.canceled
    );
    Ok(())
}

async fn run_direct(
    db: &CatalogueDb,
    backend: HttpBackend,
    backlog: Vec<PackMetadata>,
    concurrency: usize,
    release: SlotRelease,
) -> Result<()> {
    let total = backlog.len();
    let tasks: Vec<Task> = backlog
        .into_iter()
        .map(|pack| {
            let backend = backend.clone();
            let db = db.clone();
            task(move |slot| async move {
                println!("[{}] starting {} - {}", slot, pack.artist, pack.title);
                let body = match backend.download_direct(pack.clone()).await?.into_secondary() {
                    Some(body) => body,
                    None => return Ok(Initiated::done()),
                };
                Ok(Initiated::with_secondary(async move {
                    body.await?;
                    record_download(&db, backend.library(), &pack).await?;
                    println!("[{}] finished {} - {}", slot, pack.artist, pack.title);
                    Ok(())
                }))
            })
        })
        .collect();

    let report = scheduler::run_two_phase(concurrency, tasks, release).await?;
    tracing::info!(?report, "direct run finished");
    println!("Downloaded {} of {} pack(s)", report.secondaries, total);
    Ok(())
}
