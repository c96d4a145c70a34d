//! HTTP download backend.
//!
//! Plays the role of the external download subsystem for the correlation
//! engine: [`HttpBackend::trigger`] resolves a pack's download URL and parks
//! the transfer under a locator unique to that trigger (the effective URL
//! tagged with a `#t<n>` fragment), and
//! [`HttpBackend::begin`] runs a parked transfer on a blocking thread that
//! reports `Started`, `Progress`, and `Completed`/`Canceled` on the source
//! channel. [`HttpBackend::download_direct`] is the runner-based flow, where
//! the primary phase probes and the secondary phase moves the body.

mod body;

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::catalogue::PackMetadata;
use crate::correlate::{ResourceLocator, SessionId, SourceEvent};
use crate::library::{self, Library};
use crate::probe::{self, HeadResult};
use crate::scheduler::Initiated;

use body::Throttle;

/// Capacity of the source event channel.
const SOURCE_BUFFER: usize = 256;

/// Minimum spacing between progress events of one session.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// A resolved transfer: where the body comes from and where it lands.
#[derive(Debug, Clone)]
pub struct PreparedTransfer {
    pub url: String,
    pub dest: PathBuf,
    pub expected_len: Option<u64>,
}

impl PreparedTransfer {
    /// Stream the body to `<dest>.part`, then rename it to `dest`. The part
    /// file is removed on failure.
    ///
    /// Blocking; run on a blocking thread.
    pub fn run(
        &self,
        headers: &BTreeMap<String, String>,
        on_progress: impl FnMut(u64, u64),
    ) -> Result<u64> {
        if let Some(parent) = self.dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let part = Library::part_path(&self.dest);
        match body::fetch_to_file(&self.url, headers, &part, self.expected_len, on_progress) {
            Ok(n) => {
                fs::rename(&part, &self.dest).with_context(|| {
                    format!("rename {} -> {}", part.display(), self.dest.display())
                })?;
                Ok(n)
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(e)
            }
        }
    }
}

struct Shared {
    library: Library,
    base_url: url::Url,
    headers: BTreeMap<String, String>,
    events: mpsc::Sender<SourceEvent>,
    parked: Mutex<HashMap<ResourceLocator, PreparedTransfer>>,
    triggers: AtomicU64,
    sessions: AtomicU64,
}

/// Cheap to clone; clones share parked transfers and the event channel.
#[derive(Clone)]
pub struct HttpBackend {
    shared: Arc<Shared>,
}

impl HttpBackend {
    /// Backend resolving pack paths against `base_url`, plus the receiver of
    /// its lifecycle events.
    pub fn new(
        library: Library,
        base_url: &str,
        headers: BTreeMap<String, String>,
    ) -> Result<(Self, mpsc::Receiver<SourceEvent>)> {
        let base_url =
            url::Url::parse(base_url).with_context(|| format!("invalid base URL {}", base_url))?;
        let (tx, rx) = mpsc::channel(SOURCE_BUFFER);
        let shared = Shared {
            library,
            base_url,
            headers,
            events: tx,
            parked: Mutex::new(HashMap::new()),
            triggers: AtomicU64::new(0),
            sessions: AtomicU64::new(0),
        };
        Ok((
            Self {
                shared: Arc::new(shared),
            },
            rx,
        ))
    }

    pub fn library(&self) -> &Library {
        &self.shared.library
    }

    /// Download URL of `pack`: its catalogue path joined onto the base URL.
    pub fn pack_url(&self, pack: &PackMetadata) -> Result<url::Url> {
        self.shared
            .base_url
            .join(&pack.path)
            .with_context(|| format!("invalid pack path {}", pack.path))
    }

    /// Probe `pack` and work out its destination in the library.
    pub async fn prepare(&self, pack: &PackMetadata) -> Result<PreparedTransfer> {
        let url = self.pack_url(pack)?.to_string();
        let headers = self.shared.headers.clone();
        let head = tokio::task::spawn_blocking(move || probe::probe(&url, &headers))
            .await
            .context("probe thread panicked")??;
        Ok(self.destination(pack, head))
    }

    fn destination(&self, pack: &PackMetadata, head: HeadResult) -> PreparedTransfer {
        let suggested =
            library::suggested_filename(&head.effective_url, head.content_disposition.as_deref());
        let ext = suggested
            .and_then(|name| library::extension_of(&name))
            .unwrap_or_default();
        PreparedTransfer {
            dest: self.shared.library.packed_path(pack, &ext),
            url: head.effective_url,
            expected_len: head.content_length,
        }
    }

    /// Initiate the download of `pack`. Returns the locator its session will
    /// report in `Started`; the body does not move until [`begin`](Self::begin).
    ///
    /// Every trigger gets its own locator, so two packs resolving to the same
    /// file never compete for one `Started` event.
    pub async fn trigger(&self, pack: PackMetadata) -> Result<ResourceLocator> {
        let prepared = self.prepare(&pack).await?;
        let n = self.shared.triggers.fetch_add(1, Ordering::Relaxed) + 1;
        let locator = tagged_locator(&prepared.url, n);
        tracing::debug!(pack = %pack.path, locator = %locator, "transfer parked");
        self.parked()?.insert(locator.clone(), prepared);
        Ok(locator)
    }

    /// Start the transfer parked under `locator` on a blocking thread.
    pub fn begin(&self, locator: &ResourceLocator) -> Result<SessionId> {
        let prepared = self
            .parked()?
            .remove(locator)
            .with_context(|| format!("no parked transfer for {}", locator))?;
        let n = self.shared.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        let session = SessionId(format!("session-{}", n));
        let shared = Arc::clone(&self.shared);
        let id = session.clone();
        let locator = locator.clone();
        tokio::task::spawn_blocking(move || run_session(&shared, id, locator, prepared));
        Ok(session)
    }

    /// Runner flow: the primary phase probes `pack`; the returned secondary
    /// moves the body.
    pub async fn download_direct(&self, pack: PackMetadata) -> Result<Initiated> {
        let prepared = self.prepare(&pack).await?;
        let headers = self.shared.headers.clone();
        tracing::debug!(
            pack = %pack.path,
            dest = %prepared.dest.display(),
            "direct transfer initiated"
        );
        Ok(Initiated::with_secondary(async move {
            let dest = prepared.dest.clone();
            let bytes = tokio::task::spawn_blocking(move || prepared.run(&headers, |_, _| {}))
                .await
                .context("transfer thread panicked")?
                .with_context(|| format!("download {}", pack.path))?;
            tracing::info!(
                pack = %pack.path,
                bytes,
                dest = %dest.display(),
                "direct transfer finished"
            );
            Ok(())
        }))
    }

    fn parked(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ResourceLocator, PreparedTransfer>>> {
        self.shared
            .parked
            .lock()
            .map_err(|_| anyhow::anyhow!("parked transfer table poisoned"))
    }
}

fn run_session(
    shared: &Shared,
    session: SessionId,
    locator: ResourceLocator,
    prepared: PreparedTransfer,
) {
    // A closed receiver means the run is over; the transfer still finishes.
    let send = |event: SourceEvent| {
        let _ = shared.events.blocking_send(event);
    };

    send(SourceEvent::Started {
        session_id: session.clone(),
        locator,
    });

    let mut throttle = Throttle::new(PROGRESS_INTERVAL);
    let result = prepared.run(&shared.headers, |received, total| {
        if throttle.ready(received, total) {
            send(SourceEvent::Progress {
                session_id: session.clone(),
                received,
                total,
            });
        }
    });

    match result {
        Ok(bytes) => {
            tracing::info!(
                session = %session,
                bytes,
                dest = %prepared.dest.display(),
                "transfer completed"
            );
            send(SourceEvent::Completed { session_id: session });
        }
        Err(e) => {
            tracing::warn!(session = %session, url = %prepared.url, "transfer failed: {:#}", e);
            send(SourceEvent::Canceled { session_id: session });
        }
    }
}

/// Locator for the `n`th trigger: `url` with its fragment replaced by `t<n>`.
/// The fragment is never sent to the server.
fn tagged_locator(url: &str, n: u64) -> ResourceLocator {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(Some(&format!("t{}", n)));
            ResourceLocator(parsed.to_string())
        }
        Err(_) => ResourceLocator(format!("{}#t{}", url, n)),
    }
}
