//! Integration tests: local HTTP server, HTTP backend, correlation engine and
//! the direct runner flow.

mod common;

use common::http_server::{self, Route};
use packsync_core::catalogue::PackMetadata;
use packsync_core::correlate::{self, CorrelateError, DownloadEvent, SourceEvent};
use packsync_core::library::Library;
use packsync_core::probe;
use packsync_core::scheduler::{self, task, SlotRelease, Task};
use packsync_core::transfer::HttpBackend;
use std::collections::BTreeMap;
use tempfile::tempdir;
use tokio::sync::mpsc;

fn body(seed: u8, len: usize) -> Vec<u8> {
    (seed..=u8::MAX).cycle().take(len).collect()
}

/// Drive a correlated run to the end, starting each parked transfer as soon
/// as its trigger is recorded.
async fn run_correlated(
    backend: &HttpBackend,
    source: mpsc::Receiver<SourceEvent>,
    packs: Vec<PackMetadata>,
    concurrency: usize,
) -> (
    Vec<DownloadEvent<PackMetadata>>,
    Result<correlate::RunSummary, CorrelateError>,
) {
    let trigger_backend = backend.clone();
    let mut downloads = correlate::start(
        concurrency,
        packs,
        move |pack: PackMetadata| {
            let backend = trigger_backend.clone();
            async move { backend.trigger(pack).await }
        },
        source,
    );
    let mut events = Vec::new();
    while let Some(event) = downloads.next().await {
        if let DownloadEvent::Triggered { locator, .. } = &event {
            backend.begin(locator).unwrap();
        }
        events.push(event);
    }
    (events, downloads.finish().await)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn correlated_run_downloads_every_pack() {
    let drums = body(0, 64 * 1024);
    let bass = body(7, 10_000);
    let keys = body(3, 1);
    let base = http_server::start(vec![
        ("/packs/drums", Route::file(drums.clone())),
        ("/packs/bass", Route::Redirect("/files/bass-final.rar".to_string())),
        ("/files/bass-final.rar", Route::file(bass.clone())),
        ("/packs/keys", Route::attachment(keys.clone(), "Keys Pack.zip")),
    ]);

    let dir = tempdir().unwrap();
    let library = Library::new(dir.path());
    let (backend, source) = HttpBackend::new(library.clone(), &base, BTreeMap::new()).unwrap();
    let packs = vec![
        PackMetadata::new("/packs/drums", "Drums", "Beat Co"),
        PackMetadata::new("/packs/bass", "Bass", "Low/End"),
        PackMetadata::new("/packs/keys", "Keys", "Beat Co"),
    ];

    let (events, result) = run_correlated(&backend, source, packs.clone(), 2).await;
    let summary = result.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.canceled, 0);
    assert!(!summary.interrupted);
    assert_eq!(events.last(), Some(&DownloadEvent::AllComplete));

    for (slot_of_completion, pack) in events.iter().filter_map(|e| match e {
        DownloadEvent::Completed { slot, item, .. } => Some((*slot, item)),
        _ => None,
    }) {
        assert!(slot_of_completion.index() < 2);
        assert!(packs.contains(pack));
    }

    // No extension in the URL: file has none.
    assert_eq!(
        std::fs::read(library.packed_path(&packs[0], "")).unwrap(),
        drums
    );
    // Extension from the redirect target.
    assert_eq!(
        std::fs::read(library.packed_path(&packs[1], ".rar")).unwrap(),
        bass
    );
    // Extension from Content-Disposition.
    assert_eq!(
        std::fs::read(library.packed_path(&packs[2], ".zip")).unwrap(),
        keys
    );
    assert!(packs.iter().all(|p| library.is_cached(p).unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn packs_sharing_a_file_keep_their_own_labels() {
    let shared = body(4, 8192);
    let base = http_server::start(vec![
        ("/packs/one", Route::Redirect("/files/shared.zip".to_string())),
        ("/packs/two", Route::Redirect("/files/shared.zip".to_string())),
        ("/files/shared.zip", Route::file(shared.clone())),
    ]);

    let dir = tempdir().unwrap();
    let library = Library::new(dir.path());
    let (backend, source) = HttpBackend::new(library.clone(), &base, BTreeMap::new()).unwrap();
    let one = PackMetadata::new("/packs/one", "One", "Artist");
    let two = PackMetadata::new("/packs/two", "Two", "Artist");

    let trigger_backend = backend.clone();
    let mut downloads = correlate::start(
        2,
        vec![one.clone(), two.clone()],
        move |pack: PackMetadata| {
            let backend = trigger_backend.clone();
            async move { backend.trigger(pack).await }
        },
        source,
    );

    let mut triggered = Vec::new();
    let mut completed = 0;
    while let Some(event) = downloads.next().await {
        match event {
            DownloadEvent::Triggered { item, locator, .. } => {
                triggered.push((item, locator));
                // Start transfers in reverse trigger order once both are parked.
                if triggered.len() == 2 {
                    for (_, locator) in triggered.iter().rev() {
                        backend.begin(locator).unwrap();
                    }
                }
            }
            DownloadEvent::Completed { item, locator, .. } => {
                let (_, expected) = triggered.iter().find(|(p, _)| *p == item).unwrap();
                assert_eq!(&locator, expected);
                assert!(library.is_cached(&item).unwrap(), "{} not on disk", item.path);
                completed += 1;
            }
            _ => {}
        }
    }
    assert_eq!(completed, 2);
    assert_ne!(triggered[0].1, triggered[1].1);
    assert_eq!(downloads.finish().await.unwrap().dropped, 0);
    assert_eq!(std::fs::read(library.packed_path(&one, ".zip")).unwrap(), shared);
    assert_eq!(std::fs::read(library.packed_path(&two, ".zip")).unwrap(), shared);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_transfer_is_canceled_and_run_continues() {
    let good = body(1, 2048);
    let base = http_server::start(vec![
        ("/packs/broken.zip", Route::BrokenBody { len: 4096 }),
        ("/packs/good.zip", Route::file(good.clone())),
    ]);

    let dir = tempdir().unwrap();
    let library = Library::new(dir.path());
    let (backend, source) = HttpBackend::new(library.clone(), &base, BTreeMap::new()).unwrap();
    let broken = PackMetadata::new("/packs/broken.zip", "Broken", "Artist");
    let ok = PackMetadata::new("/packs/good.zip", "Good", "Artist");

    let (events, result) =
        run_correlated(&backend, source, vec![broken.clone(), ok.clone()], 1).await;
    let summary = result.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.canceled, 1);

    assert!(events
        .iter()
        .any(|e| matches!(e, DownloadEvent::Canceled { item, .. } if *item == broken)));
    assert!(!library.is_cached(&broken).unwrap());
    assert!(!Library::part_path(&library.packed_path(&broken, ".zip")).exists());
    assert_eq!(
        std::fs::read(library.packed_path(&ok, ".zip")).unwrap(),
        good
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_pack_fails_the_run() {
    let base = http_server::start(vec![]);
    let dir = tempdir().unwrap();
    let (backend, source) =
        HttpBackend::new(Library::new(dir.path()), &base, BTreeMap::new()).unwrap();

    let missing = PackMetadata::new("/packs/missing", "Missing", "Nobody");
    let (_, result) = run_correlated(&backend, source, vec![missing], 1).await;
    match result {
        Err(CorrelateError::TriggerFailure { item, .. }) => {
            assert!(item.contains("/packs/missing"))
        }
        other => panic!("expected TriggerFailure, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn direct_runner_downloads_packs() {
    let a = body(5, 5000);
    let b = body(9, 300);
    let base = http_server::start(vec![
        ("/packs/a.zip", Route::file(a.clone())),
        ("/packs/b.wav", Route::file(b.clone())),
    ]);
    let dir = tempdir().unwrap();
    let library = Library::new(dir.path());
    let (backend, _source) = HttpBackend::new(library.clone(), &base, BTreeMap::new()).unwrap();
    let packs = vec![
        PackMetadata::new("/packs/a.zip", "A", "Artist"),
        PackMetadata::new("/packs/b.wav", "B", "Artist"),
    ];

    let tasks: Vec<Task> = packs
        .iter()
        .cloned()
        .map(|pack| {
            let backend = backend.clone();
            task(move |_slot| async move { backend.download_direct(pack).await })
        })
        .collect();

    let report = scheduler::run_two_phase(1, tasks, SlotRelease::Secondary)
        .await
        .unwrap();
    assert_eq!(report.launched, 2);
    assert_eq!(report.secondaries, 2);
    assert_eq!(std::fs::read(library.packed_path(&packs[0], ".zip")).unwrap(), a);
    assert_eq!(std::fs::read(library.packed_path(&packs[1], ".wav")).unwrap(), b);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn probe_follows_redirects() {
    let base = http_server::start(vec![
        ("/packs/kit", Route::Redirect("/files/kit.zip".to_string())),
        ("/files/kit.zip", Route::attachment(vec![0u8; 123], "Kit.zip")),
    ]);
    let url = format!("{}packs/kit", base);
    let head = tokio::task::spawn_blocking(move || probe::probe(&url, &BTreeMap::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(head.effective_url, format!("{}files/kit.zip", base));
    assert_eq!(head.content_length, Some(123));
    assert_eq!(
        head.content_disposition.as_deref(),
        Some("attachment; filename=\"Kit.zip\"")
    );
}
