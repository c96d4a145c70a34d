//! Tests for the async correlation driver with a scripted event source.

use super::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn loc(item: &str) -> ResourceLocator {
    ResourceLocator(format!("https://cdn.test/{}.zip", item))
}

async fn next_event<I>(downloads: &mut Downloads<I>) -> Option<DownloadEvent<I>> {
    tokio::time::timeout(Duration::from_secs(5), downloads.next())
        .await
        .expect("timed out waiting for event")
}

async fn send(tx: &mpsc::Sender<SourceEvent>, event: SourceEvent) {
    tx.send(event).await.unwrap();
}

fn started(session: &str, item: &str) -> SourceEvent {
    SourceEvent::Started {
        session_id: session.into(),
        locator: loc(item),
    }
}

fn completed(session: &str) -> SourceEvent {
    SourceEvent::Completed {
        session_id: session.into(),
    }
}

#[tokio::test]
async fn two_slots_three_items() {
    let (calls_tx, mut calls_rx) = mpsc::unbounded_channel();
    let (src_tx, src_rx) = mpsc::channel(16);
    let mut downloads = start(
        2,
        vec!["a", "b", "c"],
        move |item: &'static str| {
            let calls = calls_tx.clone();
            async move {
                let _ = calls.send(item);
                Ok(loc(item))
            }
        },
        src_rx,
    );

    let mut first = vec![
        next_event(&mut downloads).await.unwrap(),
        next_event(&mut downloads).await.unwrap(),
    ];
    first.sort_by_key(|e| e.slot());
    assert_eq!(
        first,
        vec![
            DownloadEvent::Triggered {
                slot: Slot(0),
                item: "a",
                locator: loc("a")
            },
            DownloadEvent::Triggered {
                slot: Slot(1),
                item: "b",
                locator: loc("b")
            },
        ]
    );
    let mut calls = HashSet::new();
    while let Ok(item) = calls_rx.try_recv() {
        calls.insert(item);
    }
    assert_eq!(calls, HashSet::from(["a", "b"]));

    send(&src_tx, started("s-1", "a")).await;
    assert_eq!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Started {
            slot: Slot(0),
            item: "a",
            locator: loc("a")
        })
    );

    send(
        &src_tx,
        SourceEvent::Progress {
            session_id: "s-1".into(),
            received: 50,
            total: 200,
        },
    )
    .await;
    assert_eq!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::InProgress {
            slot: Slot(0),
            item: "a",
            percentage: 25.0
        })
    );

    send(&src_tx, completed("s-1")).await;
    assert_eq!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Completed {
            slot: Slot(0),
            item: "a",
            locator: loc("a")
        })
    );
    assert_eq!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Triggered {
            slot: Slot(0),
            item: "c",
            locator: loc("c")
        })
    );
    assert_eq!(calls_rx.recv().await, Some("c"));

    send(&src_tx, started("s-2", "b")).await;
    send(&src_tx, started("s-3", "c")).await;
    send(&src_tx, completed("s-2")).await;
    send(&src_tx, completed("s-3")).await;

    let mut rest = Vec::new();
    while let Some(event) = next_event(&mut downloads).await {
        rest.push(event);
    }
    assert!(matches!(rest[0], DownloadEvent::Started { slot: Slot(1), item: "b", .. }));
    assert!(matches!(rest[1], DownloadEvent::Started { slot: Slot(0), item: "c", .. }));
    assert!(matches!(rest[2], DownloadEvent::Completed { slot: Slot(1), item: "b", .. }));
    assert!(matches!(rest[3], DownloadEvent::Completed { slot: Slot(0), item: "c", .. }));
    assert_eq!(rest[4], DownloadEvent::AllComplete);
    assert_eq!(rest.len(), 5);

    let summary = downloads.finish().await.unwrap();
    assert_eq!(
        summary,
        RunSummary {
            total: 3,
            completed: 3,
            canceled: 0,
            dropped: 0,
            interrupted: false
        }
    );
}

#[tokio::test]
async fn empty_backlog_completes_without_triggering() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let (_src_tx, src_rx) = mpsc::channel(1);
    let mut downloads = start(
        1,
        Vec::<&'static str>::new(),
        move |item| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(loc(item)) }
        },
        src_rx,
    );

    assert_eq!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::AllComplete)
    );
    assert_eq!(next_event(&mut downloads).await, None);
    let summary = downloads.finish().await.unwrap();
    assert_eq!(summary.total, 0);
    assert!(!summary.interrupted);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_session_progress_is_ignored() {
    let (src_tx, src_rx) = mpsc::channel(16);
    let mut downloads = start(1, vec!["a"], |item| async move { Ok(loc(item)) }, src_rx);

    assert!(matches!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Triggered { .. })
    ));

    send(
        &src_tx,
        SourceEvent::Progress {
            session_id: "never-started".into(),
            received: 1,
            total: 2,
        },
    )
    .await;
    send(&src_tx, started("s-1", "a")).await;
    assert!(matches!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Started { item: "a", .. })
    ));

    send(&src_tx, completed("s-1")).await;
    assert!(matches!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Completed { item: "a", .. })
    ));
    assert_eq!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::AllComplete)
    );

    let summary = downloads.finish().await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.dropped, 1);
}

#[tokio::test]
async fn trigger_failure_ends_the_run() {
    let (_src_tx, src_rx) = mpsc::channel(16);
    let mut downloads = start(
        1,
        vec!["bad", "good"],
        |item: &'static str| async move {
            if item == "bad" {
                anyhow::bail!("download button not found");
            }
            Ok(loc(item))
        },
        src_rx,
    );

    assert_eq!(next_event(&mut downloads).await, None);
    let err = downloads.finish().await.unwrap_err();
    match err {
        CorrelateError::TriggerFailure { slot, item, source } => {
            assert_eq!(slot, Slot(0));
            assert!(item.contains("bad"));
            assert!(source.to_string().contains("download button"));
        }
        other => panic!("expected TriggerFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn closing_the_source_interrupts_the_run() {
    let (src_tx, src_rx) = mpsc::channel(16);
    let mut downloads = start(1, vec!["a", "b"], |item| async move { Ok(loc(item)) }, src_rx);

    assert!(matches!(
        next_event(&mut downloads).await,
        Some(DownloadEvent::Triggered { item: "a", .. })
    ));
    drop(src_tx);

    assert_eq!(next_event(&mut downloads).await, None);
    let summary = downloads.finish().await.unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.total, 2);
}

#[tokio::test]
async fn outstanding_items_never_exceed_concurrency() {
    let items: Vec<String> = (0..7).map(|i| format!("pack-{i}")).collect();
    let (src_tx, src_rx) = mpsc::channel(64);
    let mut downloads = start(
        3,
        items.clone(),
        |item: String| async move { Ok(loc(&item)) },
        src_rx,
    );

    let mut in_flight: HashMap<String, Slot> = HashMap::new();
    let mut done = 0usize;
    let mut session = 0usize;
    let mut saw_all_complete = false;

    while let Some(event) = next_event(&mut downloads).await {
        match event {
            DownloadEvent::Triggered { slot, item, .. } => {
                assert!(slot.index() < 3);
                assert!(
                    in_flight.values().all(|s| *s != slot),
                    "slot {slot} reused while busy"
                );
                in_flight.insert(item.clone(), slot);
                assert!(in_flight.len() <= 3);
                session += 1;
                let id = format!("s-{session}");
                send(&src_tx, started(&id, &item)).await;
                send(&src_tx, completed(&id)).await;
            }
            DownloadEvent::Completed { slot, item, .. } => {
                assert_eq!(in_flight.remove(&item), Some(slot));
                done += 1;
            }
            DownloadEvent::AllComplete => {
                assert_eq!(done, items.len());
                saw_all_complete = true;
            }
            _ => {}
        }
    }

    assert!(saw_all_complete);
    assert!(in_flight.is_empty());
    let summary = downloads.finish().await.unwrap();
    assert_eq!(summary.completed, 7);
}
