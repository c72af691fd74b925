mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{CallLog, Doc, doc_key, settle};
use searchdex_core::{ExtractionError, IndexEvent, IndexState, SearchIndexer, SearchdexError};
use searchdex_ingest::{IngestError, RuntimeMetrics};
use tokio::sync::Notify;

#[tokio::test]
async fn serial_indexer_starts_second_extraction_after_first_settles() {
    let log = CallLog::default();
    let calls = log.clone();
    let gate = Arc::new(Notify::new());
    let release = Arc::clone(&gate);

    let indexer = SearchIndexer::<Doc>::builder()
        .key_fn(doc_key)
        .extract_async(move |doc: &Doc| {
            calls.record(doc.id);
            let gate = Arc::clone(&gate);
            let id = doc.id;
            async move {
                if id == 1 {
                    gate.notified().await;
                }
                Ok::<_, ExtractionError>(vec![id.to_string()])
            }
        })
        .build()
        .expect("indexer should start");
    assert_eq!(indexer.config().concurrency, 1);

    indexer
        .update(vec![Doc::new(1, "a"), Doc::new(2, "b")])
        .expect("update");

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(log.calls(), vec![1]);
    let stats = indexer.stats();
    assert_eq!(stats.in_flight, 1);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.pending, 2);

    release.notify_one();
    settle(&indexer).await;

    assert_eq!(log.calls(), vec![1, 2]);
    assert_eq!(indexer.stats().indexed, 2);
}

#[derive(Default)]
struct PeakMetrics {
    peak_in_flight: AtomicUsize,
}

impl RuntimeMetrics for PeakMetrics {
    fn observe_queue_depth(&self, _depth: usize) {}

    fn observe_in_flight(&self, in_flight: usize) {
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
    }

    fn observe_task_latency_ms(&self, _latency_ms: u64) {}

    fn observe_commit(&self, _ok: bool) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn outstanding_extractions_never_exceed_concurrency() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let metrics = Arc::new(PeakMetrics::default());

    let indexer = {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        SearchIndexer::<Doc>::builder()
            .key_fn(doc_key)
            .extract_async(move |doc: &Doc| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                let text = doc.text.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ExtractionError>(vec![text])
                }
            })
            .concurrency(3)
            .metrics(metrics.clone())
            .build()
            .expect("indexer should start")
    };

    let first: Vec<Doc> = (0..10).map(|id| Doc::new(id, "x")).collect();
    let second: Vec<Doc> = (0..20).map(|id| Doc::new(id, "x")).collect();
    indexer.update(first).expect("first update");
    indexer.update(second).expect("second update");
    settle(&indexer).await;

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency was {peak}");
    assert!(metrics.peak_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(indexer.stats().indexed, 20);
}

#[tokio::test]
async fn failed_extraction_is_recorded_and_never_retried() {
    let log = CallLog::default();
    let calls = log.clone();
    let indexer = SearchIndexer::<Doc>::builder()
        .key_fn(doc_key)
        .extract_async(move |doc: &Doc| {
            calls.record(doc.id);
            let id = doc.id;
            async move {
                if id == 2 {
                    Err(ExtractionError::Failed("source unavailable".to_string()))
                } else {
                    Ok(vec![id.to_string()])
                }
            }
        })
        .build()
        .expect("indexer should start");
    let mut events = indexer.events();

    let docs = vec![Doc::new(1, "a"), Doc::new(2, "b")];
    indexer.update(docs.clone()).expect("update");
    settle(&indexer).await;

    let store = indexer.store();
    match &store.get("KEY-2").expect("entry").state {
        IndexState::Failed(reason) => assert!(reason.contains("source unavailable")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(indexer.indexed().len(), 1);

    assert_eq!(
        events.try_recv().expect("first event"),
        IndexEvent::Indexed {
            key: "KEY-1".to_string()
        }
    );
    match events.try_recv().expect("second event") {
        IndexEvent::Failed { key, reason } => {
            assert_eq!(key, "KEY-2");
            assert!(reason.contains("source unavailable"));
        }
        other => panic!("expected failure event, got {other:?}"),
    }

    indexer.update(docs).expect("repeat update");
    settle(&indexer).await;
    assert_eq!(log.calls(), vec![1, 2]);
    assert_eq!(indexer.stats().failed, 1);
}

#[tokio::test]
async fn panicking_extractor_marks_entry_failed() {
    let indexer = SearchIndexer::<Doc>::builder()
        .key_fn(doc_key)
        .extract_with(|doc: &Doc| {
            if doc.id == 1 {
                panic!("bad record {}", doc.id);
            }
            vec![doc.text.clone()]
        })
        .build()
        .expect("indexer should start");

    indexer
        .update(vec![Doc::new(1, "a"), Doc::new(2, "b")])
        .expect("update");
    settle(&indexer).await;

    let store = indexer.store();
    match &store.get("KEY-1").expect("entry").state {
        IndexState::Failed(reason) => assert!(reason.contains("bad record 1")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(store.get("KEY-2").expect("entry").index(), Some("b"));
}

#[tokio::test]
async fn shutdown_waits_for_running_extraction_and_rejects_new_keys() {
    let gate = Arc::new(Notify::new());
    let release = Arc::clone(&gate);
    let indexer = SearchIndexer::<Doc>::builder()
        .key_fn(doc_key)
        .extract_async(move |doc: &Doc| {
            let gate = Arc::clone(&gate);
            let text = doc.text.clone();
            async move {
                gate.notified().await;
                Ok::<_, ExtractionError>(vec![text])
            }
        })
        .build()
        .expect("indexer should start");

    indexer.update(vec![Doc::new(1, "a")]).expect("update");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(indexer.stats().in_flight, 1);

    release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), indexer.shutdown())
        .await
        .expect("shutdown should finish")
        .expect("shutdown should succeed");
    assert_eq!(indexer.store().get("KEY-1").expect("entry").index(), Some("a"));

    // known keys still reconcile, new keys cannot be scheduled
    indexer.update(vec![Doc::new(1, "a")]).expect("known keys only");
    let err = indexer
        .update(vec![Doc::new(1, "a"), Doc::new(2, "b")])
        .expect_err("new key after shutdown");
    assert!(matches!(err, SearchdexError::Ingest(IngestError::Closed(_))));
}
