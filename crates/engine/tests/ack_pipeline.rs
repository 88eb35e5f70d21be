// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end pipeline test: a publisher wrapping a simulated partition
//! feed, a transform stage, and a queueing stage. Downstream completions
//! arrive in scrambled order (or from concurrent tasks); position
//! acknowledgements must execute in emission order and the source-level
//! commit must fire exactly once.

use ackflow_config::AckQueueSettings;
use ackflow_engine::ack::{AckEnvelope, AckPublisher, AckQueue, Cause, QueuedAckStream};
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Pipeline {
    envelopes: Vec<AckEnvelope<u64>>,
    offset_log: Arc<Mutex<Vec<u64>>>,
    commits: Arc<AtomicUsize>,
}

/// Feed `count` offsets through publisher -> transform -> queueing and
/// consume the whole stream. The transform stage records each offset at
/// the moment its acknowledgement executes.
async fn build_pipeline(count: u64) -> Pipeline {
    let commits = Arc::new(AtomicUsize::new(0));
    let offset_log = Arc::new(Mutex::new(Vec::new()));

    let (tx, rx) = mpsc::unbounded::<Result<u64, Cause>>();
    let commit_counter = Arc::clone(&commits);
    let publisher = AckPublisher::new(
        "orders-partition-0",
        rx,
        Box::new(move || {
            let _ = commit_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
        Box::new(|_| Ok(())),
    );
    let stream = publisher.subscribe().unwrap();

    let log = Arc::clone(&offset_log);
    let transformed = stream.map(move |item| {
        item.map(|envelope| {
            let offset = *envelope.payload();
            let log = Arc::clone(&log);
            let ack_target = envelope.clone();
            let nack_target = envelope;
            AckEnvelope::new(
                offset,
                Box::new(move || {
                    log.lock().push(offset);
                    _ = ack_target.acknowledge();
                    Ok(())
                }),
                Box::new(move |cause| {
                    _ = nack_target.nacknowledge(cause);
                    Ok(())
                }),
            )
        })
    });

    let queue = AckQueue::new("orders-partition-0", &AckQueueSettings::default()).unwrap();
    let mut pipeline = QueuedAckStream::new(transformed, queue);

    for offset in 0..count {
        tx.unbounded_send(Ok(offset)).unwrap();
    }
    let mut envelopes = Vec::new();
    for _ in 0..count {
        envelopes.push(pipeline.next().await.unwrap().unwrap());
    }
    drop(tx);
    assert!(pipeline.next().await.is_none());

    Pipeline {
        envelopes,
        offset_log,
        commits,
    }
}

// Scrambled single-threaded completion order still acknowledges offsets in
// emission order and commits the source exactly once.
#[tokio::test]
async fn scrambled_completions_acknowledge_in_emission_order() {
    let pipeline = build_pipeline(5).await;
    assert_eq!(pipeline.commits.load(Ordering::SeqCst), 0);

    for index in [3usize, 0, 4, 1, 2] {
        assert!(pipeline.envelopes[index].acknowledge());
    }

    assert_eq!(pipeline.offset_log.lock().as_slice(), [0, 1, 2, 3, 4]);
    assert_eq!(pipeline.commits.load(Ordering::SeqCst), 1);
}

// Completions racing in from concurrent tasks on real worker threads:
// ordering and single-commit still hold.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_acknowledge_in_emission_order() {
    let pipeline = build_pipeline(64).await;

    let mut workers = Vec::new();
    for envelope in &pipeline.envelopes {
        let envelope = envelope.clone();
        workers.push(tokio::spawn(async move {
            assert!(envelope.acknowledge());
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let expected: Vec<u64> = (0..64).collect();
    assert_eq!(*pipeline.offset_log.lock(), expected);
    assert_eq!(pipeline.commits.load(Ordering::SeqCst), 1);
}
