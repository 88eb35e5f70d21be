// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Benchmarks for acknowledgement queue completion and drain throughput.
//!
//! Scenarios:
//! - unordered queue, completions in emission order (drain degenerates to
//!   one entry per pass)
//! - unordered queue, completions in reverse order (one drain releases
//!   the whole backlog)
//! - ordered queue, completions in emission order

#![allow(missing_docs)]

use ackflow_config::{AckOrdering, AckQueueSettings};
use ackflow_engine::ack::{Acknowledger, AckQueue, Nacknowledger};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

const MSG_COUNT: usize = 10_000;

fn noop_ack() -> Acknowledger {
    Box::new(|| Ok(()))
}

fn noop_nack() -> Nacknowledger {
    Box::new(|_| Ok(()))
}

fn run_in_order(settings: &AckQueueSettings, msg_count: usize) -> u64 {
    let queue = AckQueue::new("bench", settings).expect("settings should be valid");
    let envelopes: Vec<_> = (0..msg_count)
        .map(|_| queue.add(noop_ack(), noop_nack()))
        .collect();
    let mut drained = 0;
    for envelope in &envelopes {
        drained += queue
            .complete(envelope)
            .expect("envelope should belong to the queue");
    }
    drained
}

fn run_reverse_order(msg_count: usize) -> u64 {
    let queue =
        AckQueue::new("bench", &AckQueueSettings::default()).expect("settings should be valid");
    let envelopes: Vec<_> = (0..msg_count)
        .map(|_| queue.add(noop_ack(), noop_nack()))
        .collect();
    let mut drained = 0;
    for envelope in envelopes.iter().rev() {
        drained += queue
            .complete(envelope)
            .expect("envelope should belong to the queue");
    }
    drained
}

fn bench_ack_queue(c: &mut Criterion) {
    let ordered = AckQueueSettings {
        ordering: AckOrdering::Ordered,
        ..AckQueueSettings::default()
    };

    let mut group = c.benchmark_group("ack_queue");
    group.throughput(Throughput::Elements(MSG_COUNT as u64));
    group.bench_function("unordered_in_order", |b| {
        b.iter(|| black_box(run_in_order(&AckQueueSettings::default(), MSG_COUNT)));
    });
    group.bench_function("unordered_reverse_order", |b| {
        b.iter(|| black_box(run_reverse_order(MSG_COUNT)));
    });
    group.bench_function("ordered_in_order", |b| {
        b.iter(|| black_box(run_in_order(&ordered, MSG_COUNT)));
    });
    group.finish();
}

criterion_group!(benches, bench_ack_queue);
criterion_main!(benches);
