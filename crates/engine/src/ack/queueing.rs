// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Funnels envelope completions through an acknowledgement queue.
//!
//! Downstream stages complete envelopes in whatever order their work
//! finishes; a source that commits positions (a Kafka consumer committing
//! offsets) needs those completions surfaced in emission order. This
//! combinator re-wraps every envelope that flows through it: the original
//! envelope becomes a queue entry, and the re-emitted envelope resolves
//! that entry through the queue, so the underlying acknowledgements
//! execute in strict emission order (or per the queue's `Ordered`
//! admission contract).
//!
//! Several streams may share one queue; their entries interleave in
//! arrival order.

use crate::ack::envelope::AckEnvelope;
use crate::ack::queue::AckQueue;
use crate::ack::types::Cause;
use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Stream adapter ordering envelope completions through an [`AckQueue`].
pub struct QueuedAckStream<S> {
    source: Pin<Box<S>>,
    queue: Arc<AckQueue>,
}

impl<S> QueuedAckStream<S> {
    /// Wrap `source` so every envelope it yields is resolved through
    /// `queue`.
    pub fn new(source: S, queue: Arc<AckQueue>) -> Self {
        Self {
            source: Box::pin(source),
            queue,
        }
    }

    /// The queue this stream resolves envelopes through.
    #[must_use]
    pub fn queue(&self) -> &Arc<AckQueue> {
        &self.queue
    }
}

impl<S, T> Stream for QueuedAckStream<S>
where
    S: Stream<Item = Result<AckEnvelope<T>, Cause>>,
    T: Send + Sync + 'static,
{
    type Item = Result<AckEnvelope<T>, Cause>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.source.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(envelope))) => {
                Poll::Ready(Some(Ok(enqueue(&this.queue, envelope))))
            }
            Poll::Ready(Some(Err(cause))) => Poll::Ready(Some(Err(cause))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Register `envelope` as a queue entry and build its replacement.
///
/// The entry delegates to the original envelope, so when the queue drains
/// it, the original acknowledgement (whatever it was bound to) runs. The
/// replacement shares the payload and resolves the entry through the
/// queue's admission policy.
fn enqueue<T>(queue: &Arc<AckQueue>, envelope: AckEnvelope<T>) -> AckEnvelope<T>
where
    T: Send + Sync + 'static,
{
    let payload = envelope.payload_handle();
    let ack_target = envelope.clone();
    let nack_target = envelope;
    queue.register(
        payload,
        Box::new(move || {
            _ = ack_target.acknowledge();
            Ok(())
        }),
        Box::new(move |cause| {
            _ = nack_target.nacknowledge(cause);
            Ok(())
        }),
    )
}
