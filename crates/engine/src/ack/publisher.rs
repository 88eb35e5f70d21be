// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Acknowledging stream adapter.
//!
//! # Structure
//!
//! [`AckPublisher`] holds the upstream source and the pair of
//! source-level terminal callbacks until the single permitted
//! [`subscribe`](AckPublisher::subscribe) call moves them into an
//! [`AckStream`]. The stream re-emits each upstream value inside a
//! detached [`AckEnvelope`] and tracks resolution through a shared
//! `SubscriberState`.
//!
//! # Pending-value tracking
//!
//! Each emitted value is assigned a monotonically increasing `u64` handle
//! kept in a pending set guarded by a short mutex. The envelope callbacks
//! resolve the *handle*, never the payload, so downstream stages that drop
//! the original value cost nothing here and two payload-equal values never
//! alias each other's acknowledgement.
//!
//! # Subscription lifecycle
//!
//! ```text
//!        subscribe()
//! Active ---------- emissions, drop?, end?, error?
//!    |
//!    |- upstream end or stream drop, pending non-empty --> Draining
//!    |                                   |
//!    |                                   '- last envelope ack --> Terminated (src_ack)
//!    |
//!    '- upstream error | any envelope nack --> Terminated (src_nack)
//! ```
//!
//! Exactly one of `src_ack` / `src_nack` fires, exactly once, per
//! subscription. Terminal callbacks run under the pending-set lock, on
//! whichever thread resolved the last envelope; their ordering relative to
//! downstream propagation is deliberately unconstrained.

use crate::ack::envelope::AckEnvelope;
use crate::ack::types::{Acknowledger, Cause, Nacknowledger};
use crate::error::Error;
use ackflow_config::SourceName;
use futures_core::Stream;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::task::{Context, Poll};

// Subscription lifecycle states.
const ACTIVE: u8 = 0;
const DRAINING: u8 = 1;
const TERMINATED: u8 = 2;

/// Single-subscription adapter wrapping an upstream source of values with
/// a pair of source-level terminal callbacks.
///
/// The adapter emits each value inside an [`AckEnvelope`] and fires
/// `src_ack` exactly once, after the upstream has terminated normally and
/// every emitted envelope has been acknowledged -- or `src_nack` exactly
/// once with the first observed failure.
pub struct AckPublisher<S> {
    name: SourceName,
    source: Mutex<Option<S>>,
    terminal: Mutex<Option<Terminal>>,
    subscribed: AtomicBool,
}

struct Terminal {
    ack: Acknowledger,
    nack: Nacknowledger,
}

impl<S> AckPublisher<S> {
    /// Wrap `source` with source-level terminal callbacks.
    pub fn new(
        name: impl Into<SourceName>,
        source: S,
        src_ack: Acknowledger,
        src_nack: Nacknowledger,
    ) -> Self {
        Self {
            name: name.into(),
            source: Mutex::new(Some(source)),
            terminal: Mutex::new(Some(Terminal {
                ack: src_ack,
                nack: src_nack,
            })),
            subscribed: AtomicBool::new(false),
        }
    }

    /// The name of this publisher.
    #[must_use]
    pub fn name(&self) -> &SourceName {
        &self.name
    }

    /// Take the single permitted subscription.
    ///
    /// A second call returns [`Error::AlreadySubscribed`] synchronously
    /// and leaves the first subscription untouched.
    pub fn subscribe(&self) -> Result<AckStream<S>, Error> {
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadySubscribed {
                publisher: self.name.clone(),
            });
        }
        let source = self
            .source
            .lock()
            .take()
            .expect("source should be present until the first subscribe");
        let terminal = self
            .terminal
            .lock()
            .take()
            .expect("terminal callbacks should be present until the first subscribe");
        Ok(AckStream {
            source: Box::pin(source),
            shared: Arc::new(SubscriberState {
                name: self.name.clone(),
                lifecycle: AtomicU8::new(ACTIVE),
                pending: Mutex::new(HashSet::new()),
                next_handle: AtomicU64::new(0),
                terminal: Mutex::new(Some(terminal)),
            }),
            done: false,
        })
    }
}

/// The stream of envelopes produced by [`AckPublisher::subscribe`].
///
/// Dropping the stream cancels the upstream subscription; pending
/// envelopes are not nacked and may still resolve, after which the
/// source-level acknowledger fires as usual.
pub struct AckStream<S> {
    source: Pin<Box<S>>,
    shared: Arc<SubscriberState>,
    done: bool,
}

impl<S> std::fmt::Debug for AckStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckStream").finish_non_exhaustive()
    }
}

impl<S, T> Stream for AckStream<S>
where
    S: Stream<Item = Result<T, Cause>>,
    T: Send + Sync + 'static,
{
    type Item = Result<AckEnvelope<T>, Cause>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.source.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(value))) => {
                Poll::Ready(Some(Ok(this.shared.wrap(value))))
            }
            Poll::Ready(Some(Err(cause))) => {
                // A source error is terminal: fire the nacknowledger (at
                // most once), forward the error, and fuse the stream.
                this.done = true;
                this.shared.on_source_error(Arc::clone(&cause));
                Poll::Ready(Some(Err(cause)))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.shared.on_source_end();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for AckStream<S> {
    fn drop(&mut self) {
        // Downstream cancellation: the upstream source is dropped with us;
        // already-emitted envelopes keep the shared state alive and may
        // still fire the terminal acknowledger when the last one resolves.
        self.shared.on_source_end();
    }
}

/// State shared between the stream and every envelope it has emitted.
struct SubscriberState {
    name: SourceName,
    lifecycle: AtomicU8,
    pending: Mutex<HashSet<u64>>,
    next_handle: AtomicU64,
    terminal: Mutex<Option<Terminal>>,
}

impl SubscriberState {
    /// Assign a handle to a freshly emitted value and wrap it.
    fn wrap<T>(self: &Arc<Self>, value: T) -> AckEnvelope<T> {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.pending.lock();
            // A terminal transition may race this emission; registration
            // is decided under the pending lock, which every terminal
            // path also holds.
            if self.lifecycle.load(Ordering::Acquire) == ACTIVE {
                let _ = pending.insert(handle);
            }
        }
        let ack_state = Arc::clone(self);
        let nack_state = Arc::clone(self);
        AckEnvelope::new(
            value,
            Box::new(move || {
                ack_state.resolve_ack(handle);
                Ok(())
            }),
            Box::new(move |cause| {
                nack_state.resolve_nack(handle, cause);
                Ok(())
            }),
        )
    }

    fn resolve_ack(&self, handle: u64) {
        let mut pending = self.pending.lock();
        if pending.remove(&handle) {
            self.try_fire_ack(&mut pending);
        }
    }

    fn resolve_nack(&self, handle: u64, cause: Cause) {
        let mut pending = self.pending.lock();
        // A handle that was already resolved (or cleared by an earlier
        // terminal failure) no longer speaks for this subscription.
        if pending.contains(&handle) {
            self.try_fire_nack(&mut pending, cause);
        }
    }

    fn on_source_end(&self) {
        if self
            .lifecycle
            .compare_exchange(ACTIVE, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let mut pending = self.pending.lock();
            self.try_fire_ack(&mut pending);
        }
    }

    fn on_source_error(&self, cause: Cause) {
        let mut pending = self.pending.lock();
        self.try_fire_nack(&mut pending, cause);
    }

    /// Fire `src_ack` iff nothing is pending and the upstream has ended.
    /// Caller holds the pending lock.
    fn try_fire_ack(&self, pending: &mut HashSet<u64>) {
        if pending.is_empty()
            && self
                .lifecycle
                .compare_exchange(DRAINING, TERMINATED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            if let Some(terminal) = self.terminal.lock().take() {
                if let Err(error) = (terminal.ack)() {
                    tracing::warn!(publisher = %self.name, %error, "source acknowledger failed");
                }
            }
        }
    }

    /// Fire `src_nack` iff no terminal callback has fired yet. Caller
    /// holds the pending lock.
    fn try_fire_nack(&self, pending: &mut HashSet<u64>, cause: Cause) {
        let terminated = self
            .lifecycle
            .compare_exchange(ACTIVE, TERMINATED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            || self
                .lifecycle
                .compare_exchange(DRAINING, TERMINATED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        if terminated {
            pending.clear();
            if let Some(terminal) = self.terminal.lock().take() {
                if let Err(error) = (terminal.nack)(cause) {
                    tracing::warn!(publisher = %self.name, %error, "source nacknowledger failed");
                }
            }
        }
    }
}
