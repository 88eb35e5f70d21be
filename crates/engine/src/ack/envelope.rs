// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-message acknowledgement state machine.
//!
//! # Two-phase completion
//!
//! An envelope moves `InFlight -> Completed -> Executed`. The split
//! between *completion* (a CAS any thread may win) and *execution* (the
//! single place callbacks actually run) is what lets an [`AckQueue`]
//! accept concurrent completions from many threads while serializing
//! callback execution on one drainer in strict FIFO order.
//!
//! # At-most-once
//!
//! Two independent one-shot primitives enforce the contract:
//!
//! - the state CAS decides which completion call wins;
//! - the cause slot (`OnceLock`) keeps the *first* nack's cause, even when
//!   later acks or nacks race in.
//!
//! `execute` swaps the state to `Executed` and takes the callback pair out
//! of its slot, so the surviving callback runs exactly once no matter how
//! many threads raced on completion.
//!
//! # Detached vs queued envelopes
//!
//! Envelopes created with [`AckEnvelope::new`] (or emitted by an
//! [`AckPublisher`](crate::ack::AckPublisher)) are *detached*: there is no
//! drainer, so the winning completion call also executes the callback
//! immediately. Envelopes created by [`AckQueue::add`] route their
//! completion through the owning queue's ordering policy and trigger a
//! drain pass instead.

use crate::ack::queue::{AckQueue, Completion};
use crate::ack::types::{Acknowledger, CallbackError, Cause, Nacknowledger};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

// Envelope lifecycle states. Kept as raw u8 so the state lives in a single
// atomic word.
const IN_FLIGHT: u8 = 0;
const COMPLETED: u8 = 1;
const EXECUTED: u8 = 2;

/// A message envelope bundling a payload with its acknowledgers.
///
/// Cheaply cloneable; clones share the payload and the completion state,
/// so an envelope can be forked across pipeline branches and completed
/// from whichever branch finishes first. Across all clones, the
/// acknowledger and nacknowledger together run at most once.
pub struct AckEnvelope<T = ()> {
    payload: Arc<T>,
    entry: Arc<Entry>,
    route: Route,
}

impl<T> std::fmt::Debug for AckEnvelope<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckEnvelope").finish_non_exhaustive()
    }
}

impl<T> Clone for AckEnvelope<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            entry: Arc::clone(&self.entry),
            route: self.route.clone(),
        }
    }
}

/// Where a completion call is resolved.
#[derive(Clone)]
enum Route {
    /// No queue: the winning completion call executes the callback itself.
    Detached,
    /// Owned by a queue: completion is admitted by the queue's ordering
    /// policy and executed by its drainer.
    Queued(Arc<AckQueue>),
}

impl<T> AckEnvelope<T> {
    /// Create a detached envelope in the in-flight state.
    pub fn new(payload: T, ack: Acknowledger, nack: Nacknowledger) -> Self {
        Self {
            payload: Arc::new(payload),
            entry: Arc::new(Entry::new(ack, nack)),
            route: Route::Detached,
        }
    }

    pub(crate) fn queued(payload: Arc<T>, entry: Arc<Entry>, queue: Arc<AckQueue>) -> Self {
        Self {
            payload,
            entry,
            route: Route::Queued(queue),
        }
    }

    /// The payload carried by this envelope.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Whether this envelope has not yet been completed.
    ///
    /// A snapshot: the answer may be stale by the time it is read.
    /// Consumers whose correctness depends on it must re-check under their
    /// own synchronization.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.entry.is_in_flight()
    }

    /// Positively complete this envelope.
    ///
    /// Returns `true` iff this call performed the completion. Redundant
    /// calls -- and completions racing against a nack that already won --
    /// return `false` and have no effect. On a queued envelope under the
    /// `Ordered` policy, a completion attempt on a non-head entry is
    /// refused and must be retried once the head has moved.
    pub fn acknowledge(&self) -> bool {
        match &self.route {
            Route::Detached => {
                if !self.entry.complete() {
                    return false;
                }
                if let Err(error) = self.entry.execute() {
                    tracing::warn!(%error, "acknowledger failed");
                }
                true
            }
            Route::Queued(queue) => queue.resolve(&self.entry, Completion::Ack).completed,
        }
    }

    /// Negatively complete this envelope with a cause.
    ///
    /// Returns `true` iff this call both recorded the cause and performed
    /// the completion. The first recorded cause is the one delivered to
    /// the nacknowledger.
    pub fn nacknowledge(&self, cause: Cause) -> bool {
        match &self.route {
            Route::Detached => {
                if !self.entry.complete_exceptionally(cause) {
                    return false;
                }
                if let Err(error) = self.entry.execute() {
                    tracing::warn!(%error, "nacknowledger failed");
                }
                true
            }
            Route::Queued(queue) => {
                queue.resolve(&self.entry, Completion::Nack(cause)).completed
            }
        }
    }

    pub(crate) fn entry(&self) -> &Arc<Entry> {
        &self.entry
    }

    pub(crate) fn payload_handle(&self) -> Arc<T> {
        Arc::clone(&self.payload)
    }

    /// Whether this envelope was created by `queue`.
    pub(crate) fn belongs_to(&self, queue: &AckQueue) -> bool {
        match &self.route {
            Route::Detached => false,
            Route::Queued(owner) => std::ptr::eq(Arc::as_ptr(owner), queue),
        }
    }
}

/// The shared completion state behind an envelope.
///
/// Held by every clone of the envelope and, for queued envelopes, by the
/// owning queue's in-flight ledger.
pub(crate) struct Entry {
    state: AtomicU8,
    cause: OnceLock<Cause>,
    callbacks: Mutex<Option<Callbacks>>,
}

struct Callbacks {
    ack: Acknowledger,
    nack: Nacknowledger,
}

impl Entry {
    pub(crate) fn new(ack: Acknowledger, nack: Nacknowledger) -> Self {
        Self {
            state: AtomicU8::new(IN_FLIGHT),
            cause: OnceLock::new(),
            callbacks: Mutex::new(Some(Callbacks { ack, nack })),
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.state.load(Ordering::Acquire) == IN_FLIGHT
    }

    /// `InFlight -> Completed`. Returns whether this call transitioned.
    pub(crate) fn complete(&self) -> bool {
        self.state
            .compare_exchange(IN_FLIGHT, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record `cause` (first writer wins) then `InFlight -> Completed`.
    /// Returns whether this call did both.
    pub(crate) fn complete_exceptionally(&self, cause: Cause) -> bool {
        self.cause.set(cause).is_ok() && self.complete()
    }

    /// `* -> Executed`; runs the surviving callback on first entry.
    ///
    /// The cause slot decides which callback fires: a cause recorded by
    /// any nack -- even one that lost the completion race -- routes to the
    /// nacknowledger.
    pub(crate) fn execute(&self) -> Result<(), CallbackError> {
        if self.state.swap(EXECUTED, Ordering::AcqRel) == EXECUTED {
            return Ok(());
        }
        let Some(callbacks) = self.callbacks.lock().take() else {
            return Ok(());
        };
        match self.cause.get() {
            Some(cause) => (callbacks.nack)(Arc::clone(cause)),
            None => (callbacks.ack)(),
        }
    }
}
