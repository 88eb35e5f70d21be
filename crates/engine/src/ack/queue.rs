// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Thread-safe in-flight acknowledgement ledger.
//!
//! # Structure
//!
//! `AckQueue` keeps its entries in a `Mutex<VecDeque<..>>`. The lock is
//! held only for push, head inspection, and pop -- never across callback
//! execution -- so critical sections stay in the nanosecond range while
//! the interesting coordination happens on the `drains_in_progress`
//! counter.
//!
//! # Single-drainer protocol
//!
//! Any thread that completes an entry requests a drain. The first
//! requester (the one that observed the counter at zero) becomes the
//! drainer; every other concurrent requester just increments the counter
//! and leaves. The drainer pops and executes the completed prefix of the
//! queue, then subtracts the requests it has absorbed; if more arrived
//! while it was working, it loops. The result: callbacks execute in
//! strict insertion order, on exactly one thread at a time, without a
//! drain mutex, and every completed entry is eventually executed.
//!
//! # Ordering policy
//!
//! The two queue variants differ only in the completion-admission hook,
//! so the policy is an enum field rather than a type per variant. See
//! [`AckOrdering`] for the contract of each.

use crate::ack::envelope::{AckEnvelope, Entry};
use crate::ack::types::{Acknowledger, Cause, ErrorSink, Nacknowledger};
use crate::error::Error;
use ackflow_config::{AckOrdering, AckQueueSettings, SourceName};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// A thread-safe FIFO of in-flight acknowledgements.
///
/// Entries complete in any order (subject to the [`AckOrdering`] policy);
/// their callbacks execute in strict insertion order.
pub struct AckQueue {
    name: SourceName,
    ordering: AckOrdering,
    entries: Mutex<VecDeque<Arc<Entry>>>,
    drains_in_progress: AtomicI32,
    error_sink: ErrorSink,
}

/// How an entry is being completed.
pub(crate) enum Completion {
    /// Positive completion.
    Ack,
    /// Negative completion with its cause.
    Nack(Cause),
}

/// Outcome of routing a completion through a queue.
pub(crate) struct Resolution {
    /// Whether the calling thread performed the completion transition.
    pub(crate) completed: bool,
    /// Number of entries executed by the drain pass this call ran.
    pub(crate) drained: u64,
}

impl AckQueue {
    /// Create a queue that reports drain-time callback failures through
    /// [`ErrorSink::log`].
    pub fn new(
        name: impl Into<SourceName>,
        settings: &AckQueueSettings,
    ) -> Result<Arc<Self>, Error> {
        let name = name.into();
        let error_sink = ErrorSink::log(name.clone());
        Self::with_error_sink(name, settings, error_sink)
    }

    /// Create a queue with an explicit drain-time error sink.
    pub fn with_error_sink(
        name: impl Into<SourceName>,
        settings: &AckQueueSettings,
        error_sink: ErrorSink,
    ) -> Result<Arc<Self>, Error> {
        let name = name.into();
        if let Err(source) = settings.validate() {
            return Err(Error::InvalidQueueSettings {
                queue: name,
                source,
            });
        }
        Ok(Arc::new(Self {
            name,
            ordering: settings.ordering,
            entries: Mutex::new(VecDeque::with_capacity(settings.initial_capacity)),
            drains_in_progress: AtomicI32::new(0),
            error_sink,
        }))
    }

    /// The name of this queue.
    #[must_use]
    pub fn name(&self) -> &SourceName {
        &self.name
    }

    /// The release-order policy of this queue.
    #[must_use]
    pub fn ordering(&self) -> AckOrdering {
        self.ordering
    }

    /// Append an in-flight acknowledgement at the tail.
    ///
    /// The returned envelope routes its completion back through this
    /// queue, so `envelope.acknowledge()` and [`complete`](Self::complete)
    /// are equivalent ways to resolve it.
    pub fn add(self: &Arc<Self>, ack: Acknowledger, nack: Nacknowledger) -> AckEnvelope {
        self.register(Arc::new(()), ack, nack)
    }

    /// Append an in-flight acknowledgement carrying a payload.
    pub(crate) fn register<T>(
        self: &Arc<Self>,
        payload: Arc<T>,
        ack: Acknowledger,
        nack: Nacknowledger,
    ) -> AckEnvelope<T> {
        let entry = Arc::new(Entry::new(ack, nack));
        self.entries.lock().push_back(Arc::clone(&entry));
        AckEnvelope::queued(payload, entry, Arc::clone(self))
    }

    /// Positively complete `envelope` and drain the completed prefix.
    ///
    /// Returns the number of envelopes executed by this call's drain
    /// pass: zero when the completion was refused by the ordering policy,
    /// was redundant, or another thread is already draining (that thread
    /// will execute the entry before it exits).
    pub fn complete<T>(&self, envelope: &AckEnvelope<T>) -> Result<u64, Error> {
        self.verify_membership(envelope)?;
        Ok(self.resolve(envelope.entry(), Completion::Ack).drained)
    }

    /// Negatively complete `envelope` with `cause` and drain.
    ///
    /// Symmetric to [`complete`](Self::complete); the entry's
    /// nacknowledger receives the first recorded cause when it executes.
    pub fn complete_exceptionally<T>(
        &self,
        envelope: &AckEnvelope<T>,
        cause: Cause,
    ) -> Result<u64, Error> {
        self.verify_membership(envelope)?;
        Ok(self.resolve(envelope.entry(), Completion::Nack(cause)).drained)
    }

    /// Number of entries currently in the ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn verify_membership<T>(&self, envelope: &AckEnvelope<T>) -> Result<(), Error> {
        if envelope.belongs_to(self) {
            Ok(())
        } else {
            Err(Error::ForeignEnvelope {
                queue: self.name.clone(),
            })
        }
    }

    pub(crate) fn resolve(&self, entry: &Arc<Entry>, completion: Completion) -> Resolution {
        if self.admit(entry, completion) {
            Resolution {
                completed: true,
                drained: self.drain(),
            }
        } else {
            Resolution {
                completed: false,
                drained: 0,
            }
        }
    }

    /// Apply `completion` to `entry` under the ordering policy. Returns
    /// whether this call performed the completion transition.
    fn admit(&self, entry: &Arc<Entry>, completion: Completion) -> bool {
        match self.ordering {
            AckOrdering::Unordered => Self::apply(entry, completion),
            AckOrdering::Ordered => {
                // Head identity and completion must be decided under the
                // entries lock so the head cannot move between the check
                // and the CAS.
                let entries = self.entries.lock();
                match entries.front() {
                    Some(head) if Arc::ptr_eq(head, entry) => Self::apply(entry, completion),
                    _ => false,
                }
            }
        }
    }

    fn apply(entry: &Entry, completion: Completion) -> bool {
        match completion {
            Completion::Ack => entry.complete(),
            Completion::Nack(cause) => entry.complete_exceptionally(cause),
        }
    }

    /// Execute the completed prefix of the queue.
    ///
    /// Only the thread that observed `drains_in_progress` at zero runs the
    /// loop body; concurrent requesters increment the counter and return,
    /// and the active drainer reabsorbs their increments before exiting,
    /// which guarantees it re-checks the head after any concurrent
    /// completion.
    fn drain(&self) -> u64 {
        if self.drains_in_progress.fetch_add(1, Ordering::AcqRel) != 0 {
            return 0;
        }

        let mut drained = 0u64;
        let mut missed = 1i32;
        loop {
            while let Some(entry) = self.pop_completed_head() {
                if let Err(error) = entry.execute() {
                    self.error_sink.accept(&error);
                }
                drained += 1;
            }

            missed = self.drains_in_progress.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return drained;
            }
        }
    }

    /// Pop the head iff it has been completed. The lock is released before
    /// the caller executes the entry.
    fn pop_completed_head(&self) -> Option<Arc<Entry>> {
        let mut entries = self.entries.lock();
        match entries.front() {
            Some(head) if !head.is_in_flight() => entries.pop_front(),
            _ => None,
        }
    }
}
