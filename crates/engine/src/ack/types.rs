// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared vocabulary of the acknowledgement core.
//!
//! This module defines the callback and error-carrier types that flow
//! through the public API. No state machines live here -- only type
//! definitions, small constructors, and the drain-time error sink.
//!
//! # Callback contract
//!
//! Acknowledgers and nacknowledgers are fire-and-forget: they are invoked
//! at most once per envelope, from whichever thread happened to complete
//! the work, and they may fail. A failure is reported through the owning
//! queue's [`ErrorSink`] (or logged, for detached envelopes) and never
//! stops a drain pass.

use ackflow_config::SourceName;
use std::fmt;
use std::sync::Arc;

/// Shared, cloneable failure cause attached to a negative acknowledgement.
///
/// The first nack's cause is the one delivered, even when later
/// completions race in; `Arc` lets the same cause travel to the envelope's
/// nacknowledger, the source-level nacknowledger, and downstream
/// subscribers without copying.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of an acknowledger or nacknowledger body itself.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback invoked on positive completion. Called at most once.
pub type Acknowledger = Box<dyn FnOnce() -> Result<(), CallbackError> + Send + 'static>;

/// Callback invoked on negative completion with its cause. Called at most
/// once.
pub type Nacknowledger = Box<dyn FnOnce(Cause) -> Result<(), CallbackError> + Send + 'static>;

/// Wraps a concrete error into a [`Cause`].
pub fn cause<E>(error: E) -> Cause
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Builds a [`Cause`] from a plain message.
pub fn reason(message: impl Into<String>) -> Cause {
    Arc::new(Reason(message.into()))
}

/// Message-only cause produced by [`reason`].
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Reason(String);

/// Consumer of callback failures observed while draining a queue.
///
/// The engine default is [`ErrorSink::log`], which emits a structured
/// warning; [`ErrorSink::discard`] drops failures silently.
#[derive(Clone)]
pub struct ErrorSink {
    inner: Arc<dyn Fn(&CallbackError) + Send + Sync>,
}

impl ErrorSink {
    /// Build a sink from an arbitrary consumer.
    pub fn new(consumer: impl Fn(&CallbackError) + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(consumer),
        }
    }

    /// A sink that drops failures silently.
    #[must_use]
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// A sink that logs failures at `warn` with the queue name attached.
    #[must_use]
    pub fn log(queue: SourceName) -> Self {
        Self::new(move |error| {
            tracing::warn!(queue = %queue, %error, "acknowledgement callback failed");
        })
    }

    pub(crate) fn accept(&self, error: &CallbackError) {
        (self.inner)(error);
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}
