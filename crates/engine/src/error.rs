// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors produced by acknowledgement-core operations.
//!
//! Only protocol violations surface here. Downstream failures travel as
//! [`Cause`](crate::ack::Cause) values through the nack paths, callback
//! failures go to the queue's [`ErrorSink`](crate::ack::ErrorSink), and
//! redundant completions are silent no-ops.

use ackflow_config::{ConfigError, SourceName};

/// Errors produced by acknowledgement-core operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A publisher was subscribed to more than once.
    #[error("publisher `{publisher}` may only be subscribed to once")]
    AlreadySubscribed {
        /// Name of the publisher that rejected the subscription.
        publisher: SourceName,
    },
    /// An envelope was completed against a queue it does not belong to.
    #[error("envelope does not belong to acknowledgement queue `{queue}`")]
    ForeignEnvelope {
        /// Name of the queue that rejected the completion.
        queue: SourceName,
    },
    /// Queue settings failed validation at construction time.
    #[error("invalid settings for acknowledgement queue `{queue}`: {source}")]
    InvalidQueueSettings {
        /// Name of the queue being created.
        queue: SourceName,
        /// Underlying validation failure.
        source: ConfigError,
    },
}
