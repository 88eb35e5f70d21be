// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Acknowledgement module: envelope, in-flight queue, publisher adapter,
//! and related types.

mod envelope;
mod publisher;
mod queue;
mod queueing;
mod types;


pub use envelope::AckEnvelope;
pub use publisher::{AckPublisher, AckStream};
pub use queue::AckQueue;
pub use queueing::QueuedAckStream;
pub use types::{Acknowledger, CallbackError, Cause, ErrorSink, Nacknowledger, cause, reason};
