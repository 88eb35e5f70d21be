// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Reactive stream acknowledgement core for at-least-once consumers.
//!
//! Consumers of brokered sources (Kafka topic partitions, AMQP queues, SQS
//! queues) must commit message positions only after downstream work has
//! finished, while downstream pipelines fork, batch, and reorder messages
//! arbitrarily. This crate accepts out-of-order completion signals from
//! concurrent downstream stages and surfaces *in-order* acknowledgement to
//! the source, guaranteeing that each message's positive or negative
//! acknowledgement runs at most once even under races between completion,
//! cancellation, and stream errors.
//!
//! # Components
//!
//! - [`ack::AckEnvelope`] -- the per-message state machine coupling a
//!   payload with its acknowledger and nacknowledger.
//! - [`ack::AckQueue`] -- a thread-safe in-flight ledger that admits
//!   completions in any order and executes them in strict insertion order
//!   through a lock-free single-drainer protocol.
//! - [`ack::AckPublisher`] -- a single-subscription stream adapter that
//!   re-emits each upstream value inside an envelope and fires a
//!   source-level acknowledger exactly once, after the upstream has
//!   terminated and every emitted envelope has been resolved.
//! - [`ack::QueuedAckStream`] -- the combinator tying the two together:
//!   envelopes flowing through it may be completed downstream in any
//!   order, yet their underlying acknowledgements execute in emission
//!   order.
//!
//! The crate performs no I/O and has no suspension points: every operation
//! is synchronous and non-blocking, safe to invoke from any thread.

pub mod ack;
pub mod error;
