// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Configuration model for the ackflow acknowledgement engine.
//!
//! This crate carries only data definitions: name newtypes, policy enums,
//! and settings structs with their serde/schema derives and validation.
//! No runtime behavior lives here.

mod ack;
mod error;
mod name;

pub use ack::{AckOrdering, AckQueueSettings};
pub use error::ConfigError;
pub use name::SourceName;
