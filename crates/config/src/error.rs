// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

/// Errors produced when validating configuration values.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A source name failed validation.
    #[error("invalid source name: {reason}")]
    InvalidSourceName {
        /// Validation error details.
        reason: String,
    },
    /// Acknowledgement queue settings failed validation.
    #[error("invalid acknowledgement queue settings: {reason}")]
    InvalidQueueSettings {
        /// Validation error details.
        reason: String,
    },
}
