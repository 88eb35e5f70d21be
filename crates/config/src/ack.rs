// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Acknowledgement queue configuration.

use crate::ConfigError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Release-order policy of an acknowledgement queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckOrdering {
    /// Only the entry at the head of the queue may complete. A completion
    /// attempt on any other entry is refused and leaves the entry in
    /// flight; the caller must retry once the head has moved. Intended for
    /// emitters that complete in emission order (for example a
    /// per-partition single-threaded consumer).
    Ordered,
    /// Any in-flight entry may complete independently; the queue releases
    /// the longest completed prefix. Weaker ordering on the completion
    /// side, higher throughput.
    #[default]
    Unordered,
}

/// Settings for creating an acknowledgement queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AckQueueSettings {
    /// Release-order policy.
    #[serde(default)]
    pub ordering: AckOrdering,

    /// Initial capacity of the in-flight ledger.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
}

impl Default for AckQueueSettings {
    fn default() -> Self {
        Self {
            ordering: AckOrdering::default(),
            initial_capacity: default_initial_capacity(),
        }
    }
}

fn default_initial_capacity() -> usize {
    256
}

impl AckQueueSettings {
    /// Validate these settings for runtime use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::InvalidQueueSettings {
                reason: "initial_capacity must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
