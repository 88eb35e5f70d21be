// Copyright The AckFlow Authors
// SPDX-License-Identifier: Apache-2.0

//! Interned name for an acknowledgement scope.
//!
//! A `SourceName` identifies the upstream a group of acknowledgements
//! belongs to: a topic partition, a queue, a subscription. It is an
//! interned `Arc<str>` so handles that carry it stay cheap to clone, and
//! it implements `Borrow<str>` so map lookups work with plain `&str` keys
//! without allocating.

use crate::ConfigError;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Interned name of an acknowledgement scope.
///
/// Cheap to clone and hash. Construct with [`SourceName::parse`] when the
/// value comes from configuration or user input; the `From` conversions
/// intern without validation and are intended for literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceName(Arc<str>);

impl SourceName {
    /// Parse and validate a source name.
    ///
    /// Names must be non-empty and free of control characters.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ConfigError> {
        let raw = raw.as_ref();
        if raw.is_empty() {
            return Err(ConfigError::InvalidSourceName {
                reason: "name must not be empty".to_owned(),
            });
        }
        if raw.chars().any(char::is_control) {
            return Err(ConfigError::InvalidSourceName {
                reason: format!("name `{}` contains control characters", raw.escape_default()),
            });
        }
        Ok(Self(Arc::from(raw)))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SourceName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceName {
    fn from(raw: &str) -> Self {
        Self(Arc::from(raw))
    }
}

impl From<String> for SourceName {
    fn from(raw: String) -> Self {
        Self(Arc::from(raw))
    }
}

impl Serialize for SourceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SourceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}

impl JsonSchema for SourceName {
    fn schema_name() -> String {
        "SourceName".to_owned()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}
