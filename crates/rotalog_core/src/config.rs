//! Writer configuration.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard ceiling for `capacity_bytes` (15 MiB).
///
/// Kept below the 16 MiB per-document limit common to document stores.
pub const CAPACITY_CEILING: u64 = 15 * 1024 * 1024;

/// Hard ceiling for `max_segments`.
pub const MAX_SEGMENTS_CEILING: u32 = 11_000;

/// Login for the store endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for opening a [`RotatingWriter`](crate::RotatingWriter).
///
/// Deserializable so a config loader can hand over a plain mapping; any
/// field left out takes its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    /// Store host. Validated and carried for network-backed stores; the
    /// bundled stores ignore it.
    pub host: String,

    /// Store port. Carried alongside `host`.
    pub port: u16,

    /// Optional login, handed to network-backed stores.
    pub credentials: Option<Credentials>,

    /// Database that holds the segments and the metadata collection.
    ///
    /// A writer refuses a store bound to a different database; see
    /// [`FileSegmentStore::from_config`](crate::FileSegmentStore::from_config).
    pub database_name: String,

    /// Prefix for segment names (`<base>_<stamp>`). Streams sharing a
    /// database need distinct prefixes.
    pub base_segment_name: String,

    /// Maximum bytes per segment.
    pub capacity_bytes: u64,

    /// Maximum segments retained, current one included.
    pub max_segments: u32,

    /// Stream tag identifying this writer's rotation state.
    pub tag: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27017,
            credentials: None,
            database_name: "rotalog".to_string(),
            base_segment_name: "logs".to_string(),
            capacity_bytes: CAPACITY_CEILING,
            max_segments: MAX_SEGMENTS_CEILING,
            tag: "rotalog".to_string(),
        }
    }
}

impl WriterConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store endpoint.
    #[must_use]
    pub fn endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the login.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets the segment name prefix.
    #[must_use]
    pub fn base_segment_name(mut self, name: impl Into<String>) -> Self {
        self.base_segment_name = name.into();
        self
    }

    /// Sets maximum bytes per segment.
    #[must_use]
    pub const fn capacity_bytes(mut self, bytes: u64) -> Self {
        self.capacity_bytes = bytes;
        self
    }

    /// Sets maximum retained segments.
    #[must_use]
    pub const fn max_segments(mut self, count: u32) -> Self {
        self.max_segments = count;
        self
    }

    /// Sets the stream tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Checks every bound. Out-of-range values are rejected, never clamped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first bad field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.host.is_empty() {
            return Err(CoreError::validation("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(CoreError::validation("port", "must not be 0"));
        }
        if !(1..=CAPACITY_CEILING).contains(&self.capacity_bytes) {
            return Err(CoreError::validation(
                "capacity_bytes",
                format!(
                    "{} is outside 1..={CAPACITY_CEILING}",
                    self.capacity_bytes
                ),
            ));
        }
        if !(1..=MAX_SEGMENTS_CEILING).contains(&self.max_segments) {
            return Err(CoreError::validation(
                "max_segments",
                format!(
                    "{} is outside 1..={MAX_SEGMENTS_CEILING}",
                    self.max_segments
                ),
            ));
        }
        if self.tag.is_empty() {
            return Err(CoreError::validation("tag", "must not be empty"));
        }
        check_identifier("database_name", &self.database_name)?;
        check_identifier("base_segment_name", &self.base_segment_name)?;
        Ok(())
    }
}

/// Names that end up as collection or file names.
fn check_identifier(field: &'static str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(CoreError::validation(
            field,
            format!("character {c:?} is not allowed in {value:?}"),
        ));
    }
    if value.starts_with('.') {
        return Err(CoreError::validation(field, "must not start with '.'"));
    }
    Ok(())
}
