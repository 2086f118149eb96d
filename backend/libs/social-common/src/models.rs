//! Shared identifiers and payloads
//!
//! These types cross every service boundary: the graph owns users, the
//! content store owns content, and the feed only ever holds `UserId` and
//! `ContentId` references into them.

use crate::error::{Result, SocialError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// USER IDENTIFIERS
// ============================================================================

/// Caller-chosen, immutable user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// CONTENT IDENTIFIERS
// ============================================================================

/// Custom epoch for content ids: 2024-01-01T00:00:00Z
pub const CONTENT_EPOCH_MS: u64 = 1_704_067_200_000;

/// Bits below the millisecond timestamp (10 node bits + 12 sequence bits)
pub const CONTENT_TIMESTAMP_SHIFT: u32 = 22;

/// Time-ordered content identifier.
///
/// Layout: `[41 bits ms since CONTENT_EPOCH_MS][10 bits node][12 bits seq]`.
/// Numeric order is creation order, so the id doubles as a pagination cursor.
/// The string form is 16 lowercase hex digits, which sorts the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(u64);

impl ContentId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Unix milliseconds at which the id was minted
    pub const fn timestamp_millis(self) -> u64 {
        (self.0 >> CONTENT_TIMESTAMP_SHIFT) + CONTENT_EPOCH_MS
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for ContentId {
    type Err = SocialError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s.len() > 16 {
            return Err(SocialError::InvalidContentId(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| SocialError::InvalidContentId(s.to_string()))
    }
}

impl TryFrom<String> for ContentId {
    type Error = SocialError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// OPAQUE PAYLOADS
// ============================================================================

/// Opaque structured document attached to users and content.
///
/// Validated once at the boundary (must be a JSON object), then stored and
/// returned untouched. No service reads its fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a raw JSON string; `""` is treated as an empty document
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::empty());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| SocialError::InvalidPayload(e.to_string()))?;
        Self::from_value(value)
    }

    /// Accept an object, or `null` as an empty document
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::empty()),
            other => Err(SocialError::InvalidPayload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
