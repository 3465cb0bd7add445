//! Embedded-format negotiation: decides whether a [`ConsumerInstance`](crate::consumer)'s
//! records are delivered as base64 `binary` or structured `json`, and validates HTTP `Accept`
//! and `Content-Type` headers against it.
//!
//! Modeled on the teacher crate's `RecordFormat` (`src/kafka.rs`): a small `Copy` enum with
//! `Display`/serde impls driven by a pair of well-known string constants, rather than deriving
//! `Serialize`/`Deserialize` directly (the wire representation and the Rust enum variant names
//! are not identical).

use std::fmt;

use serde::{Deserialize, Serialize};

/// String representation of [`Format::Binary`] on the wire (request/response bodies and CLI
/// flags).
const FORMAT_BINARY: &str = "binary";

/// String representation of [`Format::Json`] on the wire.
const FORMAT_JSON: &str = "json";

/// `Accept`/`Content-Type` value for an instance configured with [`Format::Binary`].
pub const CONTENT_TYPE_BINARY: &str = "application/vnd.kafka.binary.v2+json";

/// `Accept`/`Content-Type` value for an instance configured with [`Format::Json`].
pub const CONTENT_TYPE_JSON: &str = "application/vnd.kafka.json.v2+json";

/// Generic envelope content type used for error bodies, creation responses, and any other JSON
/// metadata that isn't a record batch.
pub const CONTENT_TYPE_V2: &str = "application/vnd.kafka.v2+json";

/// Embedded format of a consumer instance's keys/values: base64-encoded bytes, or structured JSON.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Format {
    Binary,
    Json,
}

impl Default for Format {
    /// Consumer creation defaults to `binary` when no format is specified (§4.2).
    fn default() -> Self {
        Self::Binary
    }
}

impl Format {
    /// Parses a format value from the wire, returning `None` for anything outside
    /// `{binary, json}` so the caller can surface the *Invalid format type* (422) error.
    pub fn parse(value: impl AsRef<str>) -> Option<Self> {
        match value.as_ref() {
            FORMAT_BINARY => Some(Self::Binary),
            FORMAT_JSON => Some(Self::Json),
            _ => None,
        }
    }

    /// The `Accept`/`Content-Type` value this format expects to see.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Binary => CONTENT_TYPE_BINARY,
            Self::Json => CONTENT_TYPE_JSON,
        }
    }

    /// Returns `true` if the given `Accept`/`Content-Type` header value matches this format, or
    /// is one of the generic values that are always acceptable.
    pub fn accepts(self, header_value: &str) -> bool {
        let value = header_value.trim();
        value == self.content_type() || value == CONTENT_TYPE_V2 || value == "*/*"
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Binary => FORMAT_BINARY,
            Self::Json => FORMAT_JSON,
        };
        f.write_str(s)
    }
}

impl Serialize for Format {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Format {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Format::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid embedded format: {raw}"))
        })
    }
}
