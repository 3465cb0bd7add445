//! Converts between [`crate::kafka::ConsumedRecord`]/[`crate::kafka::OutgoingRecord`] and the
//! JSON wire envelope, for either embedded format. Binary keys/values are base64; JSON
//! keys/values are embedded verbatim as structured JSON, matching the teacher crate's own
//! `RecordFormat`-driven encode/decode split in `src/kafka.rs`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;
use crate::format::Format;
use crate::kafka::ConsumedRecord;

/// A single element of a produce request body's `records` array, before format-specific decoding.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProduceRecord {
    #[serde(default)]
    pub key: Option<Value>,
    pub value: Value,
    #[serde(default)]
    pub partition: Option<i32>,
    #[serde(default, rename = "withNullKey")]
    pub with_null_key: bool,
}

/// A consumed record encoded for the wire, per §3's consume envelope.
#[derive(Serialize)]
pub struct EncodedRecord {
    pub topic: String,
    pub key: Option<Value>,
    pub value: Option<Value>,
    pub partition: i32,
    pub offset: i64,
}

/// Decodes one produce-request record into the raw bytes a [`crate::kafka::OutgoingRecord`]
/// needs, according to the session's configured [`Format`].
///
/// `json` values are re-serialized to their canonical JSON bytes; `binary` values must be
/// base64-encoded strings, per the request's declared `Content-Type`.
pub fn decode_value(format: Format, value: &Value) -> Result<Vec<u8>, BridgeError> {
    match format {
        Format::Json => serde_json::to_vec(value)
            .map_err(|e| BridgeError::validation(format!("invalid JSON value: {e}"))),
        Format::Binary => {
            let encoded = value.as_str().ok_or_else(|| {
                BridgeError::validation("binary record value must be a base64-encoded string")
            })?;
            BASE64
                .decode(encoded)
                .map_err(|e| BridgeError::validation(format!("invalid base64 value: {e}")))
        }
    }
}

/// Decodes an optional produce-request key the same way [`decode_value`] decodes a value. A
/// missing key, or `with_null_key`, yields `None` per §4.5.
pub fn decode_key(
    format: Format,
    key: Option<&Value>,
    with_null_key: bool,
) -> Result<Option<Vec<u8>>, BridgeError> {
    if with_null_key {
        return Ok(None);
    }

    match key {
        None => Ok(None),
        Some(Value::Null) => Ok(None),
        Some(v) => decode_value(format, v).map(Some),
    }
}

/// Encodes a consumed record's key/value for the wire, according to the instance's configured
/// format. For `json`, bytes that fail to parse as JSON surface [`BridgeError::NotAcceptable`]
/// per §7's *Failed to decode* case.
pub fn encode_record(format: Format, record: &ConsumedRecord) -> Result<EncodedRecord, BridgeError> {
    Ok(EncodedRecord {
        topic: record.topic.clone(),
        key: encode_bytes(format, record.key.as_deref())?,
        value: encode_bytes(format, record.value.as_deref())?,
        partition: record.partition,
        offset: record.offset,
    })
}

fn encode_bytes(format: Format, bytes: Option<&[u8]>) -> Result<Option<Value>, BridgeError> {
    let Some(bytes) = bytes else {
        return Ok(None);
    };

    match format {
        Format::Binary => Ok(Some(Value::String(BASE64.encode(bytes)))),
        Format::Json => serde_json::from_slice(bytes).map(Some).map_err(|e| {
            BridgeError::not_acceptable(format!("Failed to decode a record value as JSON: {e}"))
        }),
    }
}
