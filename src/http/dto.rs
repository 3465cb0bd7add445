//! Request/response bodies for the bridge's HTTP surface (§3, §6). Every request DTO carries
//! `#[serde(deny_unknown_fields)]`, standing in for the OpenAPI request-validation middleware a
//! production deployment would front this service with (§4.4.1) — an unknown body property
//! becomes a 400 via [`crate::error::BridgeError::Validation`] at the `Json` extractor itself.

use serde::{Deserialize, Serialize};

use crate::codec::ProduceRecord;

/// Consumer-creation body (§4.4.1). `format` is deliberately `Option<String>` rather than
/// [`crate::format::Format`] — an out-of-enum value must surface as 422 *Invalid format type*
/// (§4.2), and that decision belongs to `create_consumer`, not to deserialization.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct CreateConsumerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default, rename = "auto.offset.reset")]
    pub auto_offset_reset: Option<String>,
    #[serde(default, rename = "enable.auto.commit")]
    pub enable_auto_commit: Option<bool>,
    #[serde(default, rename = "fetch.min.bytes")]
    pub fetch_min_bytes: Option<i32>,
    #[serde(default, rename = "consumer.request.timeout.ms")]
    pub consumer_request_timeout_ms: Option<i32>,
}

#[derive(Serialize)]
pub struct CreateConsumerResponse {
    pub instance_id: String,
    pub base_uri: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub topic_pattern: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitionSpec {
    pub topic: String,
    pub partition: i32,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignRequest {
    pub partitions: Vec<PartitionSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OffsetSpec {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(default)]
    pub metadata: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitRequest {
    #[serde(default)]
    pub offsets: Option<Vec<OffsetSpec>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeekRequest {
    pub offsets: Vec<OffsetSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicPartitionSpec {
    pub topic: String,
    pub partition: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeekToRequest {
    pub partitions: Vec<TopicPartitionSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProduceRequestBody {
    pub records: Vec<ProduceRecord>,
}

#[derive(Serialize)]
pub struct ProduceResponseBody<T> {
    pub offsets: Vec<T>,
}

#[derive(Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub max_bytes: Option<usize>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_consumer_request_accepts_dotted_wire_names() {
        let body: CreateConsumerRequest = serde_json::from_str(
            r#"{
                "name": "c",
                "format": "json",
                "auto.offset.reset": "earliest",
                "enable.auto.commit": false,
                "fetch.min.bytes": 1,
                "consumer.request.timeout.ms": 1000
            }"#,
        )
        .unwrap();

        assert_eq!(body.auto_offset_reset.as_deref(), Some("earliest"));
        assert_eq!(body.enable_auto_commit, Some(false));
        assert_eq!(body.fetch_min_bytes, Some(1));
        assert_eq!(body.consumer_request_timeout_ms, Some(1000));
        assert_eq!(body.format.as_deref(), Some("json"));
    }

    #[test]
    fn create_consumer_request_rejects_snake_case_wire_names() {
        // deny_unknown_fields means the idiomatic Rust field name is NOT a valid wire alias.
        let result: Result<CreateConsumerRequest, _> =
            serde_json::from_str(r#"{"auto_offset_reset": "earliest"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn create_consumer_request_defaults_are_all_none() {
        let body: CreateConsumerRequest = serde_json::from_str("{}").unwrap();
        assert!(body.name.is_none());
        assert!(body.format.is_none());
        assert!(body.auto_offset_reset.is_none());
    }
}
