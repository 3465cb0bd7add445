//! axum handlers, one per §6 operation. Each is a thin translation from extractors to a
//! [`ConsumerSession`]/[`ProducerSession`] call and back to a response; all semantic work lives in
//! `consumer.rs`/`producer.rs`/`codec.rs`/`base_uri.rs`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, FromRequest, Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::classify::{self, Operation};
use crate::consumer::ConsumerSession;
use crate::error::BridgeError;
use crate::format::{Format, CONTENT_TYPE_V2};
use crate::kafka::{KafkaHandleFactory, PartitionAssignment, SeekPosition, TopicPartition, TopicPartitionOffset};
use crate::{base_uri, producer::ProduceResult};

use super::dto::{
    AssignRequest, CommitRequest, CreateConsumerRequest, CreateConsumerResponse, HealthResponse,
    PollQuery, ProduceRequestBody, ProduceResponseBody, SeekRequest, SeekToRequest,
    SubscribeRequest,
};

/// Identifies the HTTP connection a request arrived on; keys [`crate::registry::SessionRegistry`]'s
/// producer-session map (§4.5). Inserted into request extensions once per accepted connection by
/// [`super::serve`].
#[derive(Clone, Copy, Debug)]
pub struct ConnectionId(pub u64);

/// `Json<T>` that turns a deserialization failure into the bridge's own `{error_code, message}`
/// envelope instead of axum's default rejection body, so malformed bodies always surface the 400
/// contract from §4.4.1.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = BridgeError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

/// Wraps a JSON body with the generic bridge content type and a 200/204 status, matching §6's
/// content-type table for non-record responses.
fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response {
    let mut response = Json(body).into_response();
    *response.status_mut() = status;
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static(CONTENT_TYPE_V2),
    );
    response
}

fn content_type(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn resolved_format(
    declared: Option<String>,
    instance_format: Format,
) -> Result<(), BridgeError> {
    match declared {
        None => Ok(()),
        Some(value) if instance_format.accepts(&value) => Ok(()),
        Some(_) => Err(BridgeError::not_acceptable(
            "Consumer format does not match the embedded format requested by the Accept header.",
        )),
    }
}

pub async fn healthz() -> impl IntoResponse {
    Json(HealthResponse { status: "up" })
}

/// Router fallback for any path the route table doesn't match. Re-runs the same classification
/// the route table was built from (§4.1) purely to pick the error message; a path only reaches
/// here when it classifies as [`Operation::Empty`] or [`Operation::Unprocessable`] (a known path
/// with the wrong method is rejected by axum's own method router before the fallback ever runs).
pub async fn classifier_fallback(method: Method, uri: Uri) -> Response {
    match classify::classify(&method, uri.path()) {
        Operation::Empty => BridgeError::not_found("No operation specified.").into_response(),
        _ => BridgeError::not_found("No such operation.").into_response(),
    }
}

pub async fn create_consumer<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    ValidatedJson(body): ValidatedJson<CreateConsumerRequest>,
) -> Result<Response, BridgeError> {
    let name = body
        .name
        .clone()
        .unwrap_or_else(|| registry.generate_name());

    let format = match body.format.as_deref() {
        None => Format::default(),
        Some(value) => {
            Format::parse(value).ok_or_else(|| BridgeError::semantic("Invalid format type"))?
        }
    };

    if let Some(reset) = body.auto_offset_reset.as_ref() {
        if !matches!(reset.as_str(), "latest" | "earliest" | "none") {
            return Err(BridgeError::semantic(
                "auto.offset.reset must be one of latest, earliest, none",
            ));
        }
    }

    let request_path = uri.path();
    let base_uri = base_uri::derive_base_uri(&headers, &uri, request_path, &name)?;

    let mut properties = std::collections::HashMap::new();
    if let Some(reset) = body.auto_offset_reset.as_ref() {
        properties.insert("auto.offset.reset".to_string(), reset.clone());
    }
    if let Some(commit) = body.enable_auto_commit {
        properties.insert("enable.auto.commit".to_string(), commit.to_string());
    }
    if let Some(bytes) = body.fetch_min_bytes {
        properties.insert("fetch.min.bytes".to_string(), bytes.to_string());
    }
    if let Some(timeout) = body.consumer_request_timeout_ms {
        properties.insert("consumer.request.timeout.ms".to_string(), timeout.to_string());
    }

    let consumer = registry
        .kafka_factory()
        .new_consumer(&name, &group_id, &properties)
        .map_err(|e| BridgeError::internal(e.to_string()))?;

    let session = ConsumerSession::new(
        group_id.clone(),
        name.clone(),
        format,
        base_uri.clone(),
        consumer,
        registry.default_poll_timeout_ms(),
        registry.default_max_response_bytes(),
    );

    registry.insert_consumer(&group_id, &name, session)?;

    Ok(json_response(
        StatusCode::OK,
        &CreateConsumerResponse {
            instance_id: name,
            base_uri,
        },
    ))
}

pub async fn delete_consumer<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
) -> Result<StatusCode, BridgeError> {
    registry.remove_consumer(&group_id, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscribe<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<SubscribeRequest>,
) -> Result<StatusCode, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;
    session.subscribe(body.topics, body.topic_pattern).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unsubscribe<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
) -> Result<StatusCode, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;
    session.unsubscribe().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<AssignRequest>,
) -> Result<StatusCode, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;
    let partitions = body
        .partitions
        .into_iter()
        .map(|p| PartitionAssignment {
            topic: p.topic,
            partition: p.partition,
            offset: p.offset,
        })
        .collect();
    session.assign(partitions).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn poll<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
) -> Result<Response, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;

    resolved_format(content_type(&headers, "accept"), session.format)?;

    let records = session.poll(query.timeout, query.max_bytes).await?;

    let mut response = Json(records).into_response();
    response.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_str(session.format.content_type())
            .expect("content type is a valid header value"),
    );
    Ok(response)
}

pub async fn commit<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;

    let offsets = if body.is_empty() {
        None
    } else {
        let parsed: CommitRequest = serde_json::from_slice(&body)
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        parsed.offsets
    };

    let offsets = offsets.map(|offsets| {
        offsets
            .into_iter()
            .map(|o| TopicPartitionOffset {
                topic: o.topic,
                partition: o.partition,
                offset: o.offset,
            })
            .collect()
    });

    session.commit(offsets).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn seek<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<SeekRequest>,
) -> Result<StatusCode, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;
    let offsets = body
        .offsets
        .into_iter()
        .map(|o| TopicPartitionOffset {
            topic: o.topic,
            partition: o.partition,
            offset: o.offset,
        })
        .collect();
    session.seek(offsets).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn seek_to_beginning<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<SeekToRequest>,
) -> Result<StatusCode, BridgeError> {
    seek_to(registry, group_id, name, body, SeekPosition::Beginning).await
}

pub async fn seek_to_end<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path((group_id, name)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<SeekToRequest>,
) -> Result<StatusCode, BridgeError> {
    seek_to(registry, group_id, name, body, SeekPosition::End).await
}

async fn seek_to<F: KafkaHandleFactory + Clone>(
    registry: Arc<crate::registry::SessionRegistry<F>>,
    group_id: String,
    name: String,
    body: SeekToRequest,
    position: SeekPosition,
) -> Result<StatusCode, BridgeError> {
    let session = registry.get_consumer(&group_id, &name)?;
    let partitions = body
        .partitions
        .into_iter()
        .map(|p| TopicPartition {
            topic: p.topic,
            partition: p.partition,
        })
        .collect();
    session.seek_to(partitions, position).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn produce<F: KafkaHandleFactory + Clone>(
    State(registry): State<Arc<crate::registry::SessionRegistry<F>>>,
    Path(topic): Path<String>,
    Extension(ConnectionId(connection_id)): Extension<ConnectionId>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ProduceRequestBody>,
) -> Result<Response, BridgeError> {
    let declared = content_type(&headers, "content-type");
    let format = match declared.as_deref() {
        Some(value) if Format::Binary.content_type() == value.trim() => Format::Binary,
        Some(value) if Format::Json.content_type() == value.trim() => Format::Json,
        Some(_) => {
            return Err(BridgeError::not_acceptable(
                "Content-Type does not match a supported embedded format.",
            ))
        }
        None => Format::default(),
    };

    if body.records.is_empty() {
        return Err(BridgeError::semantic("records must be a non-empty list."));
    }

    let session = registry.producer_for_connection(connection_id);
    let results: Vec<ProduceResult> = session.produce(&topic, format, body.records).await?;

    Ok(json_response(
        StatusCode::OK,
        &ProduceResponseBody { offsets: results },
    ))
}
