//! Thin abstractions over the `rdkafka` consumer/producer handles used by a
//! [`crate::consumer::ConsumerSession`] and [`crate::producer::ProducerSession`].
//!
//! The session types never talk to `rdkafka` directly; they go through the
//! [`KafkaConsumerHandle`]/[`KafkaProducerHandle`] traits below, the same way the teacher crate
//! hides key/value deserialization behind `ValueDeserializer`/`KeyDeserializer` traits rather than
//! hard-wiring a single format. This is what lets the session/registry/HTTP layer be exercised in
//! tests without a live broker (see [`testing`]).

pub mod rdkafka_impl;
#[cfg(test)]
pub mod testing;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

/// A single consumed record, independent of the embedded-format (binary/json) it will eventually
/// be encoded in.
#[derive(Clone, Debug)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// A record to be produced, built from the request body by [`crate::codec`].
#[derive(Clone, Debug)]
pub struct OutgoingRecord {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Vec<u8>,
    pub partition: Option<i32>,
}

/// Partition and offset that a produced record landed on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordMetadata {
    pub partition: i32,
    pub offset: i64,
}

/// A manual partition assignment, optionally pinning the starting offset.
#[derive(Clone, Debug)]
pub struct PartitionAssignment {
    pub topic: String,
    pub partition: i32,
    pub offset: Option<i64>,
}

/// A topic, partition, and offset to commit.
#[derive(Clone, Debug)]
pub struct TopicPartitionOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A bare topic/partition pair, used for seek-to-beginning/end and assignment queries.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

/// Destination of a seek operation.
#[derive(Clone, Copy, Debug)]
pub enum SeekPosition {
    Offset(i64),
    Beginning,
    End,
}

/// Failure surfaced by a [`KafkaConsumerHandle`] or [`KafkaProducerHandle`] operation. Translated
/// to an HTTP status by [`crate::error::BridgeError`] at the session boundary, never propagated
/// raw to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum KafkaOpError {
    /// The broker or client library rejected the operation; message is passed through verbatim.
    #[error("{0}")]
    Broker(String),
    /// The given topic/partition is not part of the consumer's current assignment.
    #[error("partition {partition} of topic {topic} is not currently assigned")]
    NotAssigned { topic: String, partition: i32 },
}

impl KafkaOpError {
    pub fn broker(message: impl fmt::Display) -> Self {
        Self::Broker(message.to_string())
    }
}

/// Capability set required by a [`crate::consumer::ConsumerSession`]. One implementation wraps a
/// real `rdkafka` consumer ([`rdkafka_impl::RdKafkaConsumer`]); a second, in-memory implementation
/// backs the test suite.
#[async_trait]
pub trait KafkaConsumerHandle: Send + Sync {
    /// Subscribes to an explicit list of topic names.
    fn subscribe_topics(&self, topics: &[String]) -> Result<(), KafkaOpError>;
    /// Subscribes to every topic matching the given regular expression.
    fn subscribe_pattern(&self, pattern: &str) -> Result<(), KafkaOpError>;
    /// Clears any subscription (topic list or pattern).
    fn unsubscribe(&self);
    /// Manually assigns the given partitions, seeking any that specify a starting offset.
    fn assign(&self, assignments: &[PartitionAssignment]) -> Result<(), KafkaOpError>;
    /// Waits for and returns the next available record.
    async fn recv(&self) -> Result<ConsumedRecord, KafkaOpError>;
    /// Commits the given offsets, or the consumer's last-delivered positions when `None`.
    fn commit(&self, offsets: Option<&[TopicPartitionOffset]>) -> Result<(), KafkaOpError>;
    /// Seeks a single partition to the given position. Fails with [`KafkaOpError::NotAssigned`]
    /// if the partition is not part of the current assignment.
    fn seek(&self, topic: &str, partition: i32, position: SeekPosition) -> Result<(), KafkaOpError>;
    /// Returns the consumer's current partition assignment.
    fn assignment(&self) -> Result<Vec<TopicPartition>, KafkaOpError>;
    /// Releases the underlying client handle. Idempotent.
    fn close(&self);
}

/// Capability set required by a [`crate::producer::ProducerSession`].
#[async_trait]
pub trait KafkaProducerHandle: Send + Sync {
    /// Sends a record and awaits broker acknowledgement, returning its final partition/offset.
    async fn send(&self, record: OutgoingRecord) -> Result<RecordMetadata, KafkaOpError>;
}

/// Builds real `rdkafka`-backed consumer/producer handles from bootstrap configuration. The
/// bridge's [`crate::registry::SessionRegistry`] is generic over a `KafkaHandleFactory`
/// implementation so that tests can substitute [`testing::FakeHandleFactory`].
pub trait KafkaHandleFactory: Send + Sync + 'static {
    type Consumer: KafkaConsumerHandle + 'static;
    type Producer: KafkaProducerHandle + 'static;

    /// Creates a new consumer handle with the given `client.id` and extra configuration
    /// properties layered on top of the bridge's consumer defaults.
    fn new_consumer(
        &self,
        client_id: &str,
        group_id: &str,
        properties: &HashMap<String, String>,
    ) -> anyhow::Result<Self::Consumer>;

    /// Creates a new producer handle with the given acknowledgement mode (`"all"` or `"0"`).
    fn new_producer(&self, acks: &str) -> anyhow::Result<Self::Producer>;
}
