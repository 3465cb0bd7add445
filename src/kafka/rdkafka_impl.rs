//! `rdkafka`-backed implementations of the [`super::KafkaConsumerHandle`],
//! [`super::KafkaProducerHandle`], and [`super::KafkaHandleFactory`] traits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{Consumer as RdConsumer, ConsumerContext, CommitMode, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as RdProducer};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, ClientContext, Offset, Statistics, TopicPartitionList};

use super::{
    ConsumedRecord, KafkaConsumerHandle, KafkaHandleFactory, KafkaOpError, KafkaProducerHandle,
    OutgoingRecord, PartitionAssignment, RecordMetadata, SeekPosition, TopicPartition,
    TopicPartitionOffset,
};

/// Default time allotted to synchronous rdkafka operations (assign, seek, commit) that the
/// bridge's own request doesn't otherwise bound.
const OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Custom client context shared by consumers and producers; forwards `librdkafka`'s own log
/// lines and statistics callbacks into `tracing`, the same hook the teacher crate installs in
/// `kafka.rs::ConsumerContext`.
#[derive(Clone, Default)]
pub struct BridgeClientContext;

impl ClientContext for BridgeClientContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => tracing::error!("{} {}", fac, log_message),
            RDKafkaLogLevel::Warning => tracing::warn!("{} {}", fac, log_message),
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                tracing::info!("{} {}", fac, log_message)
            }
            RDKafkaLogLevel::Debug => tracing::debug!("{} {}", fac, log_message),
        }
    }

    fn stats(&self, statistics: Statistics) {
        tracing::trace!(brokers = statistics.brokers.len(), "rdkafka statistics");
    }
}

impl ConsumerContext for BridgeClientContext {}

fn to_op_error(e: KafkaError) -> KafkaOpError {
    KafkaOpError::broker(e)
}

/// Real Kafka consumer handle, wrapping an `rdkafka` [`StreamConsumer`].
pub struct RdKafkaConsumer {
    consumer: Arc<StreamConsumer<BridgeClientContext>>,
}

impl RdKafkaConsumer {
    fn new(
        bootstrap_servers: &str,
        client_id: &str,
        group_id: &str,
        properties: &HashMap<String, String>,
    ) -> anyhow::Result<Self> {
        let mut client_config = ClientConfig::new();

        client_config.set("bootstrap.servers", bootstrap_servers);
        client_config.set("group.id", group_id);
        client_config.set("client.id", client_id);
        client_config.set("auto.offset.reset", "latest");
        client_config.set("enable.auto.commit", "false");

        client_config.extend(properties.clone());

        if tracing::enabled!(tracing::Level::DEBUG) {
            for (k, v) in client_config.config_map().iter() {
                tracing::debug!("consumer property {} set to {}", k, v);
            }
        }

        let consumer: StreamConsumer<BridgeClientContext> = client_config
            .set_log_level(RDKafkaLogLevel::Info)
            .create_with_context(BridgeClientContext)?;

        Ok(Self {
            consumer: Arc::new(consumer),
        })
    }
}

#[async_trait]
impl KafkaConsumerHandle for RdKafkaConsumer {
    fn subscribe_topics(&self, topics: &[String]) -> Result<(), KafkaOpError> {
        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&refs).map_err(to_op_error)
    }

    fn subscribe_pattern(&self, pattern: &str) -> Result<(), KafkaOpError> {
        // librdkafka treats a topic name prefixed with `^` as a regular expression.
        let regex_topic = format!("^{pattern}");
        self.consumer
            .subscribe(&[regex_topic.as_str()])
            .map_err(to_op_error)
    }

    fn unsubscribe(&self) {
        self.consumer.unsubscribe();
    }

    fn assign(&self, assignments: &[PartitionAssignment]) -> Result<(), KafkaOpError> {
        let mut tpl = TopicPartitionList::with_capacity(assignments.len());

        for a in assignments {
            match a.offset {
                Some(offset) => tpl
                    .add_partition_offset(&a.topic, a.partition, Offset::Offset(offset))
                    .map_err(to_op_error)?,
                None => {
                    tpl.add_partition(&a.topic, a.partition);
                }
            }
        }

        self.consumer.assign(&tpl).map_err(to_op_error)
    }

    async fn recv(&self) -> Result<ConsumedRecord, KafkaOpError> {
        let msg = self.consumer.recv().await.map_err(to_op_error)?;

        Ok(ConsumedRecord {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            key: msg.key().map(|k| k.to_vec()),
            value: msg.payload().map(|v| v.to_vec()),
        })
    }

    fn commit(&self, offsets: Option<&[TopicPartitionOffset]>) -> Result<(), KafkaOpError> {
        match offsets {
            Some(offsets) => {
                let mut tpl = TopicPartitionList::with_capacity(offsets.len());
                for o in offsets {
                    tpl.add_partition_offset(&o.topic, o.partition, Offset::Offset(o.offset))
                        .map_err(to_op_error)?;
                }
                self.consumer.commit(&tpl, CommitMode::Sync).map_err(to_op_error)
            }
            None => self
                .consumer
                .commit_consumer_state(CommitMode::Sync)
                .map_err(to_op_error),
        }
    }

    fn seek(&self, topic: &str, partition: i32, position: SeekPosition) -> Result<(), KafkaOpError> {
        let assigned = self.assignment()?;
        let is_assigned = assigned
            .iter()
            .any(|tp| tp.topic == topic && tp.partition == partition);

        if !is_assigned {
            return Err(KafkaOpError::NotAssigned {
                topic: topic.to_string(),
                partition,
            });
        }

        let offset = match position {
            SeekPosition::Offset(o) => Offset::Offset(o),
            SeekPosition::Beginning => Offset::Beginning,
            SeekPosition::End => Offset::End,
        };

        self.consumer
            .seek(topic, partition, offset, Timeout::After(OP_TIMEOUT))
            .map_err(to_op_error)
    }

    fn assignment(&self) -> Result<Vec<TopicPartition>, KafkaOpError> {
        let tpl = self.consumer.assignment().map_err(to_op_error)?;

        Ok(tpl
            .elements()
            .iter()
            .map(|e| TopicPartition {
                topic: e.topic().to_string(),
                partition: e.partition(),
            })
            .collect())
    }

    fn close(&self) {
        self.consumer.unsubscribe();
    }
}

/// Real Kafka producer handle, wrapping an `rdkafka` [`FutureProducer`].
pub struct RdKafkaProducer {
    producer: FutureProducer<BridgeClientContext>,
}

impl RdKafkaProducer {
    fn new(bootstrap_servers: &str, acks: &str) -> anyhow::Result<Self> {
        let mut client_config = ClientConfig::new();
        client_config.set("bootstrap.servers", bootstrap_servers);
        client_config.set("acks", acks);

        let producer: FutureProducer<BridgeClientContext> = client_config
            .set_log_level(RDKafkaLogLevel::Info)
            .create_with_context(BridgeClientContext)?;

        Ok(Self { producer })
    }
}

#[async_trait]
impl KafkaProducerHandle for RdKafkaProducer {
    async fn send(&self, record: OutgoingRecord) -> Result<RecordMetadata, KafkaOpError> {
        let mut future_record: FutureRecord<'_, Vec<u8>, Vec<u8>> =
            FutureRecord::to(&record.topic).payload(&record.value);

        if let Some(key) = record.key.as_ref() {
            future_record = future_record.key(key);
        }

        if let Some(partition) = record.partition {
            future_record = future_record.partition(partition);
        }

        match self.producer.send(future_record, Timeout::After(OP_TIMEOUT)).await {
            Ok((partition, offset)) => Ok(RecordMetadata { partition, offset }),
            Err((e, _owned_message)) => Err(to_op_error(e)),
        }
    }
}

/// Builds [`RdKafkaConsumer`]/[`RdKafkaProducer`] handles against a fixed bootstrap-servers list.
#[derive(Clone)]
pub struct RdKafkaHandleFactory {
    bootstrap_servers: String,
}

impl RdKafkaHandleFactory {
    pub fn new(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
        }
    }
}

impl KafkaHandleFactory for RdKafkaHandleFactory {
    type Consumer = RdKafkaConsumer;
    type Producer = RdKafkaProducer;

    fn new_consumer(
        &self,
        client_id: &str,
        group_id: &str,
        properties: &HashMap<String, String>,
    ) -> anyhow::Result<Self::Consumer> {
        RdKafkaConsumer::new(&self.bootstrap_servers, client_id, group_id, properties)
    }

    fn new_producer(&self, acks: &str) -> anyhow::Result<Self::Producer> {
        RdKafkaProducer::new(&self.bootstrap_servers, acks)
    }
}
