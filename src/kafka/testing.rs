//! In-memory fake Kafka broker used by the test suite, implementing the same
//! [`super::KafkaConsumerHandle`]/[`super::KafkaProducerHandle`]/[`super::KafkaHandleFactory`]
//! traits as the real `rdkafka`-backed handles in [`super::rdkafka_impl`]. This lets the session,
//! registry, and HTTP-handler tests exercise uniqueness, idle expiry, format negotiation,
//! base-URI derivation, and error mapping without a running Kafka broker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use super::{
    ConsumedRecord, KafkaConsumerHandle, KafkaHandleFactory, KafkaOpError, KafkaProducerHandle,
    OutgoingRecord, PartitionAssignment, RecordMetadata, SeekPosition, TopicPartition,
    TopicPartitionOffset,
};

/// An append-only, single-partition log per topic.
#[derive(Default)]
struct TopicLog {
    records: Vec<ConsumedRecord>,
}

/// Shared in-memory broker state. Clone and hand to both a fake consumer and producer factory so
/// that records produced in a test are visible to consumers subscribed against the same broker.
#[derive(Clone, Default)]
pub struct FakeBroker {
    topics: Arc<Mutex<HashMap<String, TopicLog>>>,
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, topic: &str, key: Option<Vec<u8>>, value: Vec<u8>) -> RecordMetadata {
        let mut topics = self.topics.lock().expect("lock acquired");
        let log = topics.entry(topic.to_string()).or_default();
        let offset = log.records.len() as i64;

        log.records.push(ConsumedRecord {
            topic: topic.to_string(),
            partition: 0,
            offset,
            key,
            value: Some(value),
        });

        RecordMetadata { partition: 0, offset }
    }

    fn log_len(&self, topic: &str) -> i64 {
        self.topics
            .lock()
            .expect("lock acquired")
            .get(topic)
            .map(|l| l.records.len() as i64)
            .unwrap_or(0)
    }

    fn record_at(&self, topic: &str, offset: i64) -> Option<ConsumedRecord> {
        self.topics
            .lock()
            .expect("lock acquired")
            .get(topic)
            .and_then(|l| l.records.get(offset as usize))
            .cloned()
    }

    fn topics_matching(&self, pattern: &Regex) -> Vec<String> {
        self.topics
            .lock()
            .expect("lock acquired")
            .keys()
            .filter(|name| pattern.is_match(name))
            .cloned()
            .collect()
    }
}

enum Subscription {
    None,
    Fixed,
}

struct ConsumerState {
    subscription: Subscription,
    assignment: Vec<TopicPartition>,
    cursor: HashMap<(String, i32), i64>,
    last_delivered: HashMap<(String, i32), i64>,
    committed: HashMap<(String, i32), i64>,
}

impl Default for ConsumerState {
    fn default() -> Self {
        Self {
            subscription: Subscription::None,
            assignment: Vec::new(),
            cursor: HashMap::new(),
            last_delivered: HashMap::new(),
            committed: HashMap::new(),
        }
    }
}

/// Fake consumer handle backed by a [`FakeBroker`]. Partition `0` is the only partition any fake
/// topic has; this is sufficient to exercise the bridge's session semantics without standing up a
/// real multi-partition cluster.
pub struct FakeConsumer {
    broker: FakeBroker,
    state: Mutex<ConsumerState>,
}

impl FakeConsumer {
    pub fn new(broker: FakeBroker) -> Self {
        Self {
            broker,
            state: Mutex::new(ConsumerState::default()),
        }
    }
}

#[async_trait]
impl KafkaConsumerHandle for FakeConsumer {
    fn subscribe_topics(&self, topics: &[String]) -> Result<(), KafkaOpError> {
        let mut state = self.state.lock().expect("lock acquired");

        state.assignment = topics
            .iter()
            .map(|t| TopicPartition {
                topic: t.clone(),
                partition: 0,
            })
            .collect();

        for topic in topics {
            state
                .cursor
                .entry((topic.clone(), 0))
                .or_insert_with(|| self.broker.log_len(topic));
        }

        state.subscription = Subscription::Fixed;

        Ok(())
    }

    fn subscribe_pattern(&self, pattern: &str) -> Result<(), KafkaOpError> {
        let regex = Regex::new(pattern)
            .map_err(|e| KafkaOpError::broker(format!("invalid topic pattern: {e}")))?;

        let matched = self.broker.topics_matching(&regex);

        self.subscribe_topics(&matched)
    }

    fn unsubscribe(&self) {
        let mut state = self.state.lock().expect("lock acquired");
        state.subscription = Subscription::None;
        state.assignment.clear();
    }

    fn assign(&self, assignments: &[PartitionAssignment]) -> Result<(), KafkaOpError> {
        let mut state = self.state.lock().expect("lock acquired");

        state.assignment = assignments
            .iter()
            .map(|a| TopicPartition {
                topic: a.topic.clone(),
                partition: a.partition,
            })
            .collect();

        for a in assignments {
            let start = a.offset.unwrap_or_else(|| self.broker.log_len(&a.topic));
            state.cursor.insert((a.topic.clone(), a.partition), start);
        }

        state.subscription = Subscription::Fixed;

        Ok(())
    }

    async fn recv(&self) -> Result<ConsumedRecord, KafkaOpError> {
        loop {
            {
                let mut state = self.state.lock().expect("lock acquired");

                let assignment = state.assignment.clone();
                for tp in &assignment {
                    let key = (tp.topic.clone(), tp.partition);
                    let cursor = *state.cursor.get(&key).unwrap_or(&0);

                    if let Some(record) = self.broker.record_at(&tp.topic, cursor) {
                        state.cursor.insert(key.clone(), cursor + 1);
                        state.last_delivered.insert(key, cursor);
                        return Ok(record);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn commit(&self, offsets: Option<&[TopicPartitionOffset]>) -> Result<(), KafkaOpError> {
        let mut state = self.state.lock().expect("lock acquired");

        match offsets {
            Some(offsets) => {
                for o in offsets {
                    state
                        .committed
                        .insert((o.topic.clone(), o.partition), o.offset);
                }
            }
            None => {
                let last_delivered = state.last_delivered.clone();
                for (key, offset) in last_delivered {
                    state.committed.insert(key, offset);
                }
            }
        }

        Ok(())
    }

    fn seek(&self, topic: &str, partition: i32, position: SeekPosition) -> Result<(), KafkaOpError> {
        let mut state = self.state.lock().expect("lock acquired");

        let is_assigned = state
            .assignment
            .iter()
            .any(|tp| tp.topic == topic && tp.partition == partition);

        if !is_assigned {
            return Err(KafkaOpError::NotAssigned {
                topic: topic.to_string(),
                partition,
            });
        }

        let new_cursor = match position {
            SeekPosition::Offset(o) => o,
            SeekPosition::Beginning => 0,
            SeekPosition::End => self.broker.log_len(topic),
        };

        state
            .cursor
            .insert((topic.to_string(), partition), new_cursor);

        Ok(())
    }

    fn assignment(&self) -> Result<Vec<TopicPartition>, KafkaOpError> {
        Ok(self.state.lock().expect("lock acquired").assignment.clone())
    }

    fn close(&self) {
        let mut state = self.state.lock().expect("lock acquired");
        state.subscription = Subscription::None;
        state.assignment.clear();
    }
}

/// Fake producer handle backed by a [`FakeBroker`].
pub struct FakeProducer {
    broker: FakeBroker,
}

impl FakeProducer {
    pub fn new(broker: FakeBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl KafkaProducerHandle for FakeProducer {
    async fn send(&self, record: OutgoingRecord) -> Result<RecordMetadata, KafkaOpError> {
        Ok(self.broker.append(&record.topic, record.key, record.value))
    }
}

/// [`KafkaHandleFactory`] that hands out [`FakeConsumer`]/[`FakeProducer`] instances sharing a
/// single [`FakeBroker`], so producers and consumers created by the same factory see the same
/// topics.
#[derive(Clone, Default)]
pub struct FakeHandleFactory {
    broker: FakeBroker,
}

impl FakeHandleFactory {
    pub fn new() -> Self {
        Self {
            broker: FakeBroker::new(),
        }
    }
}

impl KafkaHandleFactory for FakeHandleFactory {
    type Consumer = FakeConsumer;
    type Producer = FakeProducer;

    fn new_consumer(
        &self,
        _client_id: &str,
        _group_id: &str,
        _properties: &HashMap<String, String>,
    ) -> anyhow::Result<Self::Consumer> {
        Ok(FakeConsumer::new(self.broker.clone()))
    }

    fn new_producer(&self, _acks: &str) -> anyhow::Result<Self::Producer> {
        Ok(FakeProducer::new(self.broker.clone()))
    }
}
