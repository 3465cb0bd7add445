//! Per-instance consumer session (§3, §4.4): owns the subscribe/assign/poll/commit/seek state
//! machine for one [`crate::kafka::KafkaConsumerHandle`]. Operations on the same session are
//! serialized through `state`'s `tokio::sync::Mutex`, held for the duration of the underlying
//! Kafka call, the same way the registry's per-instance routing keeps two concurrent requests for
//! the same instance from racing on a non-reentrant consumer handle (§5).

use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::codec::{self, EncodedRecord};
use crate::error::BridgeError;
use crate::format::Format;
use crate::kafka::{
    KafkaConsumerHandle, PartitionAssignment, SeekPosition, TopicPartition, TopicPartitionOffset,
};

/// Mirrors `ConsumerInstance.subscription_state` (§3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SubscriptionState {
    None,
    TopicList,
    TopicPattern,
    ManualAssign,
}

struct ConsumerState<C> {
    consumer: C,
    subscription: SubscriptionState,
    poll_timeout_ms: u64,
    max_response_bytes: usize,
}

/// A named, stateful handle bound to a Kafka consumer group, addressable over HTTP by
/// `(group_id, name)`.
pub struct ConsumerSession<C> {
    pub group_id: String,
    pub name: String,
    pub format: Format,
    pub base_uri: String,
    last_activity: std::sync::Mutex<Instant>,
    state: Mutex<ConsumerState<C>>,
}

impl<C: KafkaConsumerHandle> ConsumerSession<C> {
    pub fn new(
        group_id: String,
        name: String,
        format: Format,
        base_uri: String,
        consumer: C,
        poll_timeout_ms: u64,
        max_response_bytes: usize,
    ) -> Self {
        Self {
            group_id,
            name,
            format,
            base_uri,
            last_activity: std::sync::Mutex::new(Instant::now()),
            state: Mutex::new(ConsumerState {
                consumer,
                subscription: SubscriptionState::None,
                poll_timeout_ms,
                max_response_bytes,
            }),
        }
    }

    /// Seconds since the instance's last successful operation, used by the registry's idle-expiry
    /// ticker. Reading this never blocks on an in-flight Kafka call.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().expect("lock acquired").elapsed()
    }

    fn touch(&self) {
        *self.last_activity.lock().expect("lock acquired") = Instant::now();
    }

    /// Subscribes to exactly one of `topics` or `topic_pattern` (§4.4.2).
    pub async fn subscribe(
        &self,
        topics: Option<Vec<String>>,
        topic_pattern: Option<String>,
    ) -> Result<(), BridgeError> {
        match (topics, topic_pattern) {
            (Some(_), Some(_)) => Err(BridgeError::conflict(
                "Subscriptions to topics, partitions, and patterns are mutually exclusive.",
            )),
            (None, None) => Err(BridgeError::semantic(
                "At least one of topics or topic_pattern must be specified.",
            )),
            (Some(topics), None) => {
                if topics.is_empty() {
                    return Err(BridgeError::semantic("topics must be a non-empty list."));
                }
                let mut state = self.state.lock().await;
                state.consumer.subscribe_topics(&topics)?;
                state.subscription = SubscriptionState::TopicList;
                drop(state);
                self.touch();
                Ok(())
            }
            (None, Some(pattern)) => {
                let mut state = self.state.lock().await;
                state.consumer.subscribe_pattern(&pattern)?;
                state.subscription = SubscriptionState::TopicPattern;
                drop(state);
                self.touch();
                Ok(())
            }
        }
    }

    /// Clears the current subscription (§4.4.7). Idempotent.
    pub async fn unsubscribe(&self) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        state.consumer.unsubscribe();
        state.subscription = SubscriptionState::None;
        drop(state);
        self.touch();
        Ok(())
    }

    /// Manually assigns partitions, superseding any prior subscribe/assign (§4.4.2).
    pub async fn assign(&self, partitions: Vec<PartitionAssignment>) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        state.consumer.assign(&partitions)?;
        state.subscription = SubscriptionState::ManualAssign;
        drop(state);
        self.touch();
        Ok(())
    }

    /// Polls for available records, encoding the batch with the session's configured
    /// [`Format`] (§4.4.3). `timeout_ms`/`max_bytes`, when given, override the session's
    /// remembered defaults for this call and become the new remembered defaults.
    pub async fn poll(
        &self,
        timeout_ms: Option<u64>,
        max_bytes: Option<usize>,
    ) -> Result<Vec<EncodedRecord>, BridgeError> {
        let mut state = self.state.lock().await;

        if state.subscription == SubscriptionState::None {
            return Err(BridgeError::internal(
                "Consumer is not subscribed to any topics or assigned any partitions",
            ));
        }

        let timeout_ms = timeout_ms.unwrap_or(state.poll_timeout_ms);
        state.poll_timeout_ms = timeout_ms;
        let max_bytes = max_bytes.unwrap_or(state.max_response_bytes);
        state.max_response_bytes = max_bytes;

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut records = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, state.consumer.recv()).await {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => break,
            }
        }

        let encoded: Vec<EncodedRecord> = records
            .iter()
            .map(|r| codec::encode_record(self.format, r))
            .collect::<Result<_, _>>()?;

        let body_size = serde_json::to_vec(&encoded)
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        if body_size > max_bytes {
            // §9's accepted concession: the consumer position has already advanced past
            // whatever `recv` returned above; we simply do not hand the batch back.
            return Err(BridgeError::semantic(
                "Response exceeds the maximum number of bytes the consumer can receive",
            ));
        }

        drop(state);
        self.touch();

        Ok(encoded)
    }

    /// Commits explicit offsets, or the session's last-delivered positions when `offsets` is
    /// `None` (§4.4.4).
    pub async fn commit(&self, offsets: Option<Vec<TopicPartitionOffset>>) -> Result<(), BridgeError> {
        let state = self.state.lock().await;
        state.consumer.commit(offsets.as_deref())?;
        drop(state);
        self.touch();
        Ok(())
    }

    /// Seeks a set of partitions to explicit offsets, in parallel (§4.4.5).
    pub async fn seek(&self, offsets: Vec<TopicPartitionOffset>) -> Result<(), BridgeError> {
        let state = self.state.lock().await;

        let futures = offsets.iter().map(|o| async {
            state
                .consumer
                .seek(&o.topic, o.partition, SeekPosition::Offset(o.offset))
        });

        try_join_all(futures).await?;

        drop(state);
        self.touch();
        Ok(())
    }

    /// Seeks the given partitions to the beginning or end of the log (§4.4.5).
    pub async fn seek_to(
        &self,
        partitions: Vec<TopicPartition>,
        position: SeekPosition,
    ) -> Result<(), BridgeError> {
        let state = self.state.lock().await;

        let futures = partitions
            .iter()
            .map(|tp| async { state.consumer.seek(&tp.topic, tp.partition, position) });

        try_join_all(futures).await?;

        drop(state);
        self.touch();
        Ok(())
    }

    /// Closes the underlying consumer handle. Called by the registry on explicit delete, idle
    /// expiry, or process shutdown.
    pub async fn close(&self) {
        let state = self.state.lock().await;
        state.consumer.close();
    }
}
