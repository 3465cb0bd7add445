//! Process-wide directory of live [`ConsumerSession`]s and [`ProducerSession`]s (§4.6). Backed by
//! two `dashmap::DashMap`s, the sharded-lock map style the wider example pack reaches for when a
//! routing table needs concurrent reads with occasional inserts/removes rather than a single
//! `Mutex<HashMap<_>>`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::consumer::ConsumerSession;
use crate::error::BridgeError;
use crate::kafka::KafkaHandleFactory;
use crate::producer::ProducerSession;

/// Combines `(group_id, name)` into the registry's consumer lookup key, matching the uniqueness
/// invariant in §3.
fn instance_key(group_id: &str, name: &str) -> String {
    format!("{group_id}/{name}")
}

/// Thread-safe directory of consumer and producer sessions. Generic over a [`KafkaHandleFactory`]
/// so tests can substitute [`crate::kafka::testing::FakeHandleFactory`] for `rdkafka`.
pub struct SessionRegistry<F: KafkaHandleFactory> {
    factory: F,
    bridge_id: String,
    idle_timeout: Duration,
    default_poll_timeout_ms: u64,
    default_max_response_bytes: usize,
    consumers: DashMap<String, Arc<ConsumerSession<F::Consumer>>>,
    producers: DashMap<u64, Arc<ProducerSession<F>>>,
}

impl<F: KafkaHandleFactory + Clone> SessionRegistry<F> {
    pub fn new(
        factory: F,
        bridge_id: String,
        idle_timeout: Duration,
        default_poll_timeout_ms: u64,
        default_max_response_bytes: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            factory,
            bridge_id,
            idle_timeout,
            default_poll_timeout_ms,
            default_max_response_bytes,
            consumers: DashMap::new(),
            producers: DashMap::new(),
        })
    }

    /// Generates an instance name starting with the configured `bridge_id` (§8 property 2).
    pub fn generate_name(&self) -> String {
        format!("{}-{}", self.bridge_id, uuid::Uuid::new_v4())
    }

    pub fn kafka_factory(&self) -> &F {
        &self.factory
    }

    pub fn default_poll_timeout_ms(&self) -> u64 {
        self.default_poll_timeout_ms
    }

    pub fn default_max_response_bytes(&self) -> usize {
        self.default_max_response_bytes
    }

    /// Registers a newly constructed consumer session under `(group_id, name)`, failing with 409
    /// if one is already live (§4.4.1, §8 property 1).
    pub fn insert_consumer(
        &self,
        group_id: &str,
        name: &str,
        session: ConsumerSession<F::Consumer>,
    ) -> Result<(), BridgeError> {
        let key = instance_key(group_id, name);

        match self.consumers.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BridgeError::conflict(
                "A consumer instance with the specified name already exists in the Kafka Bridge.",
            )),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::new(session));
                Ok(())
            }
        }
    }

    /// Looks up a live consumer session, failing 404 when absent (explicit deletion and idle
    /// expiry both remove the entry, so both look identical here — §8 property 7).
    pub fn get_consumer(
        &self,
        group_id: &str,
        name: &str,
    ) -> Result<Arc<ConsumerSession<F::Consumer>>, BridgeError> {
        self.consumers
            .get(&instance_key(group_id, name))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::not_found("The specified consumer instance was not found."))
    }

    /// Closes and removes a consumer session. Deleting a non-existent instance is a 404
    /// (§4.4.6).
    pub async fn remove_consumer(&self, group_id: &str, name: &str) -> Result<(), BridgeError> {
        let (_, session) = self
            .consumers
            .remove(&instance_key(group_id, name))
            .ok_or_else(|| BridgeError::not_found("The specified consumer instance was not found."))?;

        session.close().await;
        Ok(())
    }

    /// Returns the producer session for the given connection, creating one on first use (§4.5).
    pub fn producer_for_connection(&self, connection_id: u64) -> Arc<ProducerSession<F>> {
        self.producers
            .entry(connection_id)
            .or_insert_with(|| Arc::new(ProducerSession::new(self.factory.clone())))
            .value()
            .clone()
    }

    /// Tears down the producer session associated with a connection, if any. Called when the
    /// HTTP connection closes (§4.6).
    pub fn remove_producer(&self, connection_id: u64) {
        self.producers.remove(&connection_id);
    }

    /// Spawns the idle-expiry ticker. Consumers whose last successful operation is older than the
    /// configured idle timeout are closed and removed (§4.6, §8 property 7).
    pub fn spawn_idle_expiry(self: &Arc<Self>) {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(registry.idle_timeout);
            interval.tick().await; // first tick fires immediately; skip it

            loop {
                interval.tick().await;
                registry.expire_idle_consumers().await;
            }
        });
    }

    async fn expire_idle_consumers(&self) {
        let expired: Vec<String> = self
            .consumers
            .iter()
            .filter(|entry| entry.value().idle_for() >= self.idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();

        for key in expired {
            if let Some((_, session)) = self.consumers.remove(&key) {
                tracing::info!(instance = %key, "expiring idle consumer instance");
                session.close().await;
            }
        }
    }

    /// Closes every live consumer and producer session, emptying both maps. Invoked once, during
    /// graceful shutdown, before the HTTP listener socket is released (§4.6).
    pub async fn shutdown(&self) {
        for entry in self.consumers.iter() {
            entry.value().close().await;
        }
        self.consumers.clear();
        self.producers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::kafka::testing::FakeHandleFactory;
    use crate::kafka::KafkaHandleFactory;
    use std::collections::HashMap;

    fn new_registry() -> Arc<SessionRegistry<FakeHandleFactory>> {
        SessionRegistry::new(
            FakeHandleFactory::new(),
            "bridge".into(),
            Duration::from_secs(300),
            1000,
            8 * 1024 * 1024,
        )
    }

    fn new_session(
        factory: &FakeHandleFactory,
        group: &str,
        name: &str,
    ) -> ConsumerSession<crate::kafka::testing::FakeConsumer> {
        let consumer = factory.new_consumer(name, group, &HashMap::new()).unwrap();
        ConsumerSession::new(
            group.into(),
            name.into(),
            Format::Json,
            "http://localhost/consumers/g/instances/n".into(),
            consumer,
            1000,
            8 * 1024 * 1024,
        )
    }

    #[tokio::test]
    async fn duplicate_insert_is_conflict() {
        let registry = new_registry();
        let factory = FakeHandleFactory::new();

        registry
            .insert_consumer("g", "n", new_session(&factory, "g", "n"))
            .unwrap();

        let err = registry
            .insert_consumer("g", "n", new_session(&factory, "g", "n"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_instance_is_not_found() {
        let registry = new_registry();
        let err = registry.get_consumer("g", "missing").unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_then_lookup_is_not_found() {
        let registry = new_registry();
        let factory = FakeHandleFactory::new();
        registry
            .insert_consumer("g", "n", new_session(&factory, "g", "n"))
            .unwrap();

        registry.remove_consumer("g", "n").await.unwrap();

        let err = registry.get_consumer("g", "n").unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn generated_names_start_with_bridge_id() {
        let registry = new_registry();
        assert!(registry.generate_name().starts_with("bridge-"));
    }

    #[tokio::test]
    async fn producer_session_is_reused_per_connection() {
        let registry = new_registry();
        let a = registry.producer_for_connection(1);
        let b = registry.producer_for_connection(1);
        assert!(Arc::ptr_eq(&a, &b));

        registry.remove_producer(1);
        let c = registry.producer_for_connection(1);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn shutdown_empties_both_maps() {
        let registry = new_registry();
        let factory = FakeHandleFactory::new();
        registry
            .insert_consumer("g", "n", new_session(&factory, "g", "n"))
            .unwrap();
        registry.producer_for_connection(1);

        registry.shutdown().await;

        assert!(registry.get_consumer("g", "n").is_err());
        assert_eq!(registry.producers.len(), 0);
    }
}
