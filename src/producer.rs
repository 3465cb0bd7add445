//! Per-HTTP-connection producer session (§3, §4.5): lazily materializes an acks=all and an
//! acks=0 producer handle and forwards batches of records, preserving input order in the
//! response.

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::codec::{self, ProduceRecord};
use crate::error::BridgeError;
use crate::format::Format;
use crate::kafka::{KafkaHandleFactory, KafkaProducerHandle, OutgoingRecord};

/// One element of a produce response's `offsets` array: either success metadata or a per-record
/// error, matching the input record's position.
#[derive(Serialize)]
#[serde(untagged)]
pub enum ProduceResult {
    Ok { partition: i32, offset: i64 },
    Err { error_code: u16, error: String },
}

/// Producer session bound to a single HTTP connection's lifetime. Holds at most one acks=all and
/// one acks=0 handle, created on first use.
pub struct ProducerSession<F: KafkaHandleFactory> {
    factory: F,
    acks_all: OnceCell<F::Producer>,
    acks_zero: OnceCell<F::Producer>,
}

impl<F: KafkaHandleFactory> ProducerSession<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            acks_all: OnceCell::new(),
            acks_zero: OnceCell::new(),
        }
    }

    async fn acks_all_handle(&self) -> Result<&F::Producer, BridgeError> {
        self.acks_all
            .get_or_try_init(|| async { self.factory.new_producer("all") })
            .await
            .map_err(|e| BridgeError::internal(e.to_string()))
    }

    async fn acks_zero_handle(&self) -> Result<&F::Producer, BridgeError> {
        self.acks_zero
            .get_or_try_init(|| async { self.factory.new_producer("0") })
            .await
            .map_err(|e| BridgeError::internal(e.to_string()))
    }

    /// Sends a batch without waiting for or reporting per-record metadata, via the acks=0
    /// producer (§4.5's fire-and-forget mode). No HTTP operation currently requests this path;
    /// it exists for parity with the two-handle session model the data model specifies.
    pub async fn produce_fire_and_forget(
        &self,
        topic: &str,
        format: Format,
        records: Vec<ProduceRecord>,
    ) -> Result<(), BridgeError> {
        let producer = self.acks_zero_handle().await?;

        for record in records {
            send_one(producer, topic, format, record).await;
        }

        Ok(())
    }

    /// Builds and sends one record per element of `records`, awaiting per-record metadata via
    /// the acks=all producer. The returned vector preserves the input order (§4.5, §8 property
    /// 10); a broker failure on one record does not abort the rest of the batch (§7).
    pub async fn produce(
        &self,
        topic: &str,
        format: Format,
        records: Vec<ProduceRecord>,
    ) -> Result<Vec<ProduceResult>, BridgeError> {
        let producer = self.acks_all_handle().await?;

        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let outcome = send_one(producer, topic, format, record).await;
            results.push(outcome);
        }

        Ok(results)
    }
}

async fn send_one<P: KafkaProducerHandle>(
    producer: &P,
    topic: &str,
    format: Format,
    record: ProduceRecord,
) -> ProduceResult {
    let key = match codec::decode_key(format, record.key.as_ref(), record.with_null_key) {
        Ok(key) => key,
        Err(e) => {
            return ProduceResult::Err {
                error_code: e.status().as_u16(),
                error: e.to_string(),
            };
        }
    };

    let value = match codec::decode_value(format, &record.value) {
        Ok(value) => value,
        Err(e) => {
            return ProduceResult::Err {
                error_code: e.status().as_u16(),
                error: e.to_string(),
            };
        }
    };

    let outgoing = OutgoingRecord {
        topic: topic.to_string(),
        key,
        value,
        partition: record.partition,
    };

    match producer.send(outgoing).await {
        Ok(meta) => ProduceResult::Ok {
            partition: meta.partition,
            offset: meta.offset,
        },
        Err(e) => {
            let bridge_err: BridgeError = e.into();
            ProduceResult::Err {
                error_code: bridge_err.status().as_u16(),
                error: bridge_err.to_string(),
            }
        }
    }
}
