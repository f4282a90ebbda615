//! AtomicDrainer: reads and clears a family's queue in one atomic step,
//! validating each entry on the way out.

use chrono::Utc;
use locus_config::QueueConfig;
use locus_core::types::{Batch, Family};
use locus_core::validator::{validate_gps, validate_mobile};
use locus_core::PipelineError;
use locus_queue::QueueStoreClient;
use metrics::counter;
use std::sync::Arc;

pub struct AtomicDrainer {
    queue: Arc<dyn QueueStoreClient>,
    keys: QueueConfig,
}

impl AtomicDrainer {
    pub fn new(queue: Arc<dyn QueueStoreClient>, keys: QueueConfig) -> Self {
        Self { queue, keys }
    }

    /// Drains every record currently queued for `family`, validating and
    /// normalizing each, and returns a `Batch` preserving queue order.
    /// Rejected entries are dropped and counted, never returned.
    pub async fn drain(&self, family: Family) -> Result<Batch, PipelineError> {
        let key = self.keys.key_for(family);
        let raw_entries = self.queue.read_all_and_delete_atomically(key).await?;

        let validate = match family {
            Family::Gps => validate_gps,
            Family::Mobile => validate_mobile,
        };

        let mut records = Vec::with_capacity(raw_entries.len());
        for raw in &raw_entries {
            match validate(raw) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    tracing::warn!(family = %family, reason = %reason, "dropped record during drain");
                    counter!("locus.records.rejected", "family" => family.as_str(), "reason" => reason.to_string())
                        .increment(1);
                }
            }
        }

        Ok(Batch::new(family, records, Utc::now()))
    }
}
