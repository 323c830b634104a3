//! Append-only command history, one ordered list per device.

use crate::errors::{StoreError, StoreResult};
use crate::kv::{timed, KvStore};
use crate::model::CommandHistoryEntry;
use crate::store::history_key;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct HistoryLog {
    kv: Arc<dyn KvStore>,
    timeout: Duration,
}

impl HistoryLog {
    pub fn new(kv: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { kv, timeout }
    }

    pub async fn append(&self, device_id: &str, entry: &CommandHistoryEntry) -> StoreResult<()> {
        let value = serde_json::to_string(entry)?;
        timed(self.timeout, self.kv.rpush(&history_key(device_id), &value)).await
    }

    /// Oldest first. Unknown devices yield an empty page.
    pub async fn list(&self, device_id: &str, limit: usize, offset: usize) -> StoreResult<Vec<CommandHistoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Ok(start) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let span = i64::try_from(limit).unwrap_or(i64::MAX);
        let stop = start.saturating_add(span - 1);

        let key = history_key(device_id);
        let raw = timed(self.timeout, self.kv.lrange(&key, start, stop)).await?;

        raw.iter()
            .map(|item| {
                serde_json::from_str(item).map_err(|source| StoreError::Malformed {
                    key: key.clone(),
                    source,
                })
            })
            .collect()
    }

    pub async fn count(&self, device_id: &str) -> StoreResult<usize> {
        timed(self.timeout, self.kv.llen(&history_key(device_id))).await
    }
}
