//! Device records keyed by `device:{id}`.

use crate::errors::{StoreError, StoreResult};
use crate::kv::{timed, KvStore};
use crate::model::{CommandHistoryEntry, Device};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

const DEVICE_PREFIX: &str = "device:";
const HISTORY_SUFFIX: &str = ":commands";

pub fn device_key(device_id: &str) -> String {
    format!("{}{}", DEVICE_PREFIX, device_id)
}

pub fn history_key(device_id: &str) -> String {
    format!("{}{}{}", DEVICE_PREFIX, device_id, HISTORY_SUFFIX)
}

/// The stored encoding a device was decoded from. A conditional write
/// succeeds only while the record still holds exactly these bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(String);

#[derive(Clone)]
pub struct DeviceStore {
    kv: Arc<dyn KvStore>,
    timeout: Duration,
}

impl DeviceStore {
    pub fn new(kv: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self { kv, timeout }
    }

    pub async fn get(&self, device_id: &str) -> StoreResult<Device> {
        self.get_versioned(device_id).await.map(|(device, _)| device)
    }

    pub async fn get_versioned(&self, device_id: &str) -> StoreResult<(Device, Revision)> {
        let key = device_key(device_id);
        let raw = timed(self.timeout, self.kv.get(&key))
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let device = decode(&key, &raw)?;
        Ok((device, Revision(raw)))
    }

    pub async fn put(&self, device_id: &str, device: &Device) -> StoreResult<()> {
        let value = serde_json::to_string(device)?;
        timed(self.timeout, self.kv.set(&device_key(device_id), &value)).await
    }

    /// Writes `device` only if the record still matches `revision`.
    pub async fn put_if_unchanged(&self, device_id: &str, device: &Device, revision: &Revision) -> StoreResult<bool> {
        let value = serde_json::to_string(device)?;
        timed(
            self.timeout,
            self.kv.set_if(&device_key(device_id), &revision.0, &value),
        )
        .await
    }

    /// Conditional write that also appends `entry` to the device's history
    /// in the same step. History order therefore follows write order.
    pub async fn put_if_unchanged_recording(
        &self,
        device_id: &str,
        device: &Device,
        revision: &Revision,
        entry: &CommandHistoryEntry,
    ) -> StoreResult<bool> {
        let value = serde_json::to_string(device)?;
        let item = serde_json::to_string(entry)?;
        timed(
            self.timeout,
            self.kv.set_if_and_rpush(
                &device_key(device_id),
                &revision.0,
                &value,
                &history_key(device_id),
                &item,
            ),
        )
        .await
    }

    /// Create-only write. Returns false when the id is already taken.
    pub async fn insert(&self, device: &Device) -> StoreResult<bool> {
        let value = serde_json::to_string(device)?;
        timed(self.timeout, self.kv.set_nx(&device_key(&device.id), &value)).await
    }

    /// Every stored device, ordered by id
    pub async fn list(&self) -> StoreResult<Vec<Device>> {
        let keys = timed(self.timeout, self.kv.keys(DEVICE_PREFIX)).await?;

        let mut devices = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|k| !k.ends_with(HISTORY_SUFFIX)) {
            match timed(self.timeout, self.kv.get(key)).await? {
                Some(raw) => devices.push(decode(key, &raw)?),
                None => warn!(key = %key, "Device disappeared while listing"),
            }
        }

        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        timed(self.timeout, self.kv.ping()).await
    }
}

fn decode(key: &str, raw: &str) -> StoreResult<Device> {
    serde_json::from_str(raw).map_err(|source| {
        error!(key = %key, "Malformed device record: {}", source);
        StoreError::Malformed {
            key: key.to_string(),
            source,
        }
    })
}
