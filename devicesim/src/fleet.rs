//! Fleet initialization: builds default devices and writes them to the store.

use crate::errors::StoreResult;
use crate::history::HistoryLog;
use crate::model::{Device, DeviceStatus, DeviceType};
use crate::profile;
use crate::store::DeviceStore;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub fn default_device(id: impl Into<String>, device_type: DeviceType, now: DateTime<Utc>) -> Device {
    Device {
        id: id.into(),
        device_type,
        status: DeviceStatus::Online,
        attributes: profile::defaults(device_type),
        updated_at: now,
    }
}

/// `dev-1..=dev-count`, cycling through every device type
pub fn demo_fleet(count: usize, now: DateTime<Utc>) -> Vec<Device> {
    (1..=count)
        .map(|n| {
            let device_type = DeviceType::ALL[(n - 1) % DeviceType::ALL.len()];
            default_device(format!("dev-{}", n), device_type, now)
        })
        .collect()
}

/// Writes `devices` to the store and returns how many were written.
///
/// Existing records are left alone unless `overwrite` is set. Devices
/// that already have recorded commands are never overwritten.
pub async fn seed(
    store: &DeviceStore,
    history: &HistoryLog,
    devices: &[Device],
    overwrite: bool,
) -> StoreResult<usize> {
    let mut written = 0;
    for device in devices {
        if overwrite {
            let recorded = history.count(&device.id).await?;
            if recorded > 0 {
                warn!(device_id = %device.id, recorded, "Device has command history, not overwriting");
                continue;
            }
            store.put(&device.id, device).await?;
            written += 1;
        } else if store.insert(device).await? {
            written += 1;
        } else {
            debug!(device_id = %device.id, "Device already seeded, skipping");
        }
    }

    info!(written, total = devices.len(), "Fleet seeded");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryStore;
    use crate::model::{AttributeValue, Command, CommandHistoryEntry, CommandOutcome};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_demo_fleet_cycles_types() {
        let fleet = demo_fleet(4, Utc::now());
        let types: Vec<DeviceType> = fleet.iter().map(|d| d.device_type).collect();
        assert_eq!(
            types,
            vec![
                DeviceType::Sensor,
                DeviceType::Actuator,
                DeviceType::Gateway,
                DeviceType::Sensor
            ]
        );
        assert_eq!(fleet[3].id, "dev-4");
    }

    fn stores() -> (DeviceStore, HistoryLog) {
        let kv = Arc::new(MemoryStore::new());
        (
            DeviceStore::new(kv.clone(), Duration::from_secs(1)),
            HistoryLog::new(kv, Duration::from_secs(1)),
        )
    }

    #[tokio::test]
    async fn test_seed_skips_existing_without_overwrite() {
        let (store, history) = stores();
        let now = Utc::now();
        let fleet = demo_fleet(3, now);

        assert_eq!(seed(&store, &history, &fleet, false).await.unwrap(), 3);
        assert_eq!(seed(&store, &history, &fleet, false).await.unwrap(), 0);
        assert_eq!(seed(&store, &history, &fleet, true).await.unwrap(), 3);
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_devices_with_history() {
        let (store, history) = stores();
        let now = Utc::now();
        let fleet = demo_fleet(2, now);
        seed(&store, &history, &fleet, false).await.unwrap();

        let mut changed = fleet[0].clone();
        changed
            .attributes
            .insert("temp".to_string(), AttributeValue::Number(42.0));
        store.put(&changed.id, &changed).await.unwrap();
        history
            .append(
                &changed.id,
                &CommandHistoryEntry {
                    command: Command {
                        id: Uuid::new_v4(),
                        device_id: changed.id.clone(),
                        name: "set_value".to_string(),
                        parameters: Default::default(),
                        submitted_at: now,
                        outcome: CommandOutcome::executed(json!({ "value": 42.0 })),
                    },
                    before: fleet[0].clone(),
                    after: changed.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(seed(&store, &history, &fleet, true).await.unwrap(), 1);
        assert_eq!(store.get(&changed.id).await.unwrap(), changed);
    }
}
