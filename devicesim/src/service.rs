use crate::errors::{Error, Result, StoreError};
use crate::history::HistoryLog;
use crate::kv::KvStore;
use crate::metrics::{COMMANDS_TOTAL, COMMAND_LATENCY_SECONDS, CONFLICTS_TOTAL, STORE_FAILURES_TOTAL};
use crate::model::{Command, CommandHistoryEntry, CommandRequest, Device};
use crate::simulator::{self, Transition};
use crate::store::DeviceStore;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Bounded retry for conditional writes that lose to a concurrent command
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff capped at 32x the base, plus up to one base of jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_backoff.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        let exp_ms = base_ms * 2_u64.pow(attempt.saturating_sub(1).min(5));
        let jitter_ms = rand::thread_rng().gen_range(0..=base_ms);
        Duration::from_millis(exp_ms + jitter_ms)
    }
}

/// Orchestrates reads, simulation and writes for the API layer.
#[derive(Clone)]
pub struct DeviceService {
    devices: DeviceStore,
    history: HistoryLog,
    retry: RetryPolicy,
}

impl DeviceService {
    pub fn new(kv: Arc<dyn KvStore>, store_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            devices: DeviceStore::new(kv.clone(), store_timeout),
            history: HistoryLog::new(kv, store_timeout),
            retry,
        }
    }

    pub fn devices(&self) -> &DeviceStore {
        &self.devices
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let devices = self.devices.list().await.map_err(store_failure)?;
        debug!(count = devices.len(), "Listed devices");
        Ok(devices)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        self.devices
            .get(device_id)
            .await
            .map_err(|e| read_failure(device_id, e))
    }

    /// Applies `request` to the device and records it.
    ///
    /// The device record and its history entry are written in one
    /// conditional step against the value that was read; on conflict the
    /// whole read/apply/write cycle is retried with the fresh state.
    /// Rejected commands go through the same cycle so their history entry
    /// is also checked against concurrent writes. A failed write is never
    /// retried, so a command is recorded at most once.
    pub async fn send_command(&self, device_id: &str, request: CommandRequest) -> Result<CommandHistoryEntry> {
        let started = Instant::now();
        let submitted_at = Utc::now();
        let command_id = Uuid::new_v4();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let (before, revision) = self
                .devices
                .get_versioned(device_id)
                .await
                .map_err(|e| read_failure(device_id, e))?;

            let Transition { next, outcome } = simulator::apply(&before, &request, submitted_at);

            let entry = CommandHistoryEntry {
                command: Command {
                    id: command_id,
                    device_id: device_id.to_string(),
                    name: request.name.clone(),
                    parameters: request.parameters.clone(),
                    submitted_at,
                    outcome,
                },
                before,
                after: next,
            };

            let written = self
                .devices
                .put_if_unchanged_recording(device_id, &entry.after, &revision, &entry)
                .await
                .map_err(|source| persistence_failure(device_id, source))?;

            if !written {
                CONFLICTS_TOTAL.inc();
                if attempt >= self.retry.max_attempts {
                    warn!(device_id = %device_id, attempts = attempt, "Giving up on conflicting command");
                    return Err(Error::Conflict {
                        device_id: device_id.to_string(),
                        attempts: attempt,
                    });
                }

                let wait = self.retry.backoff(attempt);
                debug!(
                    device_id = %device_id,
                    "Device changed concurrently (attempt {}/{}), retrying in {:?}",
                    attempt, self.retry.max_attempts, wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            let status = entry.command.outcome.status;
            COMMANDS_TOTAL.with_label_values(&[status.as_str()]).inc();
            COMMAND_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
            info!(
                device_id = %device_id,
                command = %entry.command.name,
                outcome = status.as_str(),
                attempts = attempt,
                "Command recorded"
            );

            return Ok(entry);
        }
    }

    pub async fn get_history(&self, device_id: &str, limit: usize, offset: usize) -> Result<Vec<CommandHistoryEntry>> {
        self.ensure_exists(device_id).await?;
        self.history
            .list(device_id, limit, offset)
            .await
            .map_err(store_failure)
    }

    /// A page of history together with the total it was cut from.
    ///
    /// The total is read first and the page is clamped to it, so entries
    /// appended in between never show up beyond `total`.
    pub async fn history_page(
        &self,
        device_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<CommandHistoryEntry>, usize)> {
        self.ensure_exists(device_id).await?;
        let total = self.history.count(device_id).await.map_err(store_failure)?;
        let limit = limit.min(total.saturating_sub(offset));
        let data = self
            .history
            .list(device_id, limit, offset)
            .await
            .map_err(store_failure)?;
        Ok((data, total))
    }

    /// Total number of recorded commands for a seeded device
    pub async fn count_history(&self, device_id: &str) -> Result<usize> {
        self.ensure_exists(device_id).await?;
        self.history.count(device_id).await.map_err(store_failure)
    }

    async fn ensure_exists(&self, device_id: &str) -> Result<()> {
        self.get_device(device_id).await.map(|_| ())
    }
}

fn read_failure(device_id: &str, err: StoreError) -> Error {
    match err {
        StoreError::NotFound(_) => Error::DeviceNotFound(device_id.to_string()),
        other => store_failure(other),
    }
}

fn store_failure(err: StoreError) -> Error {
    STORE_FAILURES_TOTAL.inc();
    error!("Store failure: {}", err);
    Error::Store(err)
}

fn persistence_failure(device_id: &str, source: StoreError) -> Error {
    STORE_FAILURES_TOTAL.inc();
    error!(device_id = %device_id, "Command not reliably recorded: {}", source);
    Error::Persistence {
        device_id: device_id.to_string(),
        source,
    }
}
