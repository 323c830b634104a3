//! Key-value backend: plain values plus append-only ordered lists.

pub mod memory;
pub mod postgres;

use crate::errors::{StoreError, StoreResult};
use async_trait::async_trait;
use std::future::Future;
use std::ops::Range;
use std::time::Duration;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Writes only if `key` is absent. Returns whether the write happened.
    async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool>;

    /// Writes only if the current value of `key` equals `expected`.
    async fn set_if(&self, key: &str, expected: &str, value: &str) -> StoreResult<bool>;

    async fn rpush(&self, key: &str, value: &str) -> StoreResult<()>;

    /// `set_if` and `rpush` as one atomic step: the item is appended only
    /// when the conditional write succeeds, and no other write to `key`
    /// can land between the two.
    async fn set_if_and_rpush(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        list_key: &str,
        item: &str,
    ) -> StoreResult<bool>;

    /// Inclusive slice of a list. Negative indexes count from the end.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>>;

    async fn llen(&self, key: &str) -> StoreResult<usize>;

    /// Value keys starting with `prefix`. List keys are not included.
    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Resolves `start..=stop` against a list of `len` items.
pub fn normalize_range(len: usize, start: i64, stop: i64) -> Option<Range<usize>> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start >= len || start > stop {
        return None;
    }

    Some(start as usize..stop as usize + 1)
}

/// Runs a store call under `limit`, surfacing expiry as [`StoreError::Timeout`].
pub async fn timed<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
