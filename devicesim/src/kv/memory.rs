use super::{normalize_range, KvStore};
use crate::errors::StoreResult;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local backend for development and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool> {
        let mut values = self.values.write().await;
        if values.contains_key(key) {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn set_if(&self, key: &str, expected: &str, value: &str) -> StoreResult<bool> {
        let mut values = self.values.write().await;
        match values.get_mut(key) {
            Some(current) if current.as_str() == expected => {
                *current = value.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rpush(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lists
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn set_if_and_rpush(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        list_key: &str,
        item: &str,
    ) -> StoreResult<bool> {
        // Lock order: values, then lists.
        let mut values = self.values.write().await;
        let mut lists = self.lists.write().await;
        match values.get_mut(key) {
            Some(current) if current.as_str() == expected => {
                *current = value.to_string();
                lists
                    .entry(list_key.to_string())
                    .or_default()
                    .push(item.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let lists = self.lists.read().await;
        let Some(items) = lists.get(key) else {
            return Ok(Vec::new());
        };

        Ok(match normalize_range(items.len(), start, stop) {
            Some(range) => items[range].to_vec(),
            None => Vec::new(),
        })
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.lists.read().await.get(key).map_or(0, Vec::len))
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .values
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conditional_writes() {
        let store = MemoryStore::new();

        assert!(store.set_nx("device:a", "v1").await.unwrap());
        assert!(!store.set_nx("device:a", "other").await.unwrap());

        assert!(!store.set_if("device:a", "stale", "v2").await.unwrap());
        assert!(store.set_if("device:a", "v1", "v2").await.unwrap());
        assert_eq!(store.get("device:a").await.unwrap().as_deref(), Some("v2"));

        assert!(!store.set_if("device:missing", "v1", "v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_conditional_write_with_append() {
        let store = MemoryStore::new();
        store.set("device:a", "v1").await.unwrap();

        assert!(!store
            .set_if_and_rpush("device:a", "stale", "v2", "device:a:commands", "lost")
            .await
            .unwrap());
        assert_eq!(store.llen("device:a:commands").await.unwrap(), 0);

        assert!(store
            .set_if_and_rpush("device:a", "v1", "v2", "device:a:commands", "kept")
            .await
            .unwrap());
        assert_eq!(store.get("device:a").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(
            store.lrange("device:a:commands", 0, -1).await.unwrap(),
            vec!["kept"]
        );
    }

    #[tokio::test]
    async fn test_lists_keep_insertion_order() {
        let store = MemoryStore::new();
        for item in ["one", "two", "three"] {
            store.rpush("device:a:commands", item).await.unwrap();
        }

        assert_eq!(store.llen("device:a:commands").await.unwrap(), 3);
        assert_eq!(
            store.lrange("device:a:commands", 0, -1).await.unwrap(),
            vec!["one", "two", "three"]
        );
        assert_eq!(
            store.lrange("device:a:commands", 1, 1).await.unwrap(),
            vec!["two"]
        );
        assert!(store.lrange("device:b:commands", 0, -1).await.unwrap().is_empty());
    }

    #[test]
    fn test_keys_by_prefix() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.set("device:b", "{}").await.unwrap();
            store.set("device:a", "{}").await.unwrap();
            store.set("settings", "{}").await.unwrap();
            store.rpush("device:a:commands", "{}").await.unwrap();

            assert_eq!(store.keys("device:").await.unwrap(), vec!["device:a", "device:b"]);
        });
    }
}
