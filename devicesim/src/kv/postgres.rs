use super::{normalize_range, KvStore};
use crate::errors::StoreResult;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL-backed store. Values live in `kv_entries`, lists in
/// `kv_list_items` ordered by their serial id.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> StoreResult<Self> {
        info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!("Database connection established");
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations completed");

        Ok(Self { pool })
    }
}

#[async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let query = r#"
            INSERT INTO kv_entries (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#;

        sqlx::query(query).bind(key).bind(value).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> StoreResult<bool> {
        let query = r#"
            INSERT INTO kv_entries (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO NOTHING
            "#;

        let result = sqlx::query(query).bind(key).bind(value).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_if(&self, key: &str, expected: &str, value: &str) -> StoreResult<bool> {
        let query = r#"
            UPDATE kv_entries SET value = $3, updated_at = now()
            WHERE key = $1 AND value = $2
            "#;

        let result = sqlx::query(query)
            .bind(key)
            .bind(expected)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn rpush(&self, key: &str, value: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO kv_list_items (key, value) VALUES ($1, $2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
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
        let mut tx = self.pool.begin().await?;

        // Row lock is held until commit.
        let updated = sqlx::query(
            r#"
            UPDATE kv_entries SET value = $3, updated_at = now()
            WHERE key = $1 AND value = $2
            "#,
        )
        .bind(key)
        .bind(expected)
        .bind(value)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO kv_list_items (key, value) VALUES ($1, $2)")
            .bind(list_key)
            .bind(item)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let len = self.llen(key).await?;
        let Some(range) = normalize_range(len, start, stop) else {
            return Ok(Vec::new());
        };

        let query = r#"
            SELECT value FROM kv_list_items
            WHERE key = $1
            ORDER BY id
            OFFSET $2 LIMIT $3
            "#;

        let values = sqlx::query_scalar::<_, String>(query)
            .bind(key)
            .bind(range.start as i64)
            .bind(range.len() as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM kv_list_items WHERE key = $1")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix));
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM kv_entries WHERE key LIKE $1 ORDER BY key")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
