use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use taskbot_core::session::{SessionError, SessionKey, SessionStore};

use crate::DbPool;

/// Session entries persisted in the `session_entry` table. Expired rows are
/// invisible to reads and removed by [`SqlSessionStore::purge_expired`].
#[derive(Clone)]
pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn purge_expired(&self) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM session_entry WHERE expires_at_ms <= ?")
            .bind(now_ms())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn expiry_ms(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms().saturating_add(ttl_ms)
}

fn backend(error: sqlx::Error) -> SessionError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            SessionError::Unavailable(error.to_string())
        }
        other => SessionError::Backend(other.to_string()),
    }
}

#[async_trait]
impl SessionStore for SqlSessionStore {
    async fn set(&self, key: &SessionKey, value: &str, ttl: Duration) -> Result<(), SessionError> {
        sqlx::query(
            "INSERT INTO session_entry (key, value, expires_at_ms) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 expires_at_ms = excluded.expires_at_ms",
        )
        .bind(key.to_string())
        .bind(value)
        .bind(expiry_ms(ttl))
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<String>, SessionError> {
        sqlx::query_scalar("SELECT value FROM session_entry WHERE key = ? AND expires_at_ms > ?")
            .bind(key.to_string())
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM session_entry WHERE key = ?")
            .bind(key.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use taskbot_core::domain::UserId;
    use taskbot_core::flows::DialogEvent;
    use taskbot_core::session::{DialogSessions, SessionKey, SessionStore, DEFAULT_SESSION_TTL};

    use super::SqlSessionStore;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;

    async fn store() -> SqlSessionStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlSessionStore::new(pool)
    }

    #[tokio::test]
    async fn absent_and_empty_values_are_distinct() {
        let store = store().await;
        let key = SessionKey::PendingLogin(UserId(4));

        assert_eq!(store.get(&key).await.expect("get"), None);
        store.set(&key, "", DEFAULT_SESSION_TTL).await.expect("set");
        assert_eq!(store.get(&key).await.expect("get"), Some(String::new()));
    }

    #[tokio::test]
    async fn set_overwrites_and_delete_removes() {
        let store = store().await;
        let key = SessionKey::Cursor(UserId(4));

        store.set(&key, "/login", DEFAULT_SESSION_TTL).await.expect("set");
        store.set(&key, "/password", DEFAULT_SESSION_TTL).await.expect("overwrite");
        assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("/password"));

        store.delete(&key).await.expect("delete");
        assert_eq!(store.get(&key).await.expect("get"), None);
    }

    #[tokio::test]
    async fn expired_entries_are_hidden_and_purged() {
        let store = store().await;
        let key = SessionKey::PendingTaskTarget(UserId(4));

        store.set(&key, "12", Duration::ZERO).await.expect("set");
        assert_eq!(store.get(&key).await.expect("get"), None);
        assert_eq!(store.purge_expired().await.expect("purge"), 1);
    }

    #[tokio::test]
    async fn dialog_sessions_run_on_the_sql_store() {
        let sessions = DialogSessions::new(Arc::new(store().await), DEFAULT_SESSION_TTL);
        sessions.advance(UserId(8), DialogEvent::TaskCreationStarted).await.expect("advance");
        assert_eq!(
            sessions.raw_cursor(UserId(8)).await.expect("cursor").as_deref(),
            Some("/task_assignee")
        );
    }
}
