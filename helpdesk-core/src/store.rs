//! Session and message persistence.
//!
//! Every write that depends on a session row runs as a guarded transaction:
//! check that the session exists, then insert the dependent row. Writes are
//! serialized through a store-wide gate; reads go straight to the pool so
//! WAL readers never wait on a writer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;
use crate::models::{Message, Role, Session, SessionSummary};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Constraint violated: {0}")]
    Constraint(String),
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        Ok(Self::new(crate::db::create_pool(config).await?))
    }

    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(crate::db::create_in_memory_pool().await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<String, StoreError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    /// Insert the session if absent. Returns `true` when a row was created;
    /// an existing session is left untouched, `created_at` included.
    pub async fn create_session(&self, session_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        if session_exists(&mut tx, session_id).await? {
            tx.commit().await?;
            return Ok(false);
        }

        let now = Utc::now();
        sqlx::query("INSERT INTO sessions (id, created_at, updated_at) VALUES (?1, ?2, ?3)")
            .bind(session_id)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(session_id, "Created session");
        Ok(true)
    }

    /// Refresh `updated_at`. Returns the affected row count (0 for an unknown id).
    pub async fn update_session(&self, session_id: &str) -> Result<u64, StoreError> {
        let _guard = self.write_gate.lock().await;
        let mut conn = self.pool.acquire().await?;
        touch_session(&mut conn, session_id).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, created_at, updated_at FROM sessions WHERE id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = sqlx::query_as::<_, SessionSummary>(
            r#"
            SELECT
                s.id,
                s.created_at,
                s.updated_at AS last_updated,
                (SELECT m.content FROM messages m
                 WHERE m.session_id = s.id
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT 1) AS preview
            FROM sessions s
            ORDER BY s.updated_at DESC, s.rowid DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    /// Append one message. Fails with [`StoreError::Constraint`] when the
    /// session does not exist or the content is empty. Returns the new id.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        tokens_used: u32,
    ) -> Result<i64, StoreError> {
        let _guard = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        ensure_session(&mut tx, session_id).await?;
        let id = insert_message(&mut tx, session_id, role, content, tokens_used).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Persist a completed turn: user message, assistant reply, then the
    /// session touch. All three land in one transaction or none do.
    pub async fn record_exchange(
        &self,
        session_id: &str,
        user_content: &str,
        reply: &str,
        tokens_used: u32,
    ) -> Result<(i64, i64), StoreError> {
        let _guard = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await?;

        ensure_session(&mut tx, session_id).await?;
        let user_id = insert_message(&mut tx, session_id, Role::User, user_content, 0).await?;
        let assistant_id =
            insert_message(&mut tx, session_id, Role::Assistant, reply, tokens_used).await?;
        touch_session(&mut tx, session_id).await?;

        tx.commit().await?;
        Ok((user_id, assistant_id))
    }

    /// Full history, oldest first.
    pub async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, session_id, role, content, tokens_used, created_at
            FROM messages
            WHERE session_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Up to `limit` most recent messages, returned oldest first.
    pub async fn get_recent_messages(
        &self,
        session_id: &str,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let mut messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, session_id, role, content, tokens_used, created_at
            FROM messages
            WHERE session_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        // Query returns newest first
        messages.reverse();
        Ok(messages)
    }
}

async fn session_exists(conn: &mut SqliteConnection, session_id: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sessions WHERE id = ?1")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

async fn ensure_session(conn: &mut SqliteConnection, session_id: &str) -> Result<(), StoreError> {
    if session_exists(conn, session_id).await? {
        Ok(())
    } else {
        Err(StoreError::Constraint(format!(
            "session '{}' does not exist",
            session_id
        )))
    }
}

async fn insert_message(
    conn: &mut SqliteConnection,
    session_id: &str,
    role: Role,
    content: &str,
    tokens_used: u32,
) -> Result<i64, StoreError> {
    if content.is_empty() {
        return Err(StoreError::Constraint(
            "message content must not be empty".to_string(),
        ));
    }

    // Clamp to the latest timestamp in the session so created_at never runs
    // backwards relative to insertion order, even if the wall clock does.
    let latest: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT MAX(created_at) FROM messages WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(&mut *conn)
            .await?;
    let created_at = match latest {
        Some(latest) => latest.max(Utc::now()),
        None => Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO messages (session_id, role, content, tokens_used, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(session_id)
    .bind(role)
    .bind(content)
    .bind(i64::from(tokens_used))
    .bind(created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn touch_session(conn: &mut SqliteConnection, session_id: &str) -> Result<u64, StoreError> {
    let result = sqlx::query("UPDATE sessions SET updated_at = ?1 WHERE id = ?2")
        .bind(Utc::now())
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn store() -> Store {
        Store::connect_in_memory().await.expect("in-memory store")
    }

    #[tokio::test]
    async fn test_create_session_twice_keeps_one_row_and_created_at() {
        let store = store().await;

        assert!(store.create_session("s1").await.unwrap());
        let first = store.get_session("s1").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!store.create_session("s1").await.unwrap());
        let second = store.get_session("s1").await.unwrap().unwrap();

        assert_eq!(first.created_at, second.created_at);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE id = 's1'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_get_session_unknown_is_none() {
        let store = store().await;
        assert!(store.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_session_unknown_affects_zero_rows() {
        let store = store().await;
        assert_eq!(store.update_session("ghost").await.unwrap(), 0);
        assert!(store.get_session("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_session_moves_updated_at_forward() {
        let store = store().await;
        store.create_session("s1").await.unwrap();
        let before = store.get_session("s1").await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.update_session("s1").await.unwrap(), 1);
        let after = store.get_session("s1").await.unwrap().unwrap();

        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_add_message_without_session_is_constraint_error() {
        let store = store().await;
        let err = store
            .add_message("nope", Role::User, "hello", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "got {:?}", err);
        assert!(store.get_messages("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_message_rejects_empty_content() {
        let store = store().await;
        store.create_session("s1").await.unwrap();
        let err = store.add_message("s1", Role::User, "", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_messages_come_back_in_call_order() {
        let store = store().await;
        store.create_session("s1").await.unwrap();

        let contents: Vec<String> = (0..7).map(|i| format!("message {}", i)).collect();
        for (i, content) in contents.iter().enumerate() {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.add_message("s1", role, content, i as u32).await.unwrap();
        }

        let all = store.get_messages("s1").await.unwrap();
        let got: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(got, contents.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(all.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let recent = store.get_recent_messages("s1", 3).await.unwrap();
        let got: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(got, vec!["message 4", "message 5", "message 6"]);
        assert_eq!(recent, all[4..].to_vec());
    }

    #[tokio::test]
    async fn test_recent_messages_with_fewer_than_limit_returns_all() {
        let store = store().await;
        store.create_session("s1").await.unwrap();
        store.add_message("s1", Role::User, "only one", 0).await.unwrap();

        let recent = store.get_recent_messages("s1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "only one");
        assert_eq!(recent[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_messages_are_scoped_to_their_session() {
        let store = store().await;
        store.create_session("a").await.unwrap();
        store.create_session("b").await.unwrap();
        store.add_message("a", Role::User, "for a", 0).await.unwrap();
        store.add_message("b", Role::User, "for b", 0).await.unwrap();

        let a = store.get_messages("a").await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].session_id, "a");
        assert_eq!(a[0].content, "for a");
    }

    #[tokio::test]
    async fn test_list_sessions_orders_by_updated_at_desc_with_preview() {
        let store = store().await;
        store.create_session("s1").await.unwrap();
        store.add_message("s1", Role::User, "first question", 0).await.unwrap();
        store
            .add_message("s1", Role::Assistant, "first answer", 12)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.create_session("s2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.update_session("s2").await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
        assert_eq!(sessions[0].preview, None);
        assert_eq!(sessions[1].preview.as_deref(), Some("first answer"));
    }

    #[tokio::test]
    async fn test_record_exchange_writes_user_then_assistant_and_touches() {
        let store = store().await;
        store.create_session("s1").await.unwrap();
        let before = store.get_session("s1").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let (user_id, assistant_id) = store
            .record_exchange("s1", "What are your hours?", "9 to 5.", 77)
            .await
            .unwrap();
        assert!(user_id < assistant_id);

        let messages = store.get_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].tokens_used, 0);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].tokens_used, 77);

        let after = store.get_session("s1").await.unwrap().unwrap();
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_record_exchange_is_all_or_nothing() {
        let store = store().await;
        store.create_session("s1").await.unwrap();

        // Empty reply fails after the user insert; the transaction rolls back.
        let err = store.record_exchange("s1", "hello", "", 5).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(store.get_messages("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("chat.db").display()),
            max_connections: 2,
        };

        {
            let store = Store::connect(&config).await.unwrap();
            store.create_session("durable").await.unwrap();
            store
                .add_message("durable", Role::User, "still here?", 0)
                .await
                .unwrap();
            store.pool().close().await;
        }

        let reopened = Store::connect(&config).await.unwrap();
        let messages = reopened.get_messages("durable").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "still here?");
    }

    #[tokio::test]
    async fn test_concurrent_writers_on_one_session_keep_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("chat.db").display()),
            max_connections: 4,
        };
        let store = Store::connect(&config).await.unwrap();
        store.create_session("busy").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_message("busy", Role::User, &format!("m{}", i), 0)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let messages = store.get_messages("busy").await.unwrap();
        assert_eq!(messages.len(), 8);
        assert!(messages.windows(2).all(|w| w[0].id < w[1].id));
    }
}
