use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row, postgres::PgPoolOptions};

use super::{SessionData, SessionError, SessionKey, SessionStore};

/// Sessions kept in Postgres so they survive restarts and can be shared between instances.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: Pool<Postgres>,
}

impl PgSessionStore {
    /// Connects and makes sure the session table exists.
    pub async fn connect(database_url: &str) -> Result<Self, SessionError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        let mut transaction = pool.begin().await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS bff_sessions(
            session_hash BYTEA PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        );",
        )
        .execute(&mut *transaction)
        .await?;
        transaction.commit().await?;

        tracing::info!("Session table ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, key: &SessionKey) -> Result<Option<SessionData>, SessionError> {
        let row = sqlx::query("SELECT data FROM bff_sessions WHERE session_hash = $1;")
            .bind(key.as_bytes())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let data: String = row.try_get("data")?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn set(&self, key: &SessionKey, data: SessionData) -> Result<(), SessionError> {
        let data = serde_json::to_string(&data)?;
        sqlx::query(
            "INSERT INTO bff_sessions (session_hash, data, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (session_hash) DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at;",
        )
        .bind(key.as_bytes())
        .bind(data)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self, key: &SessionKey) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM bff_sessions WHERE session_hash = $1;")
            .bind(key.as_bytes())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
