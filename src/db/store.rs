use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::models::ReadingRow;
use crate::readings::Reading;

/// Store failures, tagged by what the caller should do about them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The handle was closed; nothing will succeed for the rest of the process.
    #[error("store unavailable: connection closed")]
    Closed,
    /// Connectivity, timeout or contention. Worth trying again later.
    #[error("transient store failure during {op}: {message}")]
    Transient { op: &'static str, message: String },
    /// Anything the store will keep rejecting.
    #[error("store failure during {op}: {message}")]
    Fatal { op: &'static str, message: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }

    /// Classify a driver error raised while performing `op`.
    pub fn from_sqlx(op: &'static str, err: sqlx::Error) -> Self {
        let message = err.to_string();
        match &err {
            sqlx::Error::PoolClosed => StoreError::Closed,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut => StoreError::Transient { op, message },
            sqlx::Error::Database(db) if db.code().is_some_and(|c| is_transient_sqlstate(&c)) => {
                StoreError::Transient { op, message }
            }
            _ => StoreError::Fatal { op, message },
        }
    }
}

/// SQLSTATE classes that describe the connection or server load rather than
/// the statement: connection exceptions, transaction rollbacks (deadlock,
/// serialization), insufficient resources and operator intervention.
fn is_transient_sqlstate(code: &str) -> bool {
    ["08", "40", "53", "57P"].iter().any(|p| code.starts_with(p))
}

/// Append/query access to the flat collection of readings.
///
/// Implementations rely on the backend's atomic single-row insert for
/// ordering and uniqueness; callers hold no locks around these calls.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Durably append one reading and return its id.
    async fn insert(&self, reading: &Reading) -> Result<Uuid, StoreError>;

    /// Up to `limit` rows, newest native timestamp first. Rows that only
    /// carry a text timestamp come after every native one.
    async fn recent(&self, limit: u32) -> Result<Vec<ReadingRow>, StoreError>;

    /// Release the underlying connections. Later calls fail with
    /// [`StoreError::Closed`].
    async fn close(&self);
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<Uuid, StoreError> {
        let row = ReadingRow::from(reading);
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO readings
                (id, device_id, temperature, humidity, light, motion, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(row.id)
        .bind(&row.device_id)
        .bind(row.temperature)
        .bind(row.humidity)
        .bind(row.light)
        .bind(row.motion)
        .bind(row.recorded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("insert", e))
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ReadingRow>, StoreError> {
        sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT id, device_id, temperature, humidity, light, motion,
                   recorded_at, recorded_at_text
            FROM readings
            ORDER BY recorded_at DESC NULLS LAST, id
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx("recent", e))
    }

    async fn close(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("Database pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use sqlx::PgPool;

    use super::*;
    use crate::timezone::ZonePolicy;

    #[test]
    fn pool_closed_is_distinguishable() {
        assert_eq!(StoreError::from_sqlx("insert", sqlx::Error::PoolClosed), StoreError::Closed);
    }

    #[test]
    fn connectivity_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(StoreError::from_sqlx("insert", sqlx::Error::Io(io)).is_transient());
        assert!(StoreError::from_sqlx("recent", sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn other_errors_are_fatal() {
        let err = StoreError::from_sqlx("recent", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Fatal { op: "recent", .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn sqlstate_classification() {
        assert!(is_transient_sqlstate("08006"));
        assert!(is_transient_sqlstate("40001"));
        assert!(is_transient_sqlstate("57P01"));
        assert!(!is_transient_sqlstate("23505"));
        assert!(!is_transient_sqlstate("42P01"));
    }

    fn reading(device_id: &str, hour: u32) -> Reading {
        Reading {
            id: Uuid::new_v4(),
            device_id: device_id.to_owned(),
            temperature: 20.5,
            humidity: 40.0,
            light: Some(300),
            motion: Some(false),
            timestamp: ZonePolicy::default()
                .localize(Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn insert_then_recent_is_newest_first(pool: PgPool) {
        let store = PgReadingStore::new(pool);
        for hour in [8, 10, 9] {
            store.insert(&reading("dev1", hour)).await.unwrap();
        }

        let rows = store.recent(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].recorded_at > rows[1].recorded_at);
        assert_eq!(rows[0].recorded_at, Some(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn legacy_text_rows_sort_last(pool: PgPool) {
        sqlx::query(
            "INSERT INTO readings (id, device_id, temperature, humidity, recorded_at_text) \
             VALUES ($1, 'legacy', 19.0, 3.0, '2024-01-01T08:00:00')",
        )
        .bind(Uuid::new_v4())
        .execute(&pool)
        .await
        .unwrap();

        let store = PgReadingStore::new(pool);
        store.insert(&reading("dev1", 8)).await.unwrap();

        let rows = store.recent(10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].device_id, "dev1");
        assert_eq!(rows[1].recorded_at_text.as_deref(), Some("2024-01-01T08:00:00"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn calls_after_close_report_closed(pool: PgPool) {
        let store = PgReadingStore::new(pool);
        store.close().await;
        store.close().await;

        assert_eq!(store.insert(&reading("dev1", 8)).await, Err(StoreError::Closed));
        assert_eq!(store.recent(1).await, Err(StoreError::Closed));
    }
}
