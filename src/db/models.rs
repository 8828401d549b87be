use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::readings::Reading;

/// One row of the `readings` table, exactly as stored.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ReadingRow {
    pub id: Uuid,
    pub device_id: String,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub light: Option<i64>,
    pub motion: Option<bool>,
    pub recorded_at: Option<DateTime<Utc>>,
    /// Timestamp carried over from the legacy string-typed ingestion path.
    pub recorded_at_text: Option<String>,
}

/// How a row's timestamp was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredTimestamp {
    Native(DateTime<Utc>),
    Text(String),
    Missing,
}

impl ReadingRow {
    pub fn stored_timestamp(&self) -> StoredTimestamp {
        match (&self.recorded_at, &self.recorded_at_text) {
            (Some(at), _) => StoredTimestamp::Native(*at),
            (None, Some(raw)) => StoredTimestamp::Text(raw.clone()),
            (None, None) => StoredTimestamp::Missing,
        }
    }
}

impl From<&Reading> for ReadingRow {
    fn from(r: &Reading) -> Self {
        Self {
            id: r.id,
            device_id: r.device_id.clone(),
            temperature: r.temperature,
            humidity: r.humidity,
            light: r.light,
            motion: r.motion,
            recorded_at: Some(r.timestamp.with_timezone(&Utc)),
            recorded_at_text: None,
        }
    }
}
