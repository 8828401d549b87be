use std::{cmp::Ordering, fmt, sync::Arc};

use chrono::{DateTime, FixedOffset};
use tracing::warn;
use uuid::Uuid;

use crate::{
    db::{
        models::{ReadingRow, StoredTimestamp},
        ReadingStore, StoreError,
    },
    timezone::{ZonePolicy, TIMESTAMP_SENTINEL},
};

/// A reading's timestamp after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTimestamp {
    At(DateTime<FixedOffset>),
    /// The stored value could not be read as a timestamp.
    Unparseable,
}

impl ViewTimestamp {
    pub fn instant(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            ViewTimestamp::At(at) => Some(at),
            ViewTimestamp::Unparseable => None,
        }
    }
}

impl fmt::Display for ViewTimestamp {
    /// RFC 3339 in the reference zone, or the sentinel.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewTimestamp::At(at) => f.write_str(&at.to_rfc3339()),
            ViewTimestamp::Unparseable => f.write_str(TIMESTAMP_SENTINEL),
        }
    }
}

/// A stored reading in the single shape served to every consumer,
/// regardless of whether a device or the simulator produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingView {
    pub id: Uuid,
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub light: Option<i64>,
    pub motion: Option<bool>,
    pub timestamp: ViewTimestamp,
}

/// Read side: the most recent readings, newest first.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn ReadingStore>,
    zone: ZonePolicy,
}

impl QueryService {
    pub fn new(store: Arc<dyn ReadingStore>, zone: ZonePolicy) -> Self {
        Self { store, zone }
    }

    /// At most `limit` readings ordered by timestamp descending. Readings
    /// whose stored timestamp cannot be parsed are kept, marked
    /// [`ViewTimestamp::Unparseable`], and placed after all others.
    ///
    /// The page is chosen by the store on native timestamps alone. Rows
    /// that only carry a text timestamp fill whatever room the native rows
    /// leave, so a text row is never returned ahead of `limit` native rows
    /// even when it parses to a later instant.
    pub async fn recent_readings(&self, limit: u32) -> Result<Vec<ReadingView>, StoreError> {
        let rows = self.store.recent(limit).await?;

        let mut views: Vec<ReadingView> = rows.into_iter().map(|r| self.normalize(r)).collect();
        views.truncate(limit as usize);
        // Stable, so equal and unparseable timestamps keep the store's order.
        views.sort_by(|a, b| newest_first(&a.timestamp, &b.timestamp));
        Ok(views)
    }

    fn normalize(&self, row: ReadingRow) -> ReadingView {
        let timestamp = match row.stored_timestamp() {
            StoredTimestamp::Native(at) => ViewTimestamp::At(self.zone.localize(at)),
            StoredTimestamp::Text(raw) => match self.zone.parse_legacy(&raw) {
                Some(at) => ViewTimestamp::At(at),
                None => {
                    warn!(id = %row.id, raw = %raw, "Unparseable stored timestamp");
                    ViewTimestamp::Unparseable
                }
            },
            StoredTimestamp::Missing => {
                warn!(id = %row.id, "Stored reading has no timestamp");
                ViewTimestamp::Unparseable
            }
        };

        ReadingView {
            id: row.id,
            device_id: row.device_id,
            temperature: row.temperature,
            humidity: row.humidity,
            light: row.light,
            motion: row.motion,
            timestamp,
        }
    }
}

fn newest_first(a: &ViewTimestamp, b: &ViewTimestamp) -> Ordering {
    match (a.instant(), b.instant()) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::{db::memory::MemoryStore, readings::Reading};

    fn reading(minutes: i64) -> Reading {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        Reading {
            id: Uuid::new_v4(),
            device_id: "dev1".into(),
            temperature: 21.0,
            humidity: 50.0,
            light: Some(100),
            motion: Some(false),
            timestamp: ZonePolicy::default().localize(base + Duration::minutes(minutes)),
        }
    }

    fn legacy_row(raw: Option<&str>) -> ReadingRow {
        ReadingRow {
            id: Uuid::new_v4(),
            device_id: "legacy".into(),
            temperature: 18.0,
            humidity: 4.0,
            light: None,
            motion: None,
            recorded_at: None,
            recorded_at_text: raw.map(str::to_owned),
        }
    }

    async fn service_with(readings: &[Reading]) -> (Arc<MemoryStore>, QueryService) {
        let store = Arc::new(MemoryStore::new());
        for r in readings {
            store.insert(r).await.unwrap();
        }
        (store.clone(), QueryService::new(store, ZonePolicy::default()))
    }

    #[tokio::test]
    async fn returns_newest_first_and_respects_limit() {
        let (_, svc) = service_with(&[reading(0), reading(30), reading(10), reading(20)]).await;

        let views = svc.recent_readings(3).await.unwrap();
        assert_eq!(views.len(), 3);
        let times: Vec<_> = views.iter().map(|v| *v.timestamp.instant().unwrap()).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(times[0].with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn timestamps_are_presented_in_reference_zone() {
        let (_, svc) = service_with(&[reading(0)]).await;
        let views = svc.recent_readings(50).await.unwrap();
        assert_eq!(views[0].timestamp.to_string(), "2025-06-01T06:00:00-06:00");
    }

    #[tokio::test]
    async fn legacy_text_timestamps_are_normalized() {
        let (store, svc) = service_with(&[reading(0)]).await;
        store.push_row(legacy_row(Some("2024-01-01 07:00:00")));
        store.push_row(legacy_row(Some("2024-01-02T07:00:00Z")));

        let views = svc.recent_readings(10).await.unwrap();
        let rendered: Vec<_> = views.iter().map(|v| v.timestamp.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "2025-06-01T06:00:00-06:00",
                "2024-01-02T01:00:00-06:00",
                "2024-01-01T07:00:00-06:00",
            ]
        );
    }

    #[tokio::test]
    async fn unparseable_timestamp_gets_sentinel_not_dropped() {
        let (store, svc) = service_with(&[reading(0)]).await;
        store.push_row(legacy_row(Some("not a date")));
        store.push_row(legacy_row(None));

        let views = svc.recent_readings(10).await.unwrap();
        assert_eq!(views.len(), 3);
        assert!(views[0].timestamp.instant().is_some());
        assert_eq!(views[1].timestamp, ViewTimestamp::Unparseable);
        assert_eq!(views[2].timestamp.to_string(), TIMESTAMP_SENTINEL);
    }

    #[tokio::test]
    async fn text_rows_only_fill_room_left_by_native_rows() {
        let (store, svc) = service_with(&[reading(0), reading(10)]).await;
        store.push_row(legacy_row(Some("2030-01-01T00:00:00Z")));

        let views = svc.recent_readings(2).await.unwrap();
        assert!(views.iter().all(|v| v.device_id == "dev1"));

        // Once on the page it is ordered by its parsed instant.
        let views = svc.recent_readings(3).await.unwrap();
        assert_eq!(views[0].device_id, "legacy");
    }

    #[tokio::test]
    async fn empty_store_returns_empty() {
        let (_, svc) = service_with(&[]).await;
        assert!(svc.recent_readings(50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let (store, svc) = service_with(&[reading(0)]).await;
        store.fail_next(StoreError::Fatal {
            op: "recent",
            message: "relation does not exist".into(),
        });
        assert!(matches!(
            svc.recent_readings(5).await,
            Err(StoreError::Fatal { op: "recent", .. })
        ));
    }
}
