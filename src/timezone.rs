use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Placeholder emitted in place of a stored timestamp that cannot be parsed.
pub const TIMESTAMP_SENTINEL: &str = "invalid-timestamp";

const DEFAULT_OFFSET: FixedOffset = match FixedOffset::west_opt(6 * 3600) {
    Some(offset) => offset,
    None => panic!("UTC-06:00 is a valid offset"),
};

/// Naive layouts accepted for legacy text timestamps. These carry no offset
/// and are read as wall time in the reference zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// The single time-zone policy of the service.
///
/// Instants are persisted as absolute `TIMESTAMPTZ` values so ordering always
/// follows the true instant. Everything that needs a wall clock (the
/// generator's hour of day, API output, legacy text parsing) goes through the
/// fixed reference offset held here. The default is UTC-06:00, the zone
/// devices in the field have always reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonePolicy {
    offset: FixedOffset,
}

impl ZonePolicy {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build a policy from an offset in minutes east of UTC.
    /// Returns `None` if the offset is outside ±24 h.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current instant expressed in the reference zone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.localize(Utc::now())
    }

    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Parse a timestamp that was stored as text.
    ///
    /// RFC 3339 strings keep their own offset and are converted; naive
    /// strings are taken as reference-zone wall time.
    pub fn parse_legacy(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&self.offset));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
    }
}

impl Default for ZonePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn cst() -> ZonePolicy {
        ZonePolicy::from_offset_minutes(-360).unwrap()
    }

    #[test]
    fn default_is_utc_minus_six() {
        assert_eq!(ZonePolicy::default(), cst());
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        assert!(ZonePolicy::from_offset_minutes(25 * 60).is_none());
        assert!(ZonePolicy::from_offset_minutes(i32::MAX).is_none());
    }

    #[test]
    fn localize_keeps_instant_and_shifts_wall_clock() {
        let utc = Utc.with_ymd_and_hms(2025, 3, 1, 18, 30, 0).unwrap();
        let local = cst().localize(utc);
        assert_eq!(local.hour(), 12);
        assert_eq!(local.with_timezone(&Utc), utc);
        assert_eq!(local.to_rfc3339(), "2025-03-01T12:30:00-06:00");
    }

    #[test]
    fn parse_rfc3339_converts_to_reference_zone() {
        let dt = cst().parse_legacy("2025-03-01T18:30:00Z").unwrap();
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.offset().local_minus_utc(), -6 * 3600);
    }

    #[test]
    fn parse_naive_is_reference_wall_time() {
        let dt = cst().parse_legacy("2025-03-01T12:30:00.250").unwrap();
        assert_eq!((dt.day(), dt.hour(), dt.minute()), (1, 12, 30));
        assert_eq!(
            dt.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2025, 3, 1, 18, 30, 0).unwrap() + chrono::Duration::milliseconds(250)
        );

        assert!(cst().parse_legacy("2025-03-01 12:30:00").is_some());
        assert!(cst().parse_legacy(" 2025-03-01 12:30 ").is_some());
    }

    #[test]
    fn parse_garbage_returns_none() {
        assert!(cst().parse_legacy("yesterday at noon").is_none());
        assert!(cst().parse_legacy("").is_none());
        assert!(cst().parse_legacy("2025-13-45T99:00:00").is_none());
    }
}
