//! Rotation boundary arithmetic.
//!
//! A logical day starts at `rotation_time` on the wall clock of a fixed UTC
//! offset and lasts until the same time on the next calendar day. The
//! cutoff is the start of the logical day containing `now`; it does not
//! depend on any store's clock. Segment names carry the logical day too, so
//! a segment is stale exactly when its day is older than the current one.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

/// Default logical timezone: UTC-08:00.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = -8 * 3600;
/// Default marker substring that forces a split on a stale session.
pub const DEFAULT_MARKER: &str = "reconnect";

/// Parameters of the rotation decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSettings {
    /// Offset defining the logical day
    pub utc_offset: FixedOffset,
    /// Time of day, in the logical timezone, at which segments go stale
    pub rotation_time: NaiveTime,
    /// Substring of `request_uri` that opens a new segment
    pub marker: String,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            utc_offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS)
                .unwrap_or_else(|| Utc.fix()),
            rotation_time: NaiveTime::default(),
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Logical day that `timestamp` falls in.
pub fn logical_day(timestamp: DateTime<Utc>, settings: &RotationSettings) -> NaiveDate {
    let local = timestamp.with_timezone(&settings.utc_offset).naive_local();
    let since_midnight = settings.rotation_time.signed_duration_since(NaiveTime::default());
    (local - since_midnight).date()
}

/// Instant before which an existing segment counts as stale.
///
/// Never later than `now`.
pub fn rotation_cutoff(now: DateTime<Utc>, settings: &RotationSettings) -> DateTime<Utc> {
    let boundary = logical_day(now, settings).and_time(settings.rotation_time);
    let offset = Duration::seconds(i64::from(settings.utc_offset.local_minus_utc()));
    (boundary - offset).and_utc()
}

/// True when a segment created at `segment_created` must not take new writes.
pub fn is_stale(segment_created: DateTime<Utc>, cutoff: DateTime<Utc>) -> bool {
    segment_created < cutoff
}
