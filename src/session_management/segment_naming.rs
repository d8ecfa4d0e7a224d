use chrono::{DateTime, Utc};

use super::cutoff::{logical_day, RotationSettings};

/// Extension shared by every segment name.
pub const SEGMENT_EXTENSION: &str = "tsv";

/// Lower-cases `session_id` and replaces every character outside `[a-z0-9_-]` with `_`.
///
/// Not injective: `A.B`, `a b` and `a_b` all map to `a_b` and therefore share
/// segments. Callers needing distinct logs must use ids that differ after
/// this mapping.
fn session_key(session_id: &str) -> String {
    session_id
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derives the segment name for `session_id` started at `timestamp`.
///
/// Format: `<YYYY-MM-DD>_<session>.tsv`. The date is the logical day of
/// `timestamp` under `settings` (see [`logical_day`]), so two instants get
/// the same name exactly when neither is stale relative to the other.
/// `<session>` is the sanitized id described on `session_key`; distinct ids
/// can collide after sanitizing. Names sort by day.
pub fn segment_name(
    timestamp: DateTime<Utc>,
    session_id: &str,
    settings: &RotationSettings,
) -> String {
    format!(
        "{}_{}.{}",
        logical_day(timestamp, settings).format("%Y-%m-%d"),
        session_key(session_id),
        SEGMENT_EXTENSION
    )
}

/// Name for a segment started at `timestamp` that must differ from `taken`.
///
/// Returns [`segment_name`] unless it equals `taken`; then a
/// `.<HHMMSS>` wall-clock suffix is inserted before the extension. The
/// sanitized session key never contains `.`, so suffixed names cannot
/// clash with plain ones.
pub fn fresh_segment_name(
    timestamp: DateTime<Utc>,
    session_id: &str,
    settings: &RotationSettings,
    taken: &str,
) -> String {
    let name = segment_name(timestamp, session_id, settings);
    if name != taken {
        return name;
    }
    format!(
        "{}_{}.{}.{}",
        logical_day(timestamp, settings).format("%Y-%m-%d"),
        session_key(session_id),
        timestamp.format("%H%M%S"),
        SEGMENT_EXTENSION
    )
}
