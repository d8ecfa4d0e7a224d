use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Routing state of one session: the segment currently receiving its
/// writes and when that segment was started.
///
/// Always written as a whole; backends replace the stored value and never
/// merge individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub segment_name: String,
    pub segment_created: DateTime<Utc>,
}

impl SessionState {
    pub fn new<S: Into<String>, N: Into<String>>(
        session_id: S,
        segment_name: N,
        segment_created: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            segment_name: segment_name.into(),
            segment_created,
        }
    }
}
