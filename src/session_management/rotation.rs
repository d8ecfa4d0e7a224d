//! Session rotation and write routing.
//!
//! `RotationEngine::write` decides, for one batch of records, which segment
//! each record goes to:
//! - no session state yet: start a segment and write the whole batch there
//! - state present and fresh: append the batch to the current segment
//! - state present but stale: the records up to and including the first
//!   marker record stay on the stale segment; the records from the marker
//!   onward (marker included) go to a newly started segment. Without a
//!   marker the whole batch stays on the stale segment and no rotation
//!   happens.
//!
//! The engine keeps no state between calls and never retries. Each store
//! call can fail on its own; a failure after the stale segment was already
//! appended to is reported as `IngestError::PartialRotation`.

use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::data_capture::serializer::serialize_batch;
use crate::data_capture::types::TransactionRecord;
use crate::error_handling::types::{IngestError, StorageError};
use crate::storage::storage_trait::{SegmentStore, SessionIndex};
use crate::storage::types::SessionState;

use super::cutoff::{is_stale, rotation_cutoff, RotationSettings};
use super::segment_naming::{fresh_segment_name, segment_name};
use super::session_locks::SessionLocks;

/// Index of the first record whose `request_uri` contains `marker`.
pub fn find_split_index(records: &[TransactionRecord], marker: &str) -> Option<usize> {
    records.iter().position(|r| r.request_uri.contains(marker))
}

/// Splits `records` around the first marker record.
///
/// Returns `(before_marker, from_marker)`. The marker record ends the first
/// slice and starts the second. Without a marker the first slice is the
/// whole batch and the second is empty.
pub fn split_at_marker<'a>(
    records: &'a [TransactionRecord],
    marker: &str,
) -> (&'a [TransactionRecord], &'a [TransactionRecord]) {
    match find_split_index(records, marker) {
        Some(i) => (&records[..=i], &records[i..]),
        None => (records, &[]),
    }
}

/// Where a batch goes, before any I/O is done.
#[derive(Debug, PartialEq, Eq)]
pub enum RoutePlan<'a> {
    /// First write seen for the session.
    Start { records: &'a [TransactionRecord] },
    /// Current segment is still within the cutoff window.
    Append {
        segment_name: String,
        records: &'a [TransactionRecord],
    },
    /// Current segment is stale.
    Rotate {
        stale_segment: String,
        before_marker: &'a [TransactionRecord],
        from_marker: &'a [TransactionRecord],
    },
}

pub fn plan_route<'a>(
    existing: Option<&SessionState>,
    cutoff: DateTime<Utc>,
    records: &'a [TransactionRecord],
    marker: &str,
) -> RoutePlan<'a> {
    match existing {
        None => RoutePlan::Start { records },
        Some(state) if is_stale(state.segment_created, cutoff) => {
            let (before_marker, from_marker) = split_at_marker(records, marker);
            RoutePlan::Rotate {
                stale_segment: state.segment_name.clone(),
                before_marker,
                from_marker,
            }
        }
        Some(state) => RoutePlan::Append {
            segment_name: state.segment_name.clone(),
            records,
        },
    }
}

/// Lines appended to one segment by a write call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentWrite {
    pub segment_name: String,
    pub lines: usize,
}

/// What a successful write call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Appends in the order they were performed
    pub writes: Vec<SegmentWrite>,
    /// A new segment was started and the session index replaced
    pub started_segment: bool,
    /// Session state after the call; `None` for an empty batch
    pub session: Option<SessionState>,
}

pub struct RotationEngine {
    index: Arc<dyn SessionIndex>,
    segments: Arc<dyn SegmentStore>,
    settings: RotationSettings,
    locks: Option<SessionLocks>,
}

fn require(value: &str, what: &str) -> Result<(), IngestError> {
    if value.trim().is_empty() {
        return Err(IngestError::InvalidArgument(format!("{} is required", what)));
    }
    Ok(())
}

impl RotationEngine {
    pub fn new(
        index: Arc<dyn SessionIndex>,
        segments: Arc<dyn SegmentStore>,
        settings: RotationSettings,
    ) -> Self {
        Self {
            index,
            segments,
            settings,
            locks: None,
        }
    }

    /// Serializes concurrent writes for the same session within this process.
    pub fn with_session_locks(mut self) -> Self {
        self.locks = Some(SessionLocks::new());
        self
    }

    /// Routes and appends `records` for `session_id`, observing the current time.
    pub fn write(
        &self,
        agent_id: &str,
        session_id: &str,
        records: &[TransactionRecord],
    ) -> Result<WriteReport, IngestError> {
        self.write_at(agent_id, session_id, records, Utc::now())
    }

    /// Same as [`write`](Self::write) with an explicit observation instant.
    ///
    /// `now` drives the cutoff, the new segment name and `segment_created`.
    pub fn write_at(
        &self,
        agent_id: &str,
        session_id: &str,
        records: &[TransactionRecord],
        now: DateTime<Utc>,
    ) -> Result<WriteReport, IngestError> {
        require(agent_id, "agent_id")?;
        require(session_id, "session_id")?;

        self.index.ensure_exists().map_err(IngestError::Index)?;
        self.segments
            .ensure_container_exists()
            .map_err(IngestError::Segment)?;

        if records.is_empty() {
            debug!("[{}] empty batch from {}, nothing to route", session_id, agent_id);
            return Ok(WriteReport::default());
        }

        let Some(locks) = &self.locks else {
            return self.route(agent_id, session_id, records, now);
        };
        let handle = locks.handle(session_id);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            self.route(agent_id, session_id, records, now)
        };
        locks.release(session_id, handle);
        result
    }

    fn route(
        &self,
        agent_id: &str,
        session_id: &str,
        records: &[TransactionRecord],
        now: DateTime<Utc>,
    ) -> Result<WriteReport, IngestError> {
        let cutoff = rotation_cutoff(now, &self.settings);
        let existing = self.index.get(session_id).map_err(IngestError::Index)?;
        debug!(
            "[{}] routing {} record(s), cutoff={}, current={:?}",
            session_id,
            records.len(),
            cutoff.to_rfc3339(),
            existing.as_ref().map(|s| s.segment_name.as_str())
        );

        match plan_route(existing.as_ref(), cutoff, records, &self.settings.marker) {
            RoutePlan::Start { records } => {
                let state = self.start_segment(session_id, now, None)?;
                let lines = self
                    .append_records(&state.segment_name, agent_id, session_id, records)
                    .map_err(IngestError::Segment)?;
                Ok(WriteReport {
                    writes: vec![SegmentWrite {
                        segment_name: state.segment_name.clone(),
                        lines,
                    }],
                    started_segment: true,
                    session: Some(state),
                })
            }
            RoutePlan::Append {
                segment_name,
                records,
            } => {
                let lines = self
                    .append_records(&segment_name, agent_id, session_id, records)
                    .map_err(IngestError::Segment)?;
                Ok(WriteReport {
                    writes: vec![SegmentWrite {
                        segment_name,
                        lines,
                    }],
                    started_segment: false,
                    session: existing,
                })
            }
            RoutePlan::Rotate {
                stale_segment,
                before_marker,
                from_marker,
            } => {
                let mut writes = Vec::with_capacity(2);
                if !before_marker.is_empty() {
                    let lines = self
                        .append_records(&stale_segment, agent_id, session_id, before_marker)
                        .map_err(IngestError::Segment)?;
                    writes.push(SegmentWrite {
                        segment_name: stale_segment.clone(),
                        lines,
                    });
                }
                if from_marker.is_empty() {
                    debug!(
                        "[{}] segment {} is stale but no marker seen, deferring rotation",
                        session_id, stale_segment
                    );
                    return Ok(WriteReport {
                        writes,
                        started_segment: false,
                        session: existing,
                    });
                }

                info!(
                    "[{}] rotating away from {} ({} record(s) from marker)",
                    session_id,
                    stale_segment,
                    from_marker.len()
                );
                let stale_written = !writes.is_empty();
                let partial = |err: IngestError| {
                    if stale_written {
                        warn!(
                            "[{}] rotation incomplete, {} already appended: {}",
                            session_id, stale_segment, err
                        );
                        IngestError::PartialRotation {
                            completed_segment: stale_segment.clone(),
                            source: Box::new(err),
                        }
                    } else {
                        err
                    }
                };
                let state = self
                    .start_segment(session_id, now, Some(&stale_segment))
                    .map_err(partial)?;
                let lines = self
                    .append_records(&state.segment_name, agent_id, session_id, from_marker)
                    .map_err(|e| partial(IngestError::Segment(e)))?;
                writes.push(SegmentWrite {
                    segment_name: state.segment_name.clone(),
                    lines,
                });
                Ok(WriteReport {
                    writes,
                    started_segment: true,
                    session: Some(state),
                })
            }
        }
    }

    /// Points the session at a freshly named segment created at `now`.
    ///
    /// The new name never equals `replacing`.
    fn start_segment(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
        replacing: Option<&str>,
    ) -> Result<SessionState, IngestError> {
        let name = match replacing {
            Some(stale) => fresh_segment_name(now, session_id, &self.settings, stale),
            None => segment_name(now, session_id, &self.settings),
        };
        let state = SessionState::new(session_id, name, now);
        self.index.put(&state).map_err(IngestError::Index)?;
        info!("[{}] now writing to {}", session_id, state.segment_name);
        Ok(state)
    }

    /// Appends the serialized `records` to `segment`, creating it if absent.
    fn append_records(
        &self,
        segment: &str,
        agent_id: &str,
        session_id: &str,
        records: &[TransactionRecord],
    ) -> Result<usize, StorageError> {
        if !self.segments.exists(segment)? {
            self.segments.create(segment)?;
            info!("[{}] created segment {}", session_id, segment);
        }
        let text = serialize_batch(agent_id, session_id, records);
        self.segments.append_text(segment, &text)?;
        debug!(
            "[{}] appended {} line(s), {} byte(s) to {}",
            session_id,
            records.len(),
            text.len(),
            segment
        );
        Ok(records.len())
    }
}
