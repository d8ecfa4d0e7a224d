//! Session management core module.
//!
//! This module decides which log segment receives each record of a session
//! and when a session moves on to a new segment.

/// Rotation boundary computation and its settings.
pub mod cutoff;
/// Rotation engine: routing, marker split and segment writes.
pub mod rotation;
/// Deterministic segment names.
pub mod segment_naming;
/// Optional per-session mutual exclusion.
pub mod session_locks;

pub use cutoff::{logical_day, rotation_cutoff, RotationSettings};
pub use rotation::{find_split_index, split_at_marker, RotationEngine, SegmentWrite, WriteReport};
pub use segment_naming::{fresh_segment_name, segment_name};
pub use session_locks::SessionLocks;
