//! Bridge events — the push-channel records behind the SSE stream.
//!
//! Events are produced when devices are detected, the connection state
//! changes, and workouts start, end, or abort.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, WorkoutId};
use crate::time::Timestamp;

/// An immutable record of something that happened in the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub id: EventId,
    pub event_type: EventType,
    pub workout_id: Option<WorkoutId>,
    pub timestamp: Timestamp,
    pub data: serde_json::Value,
}

/// The kind of event that occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DeviceDetected,
    ConnectionChanged,
    WorkoutStarted,
    WorkoutEnded,
    WorkoutAborted,
}

impl BridgeEvent {
    /// Create a new event with the current timestamp.
    #[must_use]
    pub fn new(
        event_type: EventType,
        workout_id: Option<WorkoutId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            workout_id,
            timestamp: crate::time::now(),
            data,
        }
    }
}

impl EventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceDetected => "device_detected",
            Self::ConnectionChanged => "connection_changed",
            Self::WorkoutStarted => "workout_started",
            Self::WorkoutEnded => "workout_ended",
            Self::WorkoutAborted => "workout_aborted",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
