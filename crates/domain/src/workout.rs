//! Workout — a recording session bound to one device.

use serde::{Deserialize, Serialize};

use crate::device::EquipmentKind;
use crate::error::{FitBridgeError, ValidationError};
use crate::id::WorkoutId;
use crate::summary::WorkoutSummary;
use crate::time::Timestamp;

/// Lifecycle state of a workout.
///
/// `Ended` and `Aborted` are terminal: no further samples may attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutState {
    Active,
    Ended,
    Aborted,
}

impl WorkoutState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Aborted => "aborted",
        }
    }

    /// Whether the workout can still accept samples.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Aborted)
    }
}

impl std::fmt::Display for WorkoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkoutState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "ended" => Ok(Self::Ended),
            "aborted" => Ok(Self::Aborted),
            other => Err(ValidationError::UnknownState(other.to_string())),
        }
    }
}

/// A recording session with a snapshot of the device it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: WorkoutId,
    pub device_address: String,
    pub device_name: String,
    pub kind: EquipmentKind,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub state: WorkoutState,
}

impl Workout {
    /// Create a builder for constructing a [`Workout`].
    #[must_use]
    pub fn builder() -> WorkoutBuilder {
        WorkoutBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::Validation`] when the device address is
    /// empty or the end time precedes the start time.
    pub fn validate(&self) -> Result<(), FitBridgeError> {
        if self.device_address.is_empty() {
            return Err(ValidationError::EmptyAddress.into());
        }
        if let Some(ended_at) = self.ended_at {
            if ended_at < self.started_at {
                return Err(ValidationError::EndBeforeStart.into());
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Workout`].
#[derive(Debug, Default)]
pub struct WorkoutBuilder {
    id: Option<WorkoutId>,
    device_address: Option<String>,
    device_name: Option<String>,
    kind: Option<EquipmentKind>,
    started_at: Option<Timestamp>,
}

impl WorkoutBuilder {
    #[must_use]
    pub fn id(mut self, id: WorkoutId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn device_address(mut self, address: impl Into<String>) -> Self {
        self.device_address = Some(address.into());
        self
    }

    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: EquipmentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn started_at(mut self, started_at: Timestamp) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Consume the builder, validate, and return an active [`Workout`].
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::Validation`] if the device address is
    /// missing or empty.
    pub fn build(self) -> Result<Workout, FitBridgeError> {
        let workout = Workout {
            id: self.id.unwrap_or_default(),
            device_address: self.device_address.unwrap_or_default(),
            device_name: self.device_name.unwrap_or_default(),
            kind: self.kind.unwrap_or(EquipmentKind::Unknown),
            started_at: self.started_at.unwrap_or_else(crate::time::now),
            ended_at: None,
            state: WorkoutState::Active,
        };
        workout.validate()?;
        Ok(workout)
    }
}

/// A workout together with its persisted summary, as returned by reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub workout: Workout,
    pub summary: Option<WorkoutSummary>,
}
