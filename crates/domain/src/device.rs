//! Device descriptors and connection-state vocabulary.
//!
//! A [`DeviceDescriptor`] is produced by discovery and immutable afterwards.
//! Equipment kind is inferred from the advertised name or, when present,
//! from the fitness-machine-type bits of the FTMS advertisement service data.

use serde::{Deserialize, Serialize};

use crate::error::{FitBridgeError, ValidationError};
use crate::time::Timestamp;

/// The kind of fitness machine behind a device or workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentKind {
    Bike,
    Rower,
    Unknown,
}

impl EquipmentKind {
    /// Infer the kind from a device name (token match on "bike" / "row").
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("bike") {
            Self::Bike
        } else if lower.contains("row") {
            Self::Rower
        } else {
            Self::Unknown
        }
    }

    /// Infer the kind from the fitness-machine-type bit field of the FTMS
    /// advertisement service data (bit 4 = rower, bit 5 = indoor bike).
    #[must_use]
    pub fn from_machine_type(bits: u16) -> Self {
        if bits & (1 << 5) != 0 {
            Self::Bike
        } else if bits & (1 << 4) != 0 {
            Self::Rower
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bike => "bike",
            Self::Rower => "rower",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EquipmentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bike" => Ok(Self::Bike),
            "rower" => Ok(Self::Rower),
            "unknown" => Ok(Self::Unknown),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

/// Which backend produced a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Live,
    Simulated,
}

/// A fitness machine found during discovery. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable transport address (BLE MAC or simulator constant).
    pub address: String,
    /// Human-readable name from the advertisement.
    pub name: String,
    pub kind: EquipmentKind,
    /// Signal strength at discovery time, display only.
    pub rssi: Option<i16>,
    pub origin: SourceOrigin,
}

impl DeviceDescriptor {
    /// Create a builder for constructing a [`DeviceDescriptor`].
    #[must_use]
    pub fn builder() -> DeviceDescriptorBuilder {
        DeviceDescriptorBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::Validation`] when `address` or `name` is
    /// empty.
    pub fn validate(&self) -> Result<(), FitBridgeError> {
        if self.address.is_empty() {
            return Err(ValidationError::EmptyAddress.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`DeviceDescriptor`].
#[derive(Debug, Default)]
pub struct DeviceDescriptorBuilder {
    address: Option<String>,
    name: Option<String>,
    kind: Option<EquipmentKind>,
    rssi: Option<i16>,
    origin: Option<SourceOrigin>,
}

impl DeviceDescriptorBuilder {
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: EquipmentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: SourceOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Consume the builder, validate, and return a [`DeviceDescriptor`].
    ///
    /// The kind defaults to an inference from the name when not set.
    ///
    /// # Errors
    ///
    /// Returns [`FitBridgeError::Validation`] if `address` or `name` is
    /// missing or empty.
    pub fn build(self) -> Result<DeviceDescriptor, FitBridgeError> {
        let name = self.name.unwrap_or_default();
        let kind = self.kind.unwrap_or_else(|| EquipmentKind::from_name(&name));
        let descriptor = DeviceDescriptor {
            address: self.address.unwrap_or_default(),
            name,
            kind,
            rssi: self.rssi,
            origin: self.origin.unwrap_or(SourceOrigin::Live),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

/// A device remembered in the persistent discovery cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDevice {
    pub address: String,
    pub name: String,
    pub kind: EquipmentKind,
    pub last_seen: Timestamp,
}

/// Why a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The operator asked for the disconnect.
    Requested,
    /// The transport dropped unexpectedly (GATT error, link loss).
    Transport,
    /// The reconnect budget was exhausted. Terminal for an active workout.
    GaveUp,
}

/// Connection-state events emitted by device sources and the facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting { address: String },
    Connected { address: String },
    Reconnecting { address: String, attempt: u32 },
    Disconnected { reason: DisconnectReason },
}

impl ConnectionState {
    /// Whether this state is terminal for reconnect purposes.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Disconnected {
                reason: DisconnectReason::GaveUp
            }
        )
    }
}
