//! Common error types used across the workspace.
//!
//! Each layer defines its own concrete error types. The domain layer provides
//! [`ValidationError`], [`NotFoundError`], and [`LifecycleError`]. Adapter
//! layers define their own (e.g. `StorageError` wrapping `sqlx::Error`,
//! `BleError` wrapping `btleplug::Error`) and wire them into
//! [`FitBridgeError`] behind the boxed `Storage` / `Transport` / `Encoding`
//! variants.

/// Validation failures raised by domain invariant checks.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("device address cannot be empty")]
    EmptyAddress,
    #[error("device name cannot be empty")]
    EmptyName,
    #[error("workout end time precedes start time")]
    EndBeforeStart,
    #[error("invalid RFC 3339 timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("unknown equipment kind: {0}")]
    UnknownKind(String),
    #[error("unknown workout state: {0}")]
    UnknownState(String),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Returned when a lookup by identifier finds nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Rejected lifecycle transitions.
///
/// These are synchronous, structured rejections — they never mutate state
/// and never carry a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("a workout is already active")]
    AlreadyActive,
    #[error("no workout is active")]
    NotActive,
    #[error("workout has not ended")]
    NotEnded,
    #[error("no device is connected")]
    NotConnected,
    #[error("a device is already connected")]
    AlreadyConnected,
}

/// Top-level domain error.
///
/// Adapter crates introduce additional failure detail by boxing their own
/// error types into the `Storage` / `Transport` / `Encoding` variants.
#[derive(Debug, thiserror::Error)]
pub enum FitBridgeError {
    #[error("Validation error")]
    Validation(#[from] ValidationError),

    #[error("Not found")]
    NotFound(#[from] NotFoundError),

    #[error("Lifecycle error")]
    Lifecycle(#[from] LifecycleError),

    #[error("device {address} does not expose the fitness machine service")]
    Unsupported { address: String },

    #[error("Storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Encoding error")]
    Encoding(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience alias used throughout the domain and application layers.
pub type Result<T> = std::result::Result<T, FitBridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_validation_error_message() {
        let err = ValidationError::EmptyAddress;
        assert_eq!(err.to_string(), "device address cannot be empty");
    }

    #[test]
    fn should_display_not_found_error_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Workout",
            id: "abc-123".to_string(),
        };
        assert_eq!(err.to_string(), "Workout abc-123 not found");
    }

    #[test]
    fn should_display_lifecycle_error_messages() {
        assert_eq!(
            LifecycleError::AlreadyActive.to_string(),
            "a workout is already active"
        );
        assert_eq!(
            LifecycleError::NotEnded.to_string(),
            "workout has not ended"
        );
    }

    #[test]
    fn should_convert_validation_error_into_fitbridge_error() {
        let err: FitBridgeError = ValidationError::EmptyName.into();
        assert!(matches!(err, FitBridgeError::Validation(_)));
    }

    #[test]
    fn should_convert_lifecycle_error_into_fitbridge_error() {
        let err: FitBridgeError = LifecycleError::NotActive.into();
        assert!(matches!(
            err,
            FitBridgeError::Lifecycle(LifecycleError::NotActive)
        ));
    }

    #[test]
    fn should_convert_not_found_error_into_fitbridge_error() {
        let err: FitBridgeError = NotFoundError {
            entity: "Device",
            id: "xyz".to_string(),
        }
        .into();
        assert!(matches!(err, FitBridgeError::NotFound(_)));
    }

    #[test]
    fn should_display_unsupported_error_with_address() {
        let err = FitBridgeError::Unsupported {
            address: "A4:C1:38:5B:0E:DF".to_string(),
        };
        assert!(err.to_string().contains("A4:C1:38:5B:0E:DF"));
    }
}
