//! BLE adapter error types.

use fitbridge_domain::error::{FitBridgeError, NotFoundError};

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// BLE scan or GATT operation failed.
    #[error("BLE transport error")]
    Transport(#[from] btleplug::Error),

    /// The peer took longer than the configured connect timeout.
    #[error("connection to {address} timed out")]
    ConnectTimeout { address: String },

    /// The address was never seen by a scan.
    #[error("device {address} not found in scan results")]
    NotFound { address: String },

    /// The peer exposes neither Indoor Bike Data nor Rower Data.
    #[error("device {address} does not expose FTMS telemetry")]
    Unsupported { address: String },
}

impl From<BleError> for FitBridgeError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::NotFound { address } => FitBridgeError::NotFound(NotFoundError {
                entity: "Device",
                id: address,
            }),
            BleError::Unsupported { address } => FitBridgeError::Unsupported { address },
            other => FitBridgeError::Transport(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_available_error() {
        assert_eq!(BleError::NotAvailable.to_string(), "no BLE adapter available");
    }

    #[test]
    fn should_display_timeout_with_address() {
        let err = BleError::ConnectTimeout {
            address: "AA:BB".to_string(),
        };
        assert_eq!(err.to_string(), "connection to AA:BB timed out");
    }

    #[test]
    fn should_convert_not_found_to_domain_not_found() {
        let err: FitBridgeError = BleError::NotFound {
            address: "AA:BB".to_string(),
        }
        .into();
        assert!(matches!(err, FitBridgeError::NotFound(_)));
    }

    #[test]
    fn should_convert_unsupported_to_domain_unsupported() {
        let err: FitBridgeError = BleError::Unsupported {
            address: "AA:BB".to_string(),
        }
        .into();
        assert!(matches!(err, FitBridgeError::Unsupported { .. }));
    }

    #[test]
    fn should_convert_transport_errors_to_domain_transport() {
        let err: FitBridgeError = BleError::Transport(btleplug::Error::DeviceNotFound).into();
        assert!(matches!(err, FitBridgeError::Transport(_)));
    }
}
