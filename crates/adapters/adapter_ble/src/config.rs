//! BLE source configuration.

use serde::Deserialize;

/// Configuration for the live FTMS source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Upper bound on a discovery scan, in seconds.
    pub scan_duration_secs: u16,
    /// GATT connection timeout, in seconds.
    pub connect_timeout_secs: u16,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan_duration_secs: 10,
            connect_timeout_secs: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = BleConfig::default();
        assert_eq!(config.scan_duration_secs, 10);
        assert_eq!(config.connect_timeout_secs, 20);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r"
            scan_duration_secs = 5
            connect_timeout_secs = 30
        ";
        let config: BleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.scan_duration_secs, 5);
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let config: BleConfig = toml::from_str("scan_duration_secs = 3").unwrap();
        assert_eq!(config.scan_duration_secs, 3);
        assert_eq!(config.connect_timeout_secs, 20);
    }
}
