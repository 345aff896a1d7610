//! User profile — the rider's physical parameters for derived metrics.

use serde::{Deserialize, Serialize};

/// Heart-rate defaults used when the profile leaves a field unset.
const DEFAULT_RESTING_HR: f64 = 60.0;
const DEFAULT_AGE_YEARS: f64 = 30.0;

/// Physical parameters of the user, all optional.
///
/// Loaded from configuration; only the VO2max estimate consumes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub weight_kg: Option<f64>,
    pub age: Option<u8>,
    pub max_hr_bpm: Option<u8>,
    pub resting_hr_bpm: Option<u8>,
}

impl UserProfile {
    /// Maximum heart rate: configured, or the age-based estimate
    /// `208 − 0.7 × age` (age defaults to 30).
    #[must_use]
    pub fn max_hr(&self) -> f64 {
        match self.max_hr_bpm {
            Some(bpm) => f64::from(bpm),
            None => {
                let age = self.age.map_or(DEFAULT_AGE_YEARS, f64::from);
                208.0 - 0.7 * age
            }
        }
    }

    /// Resting heart rate: configured or 60 bpm.
    #[must_use]
    pub fn resting_hr(&self) -> f64 {
        self.resting_hr_bpm.map_or(DEFAULT_RESTING_HR, f64::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_configured_max_hr_when_present() {
        let profile = UserProfile {
            max_hr_bpm: Some(192),
            ..UserProfile::default()
        };
        assert!((profile.max_hr() - 192.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_estimate_max_hr_from_age() {
        let profile = UserProfile {
            age: Some(40),
            ..UserProfile::default()
        };
        assert!((profile.max_hr() - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_fall_back_to_default_age_when_unknown() {
        let profile = UserProfile::default();
        assert!((profile.max_hr() - 187.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_default_resting_hr_to_sixty() {
        let profile = UserProfile::default();
        assert!((profile.resting_hr() - 60.0).abs() < f64::EPSILON);

        let profile = UserProfile {
            resting_hr_bpm: Some(52),
            ..UserProfile::default()
        };
        assert!((profile.resting_hr() - 52.0).abs() < f64::EPSILON);
    }

    #[test]
    fn should_deserialize_empty_profile_from_toml_style_json() {
        let profile: UserProfile = serde_json::from_str("{}").unwrap();
        assert!(profile.weight_kg.is_none());
        assert!(profile.age.is_none());
    }
}
