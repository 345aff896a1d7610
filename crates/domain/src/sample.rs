//! Sample — a normalized time-stamped telemetry snapshot.
//!
//! One sample per decoded FTMS record. Every metric field is optional:
//! a field the machine did not transmit stays `None` — it is never
//! zero-filled here. The heart-rate wire value 0 means "not present" and is
//! normalized to `None` at construction.

use serde::{Deserialize, Serialize};

use crate::device::EquipmentKind;

/// A normalized telemetry snapshot.
///
/// `t` is microseconds since the Unix epoch, strictly increasing within a
/// workout (assigned by the source facade, not by the codec).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: i64,
    pub kind: EquipmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instant_power_w: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_power_w: Option<i16>,
    /// Instantaneous crank cadence (bike), 0.5 rpm resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cadence_rpm: Option<f64>,
    /// Instantaneous stroke rate (rower), 0.5 spm resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_rate_spm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_count: Option<u16>,
    /// Instantaneous speed in km/h, 0.01 resolution. Always km/h — the FIT
    /// encoder converts to m/s, the UI converts for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instant_speed_kph: Option<f64>,
    /// Total distance in meters, non-decreasing within a workout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_distance_m: Option<u32>,
    /// Never `Some(0)` — the wire value 0 means absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate_bpm: Option<u8>,
    /// Total energy in kcal, non-decreasing within a workout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_energy_kcal: Option<u16>,
    /// Elapsed seconds since workout start as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_s: Option<u16>,
    /// Device-defined unitless resistance level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resistance_level: Option<i16>,
}

impl Sample {
    /// An empty sample of the given kind, all metrics absent.
    #[must_use]
    pub fn empty(t: i64, kind: EquipmentKind) -> Self {
        Self {
            t,
            kind,
            instant_power_w: None,
            avg_power_w: None,
            cadence_rpm: None,
            stroke_rate_spm: None,
            stroke_count: None,
            instant_speed_kph: None,
            total_distance_m: None,
            heart_rate_bpm: None,
            total_energy_kcal: None,
            elapsed_s: None,
            resistance_level: None,
        }
    }

    /// Normalize a wire heart-rate value: 0 means "not present".
    #[must_use]
    pub fn heart_rate_from_wire(bpm: u8) -> Option<u8> {
        (bpm != 0).then_some(bpm)
    }

    /// The cadence channel for this sample's equipment kind: crank rpm for
    /// bikes, stroke rate for rowers.
    #[must_use]
    pub fn cadence_channel(&self) -> Option<f64> {
        match self.kind {
            EquipmentKind::Rower => self.stroke_rate_spm,
            _ => self.cadence_rpm,
        }
    }
}
