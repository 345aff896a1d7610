//! Workout summary and its incremental per-sample aggregator.
//!
//! The aggregator is fed one sample at a time by the workout manager (and
//! by the restart sweep when recomputing from persisted rows). Absent
//! metric fields do not contribute — an "unknown" never becomes a zero in
//! any mean.
//!
//! The average speed is **time-weighted**: samples may arrive at irregular
//! intervals, so each speed reading is weighted by the time delta to the
//! previous sample. Totals (distance, energy) are taken from the last
//! sample that carries them, never summed.

use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;
use crate::sample::Sample;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// VO2max eligibility thresholds.
const VO2MAX_MIN_MEAN_HR: f64 = 120.0;
const VO2MAX_MIN_DURATION_S: f64 = 120.0;
const VO2MAX_MIN_HR_SAMPLES: u64 = 60;

/// Why the VO2max estimate was withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vo2maxGate {
    WeightUnknown,
    TooShort,
    InsufficientHrSamples,
    HrTooLow,
}

/// Aggregated metrics for one workout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub sample_count: u64,
    /// Seconds between the first and last sample.
    pub elapsed_s: f64,
    pub avg_power_w: Option<f64>,
    pub max_power_w: Option<i16>,
    pub avg_cadence_rpm: Option<f64>,
    pub max_cadence_rpm: Option<f64>,
    pub avg_stroke_rate_spm: Option<f64>,
    pub max_stroke_rate_spm: Option<f64>,
    /// Time-weighted mean in km/h.
    pub avg_speed_kph: Option<f64>,
    pub max_speed_kph: Option<f64>,
    pub avg_heart_rate_bpm: Option<f64>,
    pub max_heart_rate_bpm: Option<u8>,
    pub total_distance_m: Option<u32>,
    pub total_energy_kcal: Option<u16>,
    pub vo2max: Option<f64>,
    /// Set exactly when `vo2max` is withheld.
    pub vo2max_gate: Option<Vo2maxGate>,
}

/// Running count / sum / max for one metric.
#[derive(Debug, Clone, Copy, Default)]
struct MetricAccumulator {
    count: u64,
    sum: f64,
    max: f64,
}

impl MetricAccumulator {
    fn push(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}

/// Incremental aggregator producing a [`WorkoutSummary`].
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    sample_count: u64,
    first_t: Option<i64>,
    last_t: Option<i64>,
    power: MetricAccumulator,
    cadence: MetricAccumulator,
    stroke_rate: MetricAccumulator,
    speed: MetricAccumulator,
    heart_rate: MetricAccumulator,
    /// Time-weighted speed: Σ(speed·dt) and Σdt, dt in seconds.
    speed_weighted_sum: f64,
    speed_weight_s: f64,
    total_distance_m: Option<u32>,
    total_energy_kcal: Option<u16>,
}

impl SummaryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the running aggregates.
    ///
    /// Samples must be pushed in `t` order — the caller guarantees this
    /// (samples are persisted and replayed in timestamp order).
    pub fn push(&mut self, sample: &Sample) {
        let dt_s = match self.last_t {
            Some(last) => (sample.t - last) as f64 / MICROS_PER_SECOND,
            None => 0.0,
        };

        self.sample_count += 1;
        if self.first_t.is_none() {
            self.first_t = Some(sample.t);
        }
        self.last_t = Some(sample.t);

        if let Some(power) = sample.instant_power_w {
            self.power.push(f64::from(power));
        }
        if let Some(cadence) = sample.cadence_rpm {
            self.cadence.push(cadence);
        }
        if let Some(stroke_rate) = sample.stroke_rate_spm {
            self.stroke_rate.push(stroke_rate);
        }
        if let Some(speed) = sample.instant_speed_kph {
            self.speed.push(speed);
            if dt_s > 0.0 {
                self.speed_weighted_sum += speed * dt_s;
                self.speed_weight_s += dt_s;
            }
        }
        if let Some(heart_rate) = sample.heart_rate_bpm {
            self.heart_rate.push(f64::from(heart_rate));
        }
        if let Some(distance) = sample.total_distance_m {
            self.total_distance_m = Some(distance);
        }
        if let Some(energy) = sample.total_energy_kcal {
            self.total_energy_kcal = Some(energy);
        }
    }

    /// Seconds between the first and last pushed sample.
    #[must_use]
    pub fn elapsed_s(&self) -> f64 {
        match (self.first_t, self.last_t) {
            (Some(first), Some(last)) => (last - first) as f64 / MICROS_PER_SECOND,
            _ => 0.0,
        }
    }

    /// Number of samples pushed so far.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Snapshot the aggregates into a [`WorkoutSummary`].
    #[must_use]
    pub fn finish(&self, profile: &UserProfile) -> WorkoutSummary {
        let elapsed_s = self.elapsed_s();

        // Time-weighted mean; plain mean when only one sample carried speed.
        let avg_speed_kph = if self.speed_weight_s > 0.0 {
            Some(self.speed_weighted_sum / self.speed_weight_s)
        } else {
            self.speed.mean()
        };

        let (vo2max, vo2max_gate) = self.estimate_vo2max(profile, elapsed_s);

        // Maxima were fed from i16 / u8 wire values, so the casts are lossless.
        #[allow(clippy::cast_possible_truncation)]
        let max_power_w = self.power.max().map(|max| max as i16);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_heart_rate_bpm = self.heart_rate.max().map(|max| max as u8);

        WorkoutSummary {
            sample_count: self.sample_count,
            elapsed_s,
            avg_power_w: self.power.mean(),
            max_power_w,
            avg_cadence_rpm: self.cadence.mean(),
            max_cadence_rpm: self.cadence.max(),
            avg_stroke_rate_spm: self.stroke_rate.mean(),
            max_stroke_rate_spm: self.stroke_rate.max(),
            avg_speed_kph,
            max_speed_kph: self.speed.max(),
            avg_heart_rate_bpm: self.heart_rate.mean(),
            max_heart_rate_bpm,
            total_distance_m: self.total_distance_m,
            total_energy_kcal: self.total_energy_kcal,
            vo2max,
            vo2max_gate,
        }
    }

    /// Estimate VO2max (`15.3 × HRmax / HRrest`) when every eligibility
    /// gate holds; otherwise report the first failing gate.
    fn estimate_vo2max(
        &self,
        profile: &UserProfile,
        elapsed_s: f64,
    ) -> (Option<f64>, Option<Vo2maxGate>) {
        if profile.weight_kg.is_none() {
            return (None, Some(Vo2maxGate::WeightUnknown));
        }
        if elapsed_s < VO2MAX_MIN_DURATION_S {
            return (None, Some(Vo2maxGate::TooShort));
        }
        if self.heart_rate.count < VO2MAX_MIN_HR_SAMPLES {
            return (None, Some(Vo2maxGate::InsufficientHrSamples));
        }
        match self.heart_rate.mean() {
            Some(mean_hr) if mean_hr >= VO2MAX_MIN_MEAN_HR => {
                let estimate = 15.3 * profile.max_hr() / profile.resting_hr();
                (Some(estimate), None)
            }
            _ => (None, Some(Vo2maxGate::HrTooLow)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::EquipmentKind;

    const SECOND_US: i64 = 1_000_000;

    fn bike_sample(t_s: i64) -> Sample {
        Sample::empty(t_s * SECOND_US, EquipmentKind::Bike)
    }

    fn profile_with_weight() -> UserProfile {
        UserProfile {
            weight_kg: Some(75.0),
            ..UserProfile::default()
        }
    }

    #[test]
    fn should_average_present_power_only() {
        let mut builder = SummaryBuilder::new();

        let mut with_power = bike_sample(0);
        with_power.instant_power_w = Some(100);
        builder.push(&with_power);

        // Absent power must not drag the mean toward zero.
        builder.push(&bike_sample(1));

        let mut with_power = bike_sample(2);
        with_power.instant_power_w = Some(200);
        builder.push(&with_power);

        let summary = builder.finish(&UserProfile::default());
        assert_eq!(summary.avg_power_w, Some(150.0));
        assert_eq!(summary.max_power_w, Some(200));
        assert_eq!(summary.sample_count, 3);
    }

    #[test]
    fn should_time_weight_average_speed() {
        let mut builder = SummaryBuilder::new();

        let mut fast = bike_sample(0);
        fast.instant_speed_kph = Some(30.0);
        builder.push(&fast);

        // 30 km/h held for 1 s.
        let mut fast = bike_sample(1);
        fast.instant_speed_kph = Some(30.0);
        builder.push(&fast);

        // 10 km/h held for 3 s — must dominate an arithmetic mean.
        let mut slow = bike_sample(4);
        slow.instant_speed_kph = Some(10.0);
        builder.push(&slow);

        let summary = builder.finish(&UserProfile::default());
        // (30·1 + 10·3) / 4 = 15, not (30+30+10)/3 = 23.3
        let avg = summary.avg_speed_kph.unwrap();
        assert!((avg - 15.0).abs() < 1e-9, "got {avg}");
        assert_eq!(summary.max_speed_kph, Some(30.0));
    }

    #[test]
    fn should_fall_back_to_plain_mean_for_single_speed_sample() {
        let mut builder = SummaryBuilder::new();
        let mut sample = bike_sample(0);
        sample.instant_speed_kph = Some(22.0);
        builder.push(&sample);

        let summary = builder.finish(&UserProfile::default());
        assert_eq!(summary.avg_speed_kph, Some(22.0));
    }

    #[test]
    fn should_take_totals_from_last_carrying_sample() {
        let mut builder = SummaryBuilder::new();

        let mut first = bike_sample(0);
        first.total_distance_m = Some(100);
        first.total_energy_kcal = Some(5);
        builder.push(&first);

        let mut second = bike_sample(1);
        second.total_distance_m = Some(250);
        builder.push(&second);

        // Last sample carries neither total — previous values stick.
        builder.push(&bike_sample(2));

        let summary = builder.finish(&UserProfile::default());
        assert_eq!(summary.total_distance_m, Some(250));
        assert_eq!(summary.total_energy_kcal, Some(5));
    }

    #[test]
    fn should_compute_elapsed_from_first_and_last_sample() {
        let mut builder = SummaryBuilder::new();
        builder.push(&bike_sample(10));
        builder.push(&bike_sample(70));
        assert!((builder.elapsed_s() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn should_gate_vo2max_on_unknown_weight() {
        let mut builder = SummaryBuilder::new();
        for t in 0..180 {
            let mut sample = bike_sample(t);
            sample.heart_rate_bpm = Some(150);
            builder.push(&sample);
        }
        let summary = builder.finish(&UserProfile::default());
        assert_eq!(summary.vo2max, None);
        assert_eq!(summary.vo2max_gate, Some(Vo2maxGate::WeightUnknown));
    }

    #[test]
    fn should_gate_vo2max_on_low_mean_heart_rate() {
        let mut builder = SummaryBuilder::new();
        for t in 0..300 {
            let mut sample = bike_sample(t);
            sample.heart_rate_bpm = Some(100);
            builder.push(&sample);
        }
        let summary = builder.finish(&profile_with_weight());
        assert_eq!(summary.vo2max, None);
        assert_eq!(summary.vo2max_gate, Some(Vo2maxGate::HrTooLow));
    }

    #[test]
    fn should_gate_vo2max_on_short_duration() {
        let mut builder = SummaryBuilder::new();
        for t in 0..60 {
            let mut sample = bike_sample(t);
            sample.heart_rate_bpm = Some(150);
            builder.push(&sample);
        }
        let summary = builder.finish(&profile_with_weight());
        assert_eq!(summary.vo2max_gate, Some(Vo2maxGate::TooShort));
    }

    #[test]
    fn should_gate_vo2max_on_sparse_heart_rate() {
        let mut builder = SummaryBuilder::new();
        for t in 0..300 {
            let mut sample = bike_sample(t);
            if t < 30 {
                sample.heart_rate_bpm = Some(150);
            }
            builder.push(&sample);
        }
        let summary = builder.finish(&profile_with_weight());
        assert_eq!(summary.vo2max_gate, Some(Vo2maxGate::InsufficientHrSamples));
    }

    #[test]
    fn should_estimate_vo2max_when_eligible() {
        let mut builder = SummaryBuilder::new();
        for t in 0..300 {
            let mut sample = bike_sample(t);
            sample.heart_rate_bpm = Some(150);
            builder.push(&sample);
        }
        let profile = UserProfile {
            weight_kg: Some(75.0),
            max_hr_bpm: Some(190),
            resting_hr_bpm: Some(60),
            ..UserProfile::default()
        };
        let summary = builder.finish(&profile);
        let vo2max = summary.vo2max.unwrap();
        // 15.3 × 190 / 60
        assert!((vo2max - 48.45).abs() < 0.01, "got {vo2max}");
        assert_eq!(summary.vo2max_gate, None);
    }

    #[test]
    fn should_never_see_zero_heart_rate_in_mean() {
        let mut builder = SummaryBuilder::new();
        let mut sample = bike_sample(0);
        sample.heart_rate_bpm = Sample::heart_rate_from_wire(0);
        builder.push(&sample);

        let mut sample = bike_sample(1);
        sample.heart_rate_bpm = Sample::heart_rate_from_wire(140);
        builder.push(&sample);

        let summary = builder.finish(&UserProfile::default());
        assert_eq!(summary.avg_heart_rate_bpm, Some(140.0));
        assert_eq!(summary.max_heart_rate_bpm, Some(140));
    }

    #[test]
    fn should_track_stroke_rate_for_rower_samples() {
        let mut builder = SummaryBuilder::new();
        for (t, spm) in [(0, 24.0), (1, 26.0), (2, 28.0)] {
            let mut sample = Sample::empty(t * SECOND_US, EquipmentKind::Rower);
            sample.stroke_rate_spm = Some(spm);
            builder.push(&sample);
        }
        let summary = builder.finish(&UserProfile::default());
        assert_eq!(summary.avg_stroke_rate_spm, Some(26.0));
        assert_eq!(summary.max_stroke_rate_spm, Some(28.0));
    }

    #[test]
    fn should_produce_empty_summary_for_no_samples() {
        let summary = SummaryBuilder::new().finish(&UserProfile::default());
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.elapsed_s, 0.0);
        assert!(summary.avg_power_w.is_none());
        assert!(summary.total_distance_m.is_none());
    }

    #[test]
    fn should_roundtrip_summary_through_serde_json() {
        let mut builder = SummaryBuilder::new();
        let mut sample = bike_sample(0);
        sample.instant_power_w = Some(150);
        sample.instant_speed_kph = Some(25.0);
        builder.push(&sample);

        let summary = builder.finish(&UserProfile::default());
        let json = serde_json::to_string(&summary).unwrap();
        let parsed: WorkoutSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
    }
}
