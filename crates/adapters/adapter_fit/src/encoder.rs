//! Binary writer for FIT activity files.
//!
//! Message sequence: file_id, device_info, event(start), one record per
//! sample, event(stop_all), lap, session, activity. Definition messages
//! precede their data messages; local message types are assigned
//! consistently (0 file_id … 6 activity). The header's `data_size` is
//! patched after the body is built, then the trailing CRC is computed
//! over header + body.
//!
//! All multi-byte fields are little-endian. Absent sample fields are
//! written as the base type's invalid sentinel, never as zero.

use fitbridge_app::ports::ActivityEncoder;
use fitbridge_domain::device::EquipmentKind;
use fitbridge_domain::error::FitBridgeError;
use fitbridge_domain::sample::Sample;
use fitbridge_domain::summary::WorkoutSummary;
use fitbridge_domain::time::Timestamp;
use fitbridge_domain::workout::Workout;

use crate::error::FitEncodeError;
use crate::profile::{
    base_type, event, event_type, identity, invalid, mesg_num, sport, sub_sport,
    ACTIVITY_TYPE_MANUAL, DATA_TYPE_SIGNATURE, FIT_EPOCH_OFFSET_S, HEADER_LEN,
    LAP_TRIGGER_SESSION_END, PROFILE_VERSION, PROTOCOL_VERSION, SESSION_TRIGGER_ACTIVITY_END,
};
use crate::crc;

/// One field of a definition message: field number, size, base type.
struct FieldDef(u8, u8, u8);

const LOCAL_FILE_ID: u8 = 0;
const LOCAL_DEVICE_INFO: u8 = 1;
const LOCAL_EVENT: u8 = 2;
const LOCAL_RECORD: u8 = 3;
const LOCAL_LAP: u8 = 4;
const LOCAL_SESSION: u8 = 5;
const LOCAL_ACTIVITY: u8 = 6;

const FILE_ID_FIELDS: &[FieldDef] = &[
    FieldDef(0, 1, base_type::ENUM),    // type
    FieldDef(1, 2, base_type::UINT16),  // manufacturer
    FieldDef(2, 2, base_type::UINT16),  // product
    FieldDef(3, 4, base_type::UINT32Z), // serial_number
    FieldDef(4, 4, base_type::UINT32),  // time_created
];

const DEVICE_INFO_FIELDS: &[FieldDef] = &[
    FieldDef(253, 4, base_type::UINT32), // timestamp
    FieldDef(0, 1, base_type::UINT8),    // device_index
    FieldDef(2, 2, base_type::UINT16),   // manufacturer
    FieldDef(4, 2, base_type::UINT16),   // product
    FieldDef(3, 4, base_type::UINT32Z),  // serial_number
    FieldDef(5, 2, base_type::UINT16),   // software_version, scale 100
];

const EVENT_FIELDS: &[FieldDef] = &[
    FieldDef(253, 4, base_type::UINT32), // timestamp
    FieldDef(0, 1, base_type::ENUM),     // event
    FieldDef(1, 1, base_type::ENUM),     // event_type
];

const RECORD_FIELDS: &[FieldDef] = &[
    FieldDef(253, 4, base_type::UINT32), // timestamp
    FieldDef(5, 4, base_type::UINT32),   // distance, scale 100 (m)
    FieldDef(6, 2, base_type::UINT16),   // speed, scale 1000 (m/s)
    FieldDef(7, 2, base_type::UINT16),   // power (W)
    FieldDef(3, 1, base_type::UINT8),    // heart_rate (bpm)
    FieldDef(4, 1, base_type::UINT8),    // cadence (rpm / spm)
];

const LAP_FIELDS: &[FieldDef] = &[
    FieldDef(253, 4, base_type::UINT32), // timestamp
    FieldDef(2, 4, base_type::UINT32),   // start_time
    FieldDef(7, 4, base_type::UINT32),   // total_elapsed_time, scale 1000
    FieldDef(8, 4, base_type::UINT32),   // total_timer_time, scale 1000
    FieldDef(9, 4, base_type::UINT32),   // total_distance, scale 100
    FieldDef(11, 2, base_type::UINT16),  // total_calories
    FieldDef(13, 2, base_type::UINT16),  // avg_speed, scale 1000
    FieldDef(14, 2, base_type::UINT16),  // max_speed, scale 1000
    FieldDef(19, 2, base_type::UINT16),  // avg_power
    FieldDef(20, 2, base_type::UINT16),  // max_power
    FieldDef(15, 1, base_type::UINT8),   // avg_heart_rate
    FieldDef(16, 1, base_type::UINT8),   // max_heart_rate
    FieldDef(17, 1, base_type::UINT8),   // avg_cadence
    FieldDef(18, 1, base_type::UINT8),   // max_cadence
    FieldDef(0, 1, base_type::ENUM),     // event
    FieldDef(1, 1, base_type::ENUM),     // event_type
    FieldDef(24, 1, base_type::ENUM),    // lap_trigger
    FieldDef(25, 1, base_type::ENUM),    // sport
    FieldDef(39, 1, base_type::ENUM),    // sub_sport
];

const SESSION_FIELDS: &[FieldDef] = &[
    FieldDef(253, 4, base_type::UINT32), // timestamp
    FieldDef(2, 4, base_type::UINT32),   // start_time
    FieldDef(7, 4, base_type::UINT32),   // total_elapsed_time, scale 1000
    FieldDef(8, 4, base_type::UINT32),   // total_timer_time, scale 1000
    FieldDef(9, 4, base_type::UINT32),   // total_distance, scale 100
    FieldDef(11, 2, base_type::UINT16),  // total_calories
    FieldDef(14, 2, base_type::UINT16),  // avg_speed, scale 1000
    FieldDef(15, 2, base_type::UINT16),  // max_speed, scale 1000
    FieldDef(20, 2, base_type::UINT16),  // avg_power
    FieldDef(21, 2, base_type::UINT16),  // max_power
    FieldDef(25, 2, base_type::UINT16),  // first_lap_index
    FieldDef(26, 2, base_type::UINT16),  // num_laps
    FieldDef(16, 1, base_type::UINT8),   // avg_heart_rate
    FieldDef(17, 1, base_type::UINT8),   // max_heart_rate
    FieldDef(18, 1, base_type::UINT8),   // avg_cadence
    FieldDef(19, 1, base_type::UINT8),   // max_cadence
    FieldDef(0, 1, base_type::ENUM),     // event
    FieldDef(1, 1, base_type::ENUM),     // event_type
    FieldDef(28, 1, base_type::ENUM),    // trigger
    FieldDef(5, 1, base_type::ENUM),     // sport
    FieldDef(6, 1, base_type::ENUM),     // sub_sport
];

const ACTIVITY_FIELDS: &[FieldDef] = &[
    FieldDef(253, 4, base_type::UINT32), // timestamp
    FieldDef(0, 4, base_type::UINT32),   // total_timer_time, scale 1000
    FieldDef(5, 4, base_type::UINT32),   // local_timestamp
    FieldDef(1, 2, base_type::UINT16),   // num_sessions
    FieldDef(2, 1, base_type::ENUM),     // type
    FieldDef(3, 1, base_type::ENUM),     // event
    FieldDef(4, 1, base_type::ENUM),     // event_type
];

/// FIT activity encoder identifying itself with a fixed manufacturer,
/// product, serial, and firmware version.
#[derive(Debug, Clone)]
pub struct FitActivityEncoder {
    manufacturer: u16,
    product: u16,
    serial_number: u32,
    software_version: u16,
}

impl Default for FitActivityEncoder {
    fn default() -> Self {
        Self {
            manufacturer: identity::MANUFACTURER_GARMIN,
            product: identity::PRODUCT_EDGE_530,
            serial_number: identity::SERIAL_NUMBER,
            software_version: identity::SOFTWARE_VERSION,
        }
    }
}

impl FitActivityEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the complete file image.
    ///
    /// # Errors
    ///
    /// Returns [`FitEncodeError`] when the workout has no samples, no end
    /// time, or timestamps a FIT date_time cannot carry. Nothing partial
    /// is ever returned.
    pub fn encode_activity(
        &self,
        workout: &Workout,
        samples: &[Sample],
        summary: &WorkoutSummary,
    ) -> Result<Vec<u8>, FitEncodeError> {
        if samples.is_empty() {
            return Err(FitEncodeError::EmptyWorkout);
        }
        let ended_at = workout.ended_at.ok_or(FitEncodeError::MissingEndTime)?;

        let start_ts = fit_time(workout.started_at)?;
        let end_ts = fit_time(ended_at)?;
        let timer_ms = duration_ms(workout.started_at, ended_at);
        let (sport, sub_sport) = sport_pair(workout.kind);

        let mut body = Vec::with_capacity(64 + samples.len() * 20);

        self.write_file_id(&mut body, start_ts);
        self.write_device_info(&mut body, start_ts);

        write_definition(&mut body, LOCAL_EVENT, mesg_num::EVENT, EVENT_FIELDS);
        write_event(&mut body, start_ts, event::TIMER, event_type::START);

        write_definition(&mut body, LOCAL_RECORD, mesg_num::RECORD, RECORD_FIELDS);
        for sample in samples {
            write_record(&mut body, sample, workout.kind)?;
        }

        write_event(&mut body, end_ts, event::TIMER, event_type::STOP_ALL);

        write_lap(&mut body, start_ts, end_ts, timer_ms, summary, sport, sub_sport);
        write_session(&mut body, start_ts, end_ts, timer_ms, summary, sport, sub_sport);
        write_activity(&mut body, end_ts, timer_ms);

        let mut file = header(body.len());
        file.extend_from_slice(&body);
        let trailing = crc::checksum(&file);
        file.extend(trailing.to_le_bytes());
        Ok(file)
    }

    fn write_file_id(&self, buf: &mut Vec<u8>, start_ts: u32) {
        write_definition(buf, LOCAL_FILE_ID, mesg_num::FILE_ID, FILE_ID_FIELDS);
        buf.push(LOCAL_FILE_ID);
        buf.push(crate::profile::FILE_TYPE_ACTIVITY);
        buf.extend(self.manufacturer.to_le_bytes());
        buf.extend(self.product.to_le_bytes());
        buf.extend(self.serial_number.to_le_bytes());
        buf.extend(start_ts.to_le_bytes());
    }

    fn write_device_info(&self, buf: &mut Vec<u8>, start_ts: u32) {
        write_definition(buf, LOCAL_DEVICE_INFO, mesg_num::DEVICE_INFO, DEVICE_INFO_FIELDS);
        buf.push(LOCAL_DEVICE_INFO);
        buf.extend(start_ts.to_le_bytes());
        buf.push(0); // creator device index
        buf.extend(self.manufacturer.to_le_bytes());
        buf.extend(self.product.to_le_bytes());
        buf.extend(self.serial_number.to_le_bytes());
        buf.extend(self.software_version.to_le_bytes());
    }
}

impl ActivityEncoder for FitActivityEncoder {
    fn encode(
        &self,
        workout: &Workout,
        samples: &[Sample],
        summary: &WorkoutSummary,
    ) -> Result<Vec<u8>, FitBridgeError> {
        let bytes = self.encode_activity(workout, samples, summary)?;
        tracing::debug!(
            workout_id = %workout.id,
            records = samples.len(),
            size = bytes.len(),
            "encoded FIT activity"
        );
        Ok(bytes)
    }
}

/// 14-byte header with a placeholder-free `data_size` and a header CRC
/// over the first 12 bytes.
fn header(data_size: usize) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.push(HEADER_LEN as u8);
    header.push(PROTOCOL_VERSION);
    header.extend(PROFILE_VERSION.to_le_bytes());
    header.extend((data_size as u32).to_le_bytes());
    header.extend_from_slice(DATA_TYPE_SIGNATURE);
    let crc = crc::checksum(&header);
    header.extend(crc.to_le_bytes());
    header
}

fn write_definition(buf: &mut Vec<u8>, local: u8, global: u16, fields: &[FieldDef]) {
    buf.push(0x40 | local);
    buf.push(0); // reserved
    buf.push(0); // little-endian
    buf.extend(global.to_le_bytes());
    buf.push(fields.len() as u8);
    for FieldDef(num, size, base) in fields {
        buf.push(*num);
        buf.push(*size);
        buf.push(*base);
    }
}

fn write_event(buf: &mut Vec<u8>, timestamp: u32, event: u8, event_type: u8) {
    buf.push(LOCAL_EVENT);
    buf.extend(timestamp.to_le_bytes());
    buf.push(event);
    buf.push(event_type);
}

fn write_record(
    buf: &mut Vec<u8>,
    sample: &Sample,
    kind: EquipmentKind,
) -> Result<(), FitEncodeError> {
    let seconds = sample.t.div_euclid(1_000_000);
    let timestamp = fit_time_seconds(seconds)?;

    let distance = sample
        .total_distance_m
        .map_or(invalid::U32, |m| m.saturating_mul(100));
    let speed = sample
        .instant_speed_kph
        .map_or(invalid::U16, speed_mm_per_s);
    let power = sample
        .instant_power_w
        .map_or(invalid::U16, |w| u16::try_from(w.max(0)).unwrap_or(0));
    let heart_rate = sample.heart_rate_bpm.unwrap_or(invalid::U8);
    // The FIT cadence channel carries rpm for bikes and strokes/min for
    // rowers.
    let cadence = match kind {
        EquipmentKind::Rower => sample.stroke_rate_spm,
        _ => sample.cadence_rpm,
    }
    .map_or(invalid::U8, round_u8);

    buf.push(LOCAL_RECORD);
    buf.extend(timestamp.to_le_bytes());
    buf.extend(distance.to_le_bytes());
    buf.extend(speed.to_le_bytes());
    buf.extend(power.to_le_bytes());
    buf.push(heart_rate);
    buf.push(cadence);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_lap(
    buf: &mut Vec<u8>,
    start_ts: u32,
    end_ts: u32,
    timer_ms: u32,
    summary: &WorkoutSummary,
    sport: u8,
    sub_sport: u8,
) {
    write_definition(buf, LOCAL_LAP, mesg_num::LAP, LAP_FIELDS);
    buf.push(LOCAL_LAP);
    buf.extend(end_ts.to_le_bytes());
    buf.extend(start_ts.to_le_bytes());
    buf.extend(timer_ms.to_le_bytes());
    buf.extend(timer_ms.to_le_bytes());
    buf.extend(summary_distance_cm(summary).to_le_bytes());
    buf.extend(summary.total_energy_kcal.unwrap_or(invalid::U16).to_le_bytes());
    buf.extend(summary_speed(summary.avg_speed_kph).to_le_bytes());
    buf.extend(summary_speed(summary.max_speed_kph).to_le_bytes());
    buf.extend(summary_power(summary.avg_power_w).to_le_bytes());
    buf.extend(
        summary
            .max_power_w
            .map_or(invalid::U16, |w| u16::try_from(w.max(0)).unwrap_or(0))
            .to_le_bytes(),
    );
    buf.push(summary.avg_heart_rate_bpm.map_or(invalid::U8, round_u8));
    buf.push(summary.max_heart_rate_bpm.unwrap_or(invalid::U8));
    buf.push(summary_cadence(summary).0);
    buf.push(summary_cadence(summary).1);
    buf.push(event::TIMER);
    buf.push(event_type::STOP);
    buf.push(LAP_TRIGGER_SESSION_END);
    buf.push(sport);
    buf.push(sub_sport);
}

#[allow(clippy::too_many_arguments)]
fn write_session(
    buf: &mut Vec<u8>,
    start_ts: u32,
    end_ts: u32,
    timer_ms: u32,
    summary: &WorkoutSummary,
    sport: u8,
    sub_sport: u8,
) {
    write_definition(buf, LOCAL_SESSION, mesg_num::SESSION, SESSION_FIELDS);
    buf.push(LOCAL_SESSION);
    buf.extend(end_ts.to_le_bytes());
    buf.extend(start_ts.to_le_bytes());
    buf.extend(timer_ms.to_le_bytes());
    buf.extend(timer_ms.to_le_bytes());
    buf.extend(summary_distance_cm(summary).to_le_bytes());
    buf.extend(summary.total_energy_kcal.unwrap_or(invalid::U16).to_le_bytes());
    buf.extend(summary_speed(summary.avg_speed_kph).to_le_bytes());
    buf.extend(summary_speed(summary.max_speed_kph).to_le_bytes());
    buf.extend(summary_power(summary.avg_power_w).to_le_bytes());
    buf.extend(
        summary
            .max_power_w
            .map_or(invalid::U16, |w| u16::try_from(w.max(0)).unwrap_or(0))
            .to_le_bytes(),
    );
    buf.extend(0u16.to_le_bytes()); // first_lap_index
    buf.extend(1u16.to_le_bytes()); // num_laps
    buf.push(summary.avg_heart_rate_bpm.map_or(invalid::U8, round_u8));
    buf.push(summary.max_heart_rate_bpm.unwrap_or(invalid::U8));
    buf.push(summary_cadence(summary).0);
    buf.push(summary_cadence(summary).1);
    buf.push(event::TIMER);
    buf.push(event_type::STOP);
    buf.push(SESSION_TRIGGER_ACTIVITY_END);
    buf.push(sport);
    buf.push(sub_sport);
}

fn write_activity(buf: &mut Vec<u8>, end_ts: u32, timer_ms: u32) {
    write_definition(buf, LOCAL_ACTIVITY, mesg_num::ACTIVITY, ACTIVITY_FIELDS);
    buf.push(LOCAL_ACTIVITY);
    buf.extend(end_ts.to_le_bytes());
    buf.extend(timer_ms.to_le_bytes());
    buf.extend(end_ts.to_le_bytes()); // local_timestamp (UTC device)
    buf.extend(1u16.to_le_bytes()); // num_sessions
    buf.push(ACTIVITY_TYPE_MANUAL);
    buf.push(event::ACTIVITY);
    buf.push(event_type::STOP);
}

fn sport_pair(kind: EquipmentKind) -> (u8, u8) {
    match kind {
        EquipmentKind::Rower => (sport::ROWING, sub_sport::INDOOR_ROWING),
        _ => (sport::CYCLING, sub_sport::INDOOR_CYCLING),
    }
}

fn fit_time(timestamp: Timestamp) -> Result<u32, FitEncodeError> {
    fit_time_seconds(timestamp.timestamp())
}

fn fit_time_seconds(unix_s: i64) -> Result<u32, FitEncodeError> {
    u32::try_from(unix_s - FIT_EPOCH_OFFSET_S).map_err(|_| FitEncodeError::TimestampOutOfRange)
}

fn duration_ms(start: Timestamp, end: Timestamp) -> u32 {
    u32::try_from((end - start).num_milliseconds().max(0)).unwrap_or(u32::MAX)
}

/// km/h → m/s with FIT scale 1000, clamped below the invalid sentinel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn speed_mm_per_s(kph: f64) -> u16 {
    ((kph / 3.6) * 1000.0).round().clamp(0.0, 65_534.0) as u16
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 254.0) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn summary_power(avg: Option<f64>) -> u16 {
    avg.map_or(invalid::U16, |w| w.round().clamp(0.0, 65_534.0) as u16)
}

fn summary_speed(kph: Option<f64>) -> u16 {
    kph.map_or(invalid::U16, speed_mm_per_s)
}

fn summary_distance_cm(summary: &WorkoutSummary) -> u32 {
    summary
        .total_distance_m
        .map_or(invalid::U32, |m| m.saturating_mul(100))
}

/// `(avg, max)` for the cadence channel: crank rpm when present,
/// otherwise stroke rate.
fn summary_cadence(summary: &WorkoutSummary) -> (u8, u8) {
    let (avg, max) = if summary.avg_cadence_rpm.is_some() {
        (summary.avg_cadence_rpm, summary.max_cadence_rpm)
    } else {
        (summary.avg_stroke_rate_spm, summary.max_stroke_rate_spm)
    };
    (
        avg.map_or(invalid::U8, round_u8),
        max.map_or(invalid::U8, round_u8),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitbridge_domain::summary::SummaryBuilder;
    use fitbridge_domain::profile::UserProfile;
    use fitbridge_domain::workout::WorkoutState;
    use std::collections::HashMap;

    // ── minimal test-side FIT reader ────────────────────────────────────

    struct ReaderField {
        num: u8,
        size: u8,
    }

    struct ReaderDef {
        global: u16,
        fields: Vec<ReaderField>,
    }

    /// Walk the body and return `(global, field→raw LE value)` per data
    /// message, tracking definitions exactly as a FIT decoder would.
    fn parse_body(body: &[u8]) -> Vec<(u16, HashMap<u8, u64>)> {
        let mut definitions: HashMap<u8, ReaderDef> = HashMap::new();
        let mut messages = Vec::new();
        let mut pos = 0;

        while pos < body.len() {
            let header = body[pos];
            pos += 1;
            let local = header & 0x0F;

            if header & 0x40 != 0 {
                pos += 1; // reserved
                assert_eq!(body[pos], 0, "only little-endian definitions expected");
                pos += 1;
                let global = u16::from_le_bytes([body[pos], body[pos + 1]]);
                pos += 2;
                let count = body[pos] as usize;
                pos += 1;
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    fields.push(ReaderField {
                        num: body[pos],
                        size: body[pos + 1],
                    });
                    pos += 3;
                }
                definitions.insert(local, ReaderDef { global, fields });
            } else {
                let def = definitions.get(&local).expect("data before definition");
                let mut values = HashMap::new();
                for field in &def.fields {
                    let mut value: u64 = 0;
                    for i in (0..field.size as usize).rev() {
                        value = (value << 8) | u64::from(body[pos + i]);
                    }
                    values.insert(field.num, value);
                    pos += field.size as usize;
                }
                messages.push((def.global, values));
            }
        }

        messages
    }

    fn first_message(
        messages: &[(u16, HashMap<u8, u64>)],
        global: u16,
    ) -> &HashMap<u8, u64> {
        &messages
            .iter()
            .find(|(g, _)| *g == global)
            .unwrap_or_else(|| panic!("no message with global {global}"))
            .1
    }

    // ── fixtures ────────────────────────────────────────────────────────

    const START_UNIX_S: i64 = 1_700_000_000;

    fn test_workout(kind: EquipmentKind, duration_s: i64) -> Workout {
        let started_at = fitbridge_domain::time::from_micros(START_UNIX_S * 1_000_000).unwrap();
        let mut workout = Workout::builder()
            .device_address("AA:BB:CC:DD:EE:FF")
            .device_name("Echo Bike")
            .kind(kind)
            .started_at(started_at)
            .build()
            .unwrap();
        workout.ended_at =
            Some(fitbridge_domain::time::from_micros((START_UNIX_S + duration_s) * 1_000_000).unwrap());
        workout.state = WorkoutState::Ended;
        workout
    }

    fn test_samples(kind: EquipmentKind, count: usize) -> Vec<Sample> {
        (0..count)
            .map(|i| {
                let mut sample =
                    Sample::empty((START_UNIX_S + 1 + i as i64) * 1_000_000, kind);
                sample.instant_power_w = Some(150);
                sample.instant_speed_kph = Some(25.2);
                sample.heart_rate_bpm = Some(140);
                sample.total_distance_m = Some(7 * (i as u32 + 1));
                match kind {
                    EquipmentKind::Rower => sample.stroke_rate_spm = Some(25.0),
                    _ => sample.cadence_rpm = Some(80.0),
                }
                sample
            })
            .collect()
    }

    fn summary_for(samples: &[Sample]) -> WorkoutSummary {
        let mut builder = SummaryBuilder::new();
        for sample in samples {
            builder.push(sample);
        }
        builder.finish(&UserProfile::default())
    }

    fn encode(kind: EquipmentKind, count: usize) -> Vec<u8> {
        let workout = test_workout(kind, count as i64 + 1);
        let samples = test_samples(kind, count);
        let summary = summary_for(&samples);
        FitActivityEncoder::new()
            .encode_activity(&workout, &samples, &summary)
            .unwrap()
    }

    // ── structure ───────────────────────────────────────────────────────

    #[test]
    fn should_write_14_byte_header_with_signature_and_patched_size() {
        let file = encode(EquipmentKind::Bike, 10);

        assert_eq!(file[0] as usize, HEADER_LEN);
        assert_eq!(file[1], PROTOCOL_VERSION);
        assert_eq!(&file[8..12], DATA_TYPE_SIGNATURE);

        let data_size = u32::from_le_bytes([file[4], file[5], file[6], file[7]]) as usize;
        assert_eq!(data_size, file.len() - HEADER_LEN - 2);

        let header_crc = u16::from_le_bytes([file[12], file[13]]);
        assert_eq!(header_crc, crc::checksum(&file[..12]));
    }

    #[test]
    fn should_append_valid_trailing_crc() {
        let file = encode(EquipmentKind::Bike, 5);
        let trailing = u16::from_le_bytes([file[file.len() - 2], file[file.len() - 1]]);
        assert_eq!(trailing, crc::checksum(&file[..file.len() - 2]));
    }

    #[test]
    fn should_emit_one_record_per_sample() {
        let file = encode(EquipmentKind::Bike, 17);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let records = messages.iter().filter(|(g, _)| *g == mesg_num::RECORD).count();
        assert_eq!(records, 17);
    }

    #[test]
    fn should_order_messages_per_activity_shape() {
        let file = encode(EquipmentKind::Bike, 3);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let globals: Vec<u16> = messages.iter().map(|(g, _)| *g).collect();

        assert_eq!(globals[0], mesg_num::FILE_ID);
        assert_eq!(globals[1], mesg_num::DEVICE_INFO);
        assert_eq!(globals[2], mesg_num::EVENT);
        assert_eq!(globals[globals.len() - 3], mesg_num::LAP);
        assert_eq!(globals[globals.len() - 2], mesg_num::SESSION);
        assert_eq!(globals[globals.len() - 1], mesg_num::ACTIVITY);
    }

    #[test]
    fn should_identify_with_recognized_manufacturer() {
        let file = encode(EquipmentKind::Bike, 3);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let file_id = first_message(&messages, mesg_num::FILE_ID);
        assert_eq!(file_id[&1], u64::from(identity::MANUFACTURER_GARMIN));
        assert_eq!(file_id[&2], u64::from(identity::PRODUCT_EDGE_530));
        assert_eq!(file_id[&0], u64::from(crate::profile::FILE_TYPE_ACTIVITY));
    }

    // ── units & sentinels ───────────────────────────────────────────────

    #[test]
    fn should_convert_session_avg_speed_from_kph_to_mm_per_s() {
        let workout = test_workout(EquipmentKind::Bike, 60);
        let samples = test_samples(EquipmentKind::Bike, 3);
        let mut summary = summary_for(&samples);
        summary.avg_speed_kph = Some(36.0);

        let file = FitActivityEncoder::new()
            .encode_activity(&workout, &samples, &summary)
            .unwrap();
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let session = first_message(&messages, mesg_num::SESSION);

        // 36 km/h = 10 m/s → 10000 at scale 1000. The historical ×3.6
        // defect would read 36000 here.
        assert_eq!(session[&14], 10_000);
    }

    #[test]
    fn should_write_record_speed_in_mm_per_s() {
        let file = encode(EquipmentKind::Bike, 1);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let record = first_message(&messages, mesg_num::RECORD);
        // 25.2 km/h = 7 m/s → 7000.
        assert_eq!(record[&6], 7_000);
        // 7 m distance at scale 100.
        assert_eq!(record[&5], 700);
        assert_eq!(record[&7], 150);
        assert_eq!(record[&3], 140);
        assert_eq!(record[&4], 80);
    }

    #[test]
    fn should_write_invalid_sentinels_for_absent_fields() {
        let workout = test_workout(EquipmentKind::Bike, 10);
        let samples = vec![Sample::empty((START_UNIX_S + 1) * 1_000_000, EquipmentKind::Bike)];
        let summary = summary_for(&samples);

        let file = FitActivityEncoder::new()
            .encode_activity(&workout, &samples, &summary)
            .unwrap();
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let record = first_message(&messages, mesg_num::RECORD);

        assert_eq!(record[&5], u64::from(invalid::U32));
        assert_eq!(record[&6], u64::from(invalid::U16));
        assert_eq!(record[&7], u64::from(invalid::U16));
        assert_eq!(record[&3], u64::from(invalid::U8));
        assert_eq!(record[&4], u64::from(invalid::U8));
    }

    #[test]
    fn should_write_fit_epoch_timestamps() {
        let file = encode(EquipmentKind::Bike, 1);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let record = first_message(&messages, mesg_num::RECORD);
        let expected = u64::try_from(START_UNIX_S + 1 - FIT_EPOCH_OFFSET_S).unwrap();
        assert_eq!(record[&253], expected);
    }

    #[test]
    fn should_mark_bike_as_indoor_cycling() {
        let file = encode(EquipmentKind::Bike, 3);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let session = first_message(&messages, mesg_num::SESSION);
        assert_eq!(session[&5], u64::from(sport::CYCLING));
        assert_eq!(session[&6], u64::from(sub_sport::INDOOR_CYCLING));
    }

    #[test]
    fn should_mark_rower_as_indoor_rowing_with_stroke_cadence() {
        let file = encode(EquipmentKind::Rower, 3);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let session = first_message(&messages, mesg_num::SESSION);
        assert_eq!(session[&5], u64::from(sport::ROWING));
        assert_eq!(session[&6], u64::from(sub_sport::INDOOR_ROWING));
        // avg cadence carried from the stroke rate.
        assert_eq!(session[&18], 25);

        let record = first_message(&messages, mesg_num::RECORD);
        assert_eq!(record[&4], 25);
    }

    #[test]
    fn should_write_session_totals_within_summary_tolerance() {
        let file = encode(EquipmentKind::Bike, 10);
        let messages = parse_body(&file[HEADER_LEN..file.len() - 2]);
        let session = first_message(&messages, mesg_num::SESSION);

        // Last sample carried 70 m; scale 100.
        assert_eq!(session[&9], 7_000);
        // 11 s wall duration at scale 1000.
        assert_eq!(session[&7], 11_000);
        assert_eq!(session[&8], 11_000);
        // One lap.
        assert_eq!(session[&26], 1);
    }

    // ── refusal paths ───────────────────────────────────────────────────

    #[test]
    fn should_refuse_workout_without_samples() {
        let workout = test_workout(EquipmentKind::Bike, 10);
        let result =
            FitActivityEncoder::new().encode_activity(&workout, &[], &WorkoutSummary::default());
        assert_eq!(result.unwrap_err(), FitEncodeError::EmptyWorkout);
    }

    #[test]
    fn should_refuse_workout_without_end_time() {
        let mut workout = test_workout(EquipmentKind::Bike, 10);
        workout.ended_at = None;
        let samples = test_samples(EquipmentKind::Bike, 2);
        let summary = summary_for(&samples);
        let result = FitActivityEncoder::new().encode_activity(&workout, &samples, &summary);
        assert_eq!(result.unwrap_err(), FitEncodeError::MissingEndTime);
    }

    #[test]
    fn should_refuse_pre_epoch_timestamps() {
        let mut workout = test_workout(EquipmentKind::Bike, 10);
        workout.started_at = fitbridge_domain::time::from_micros(0).unwrap();
        let samples = test_samples(EquipmentKind::Bike, 2);
        let summary = summary_for(&samples);
        let result = FitActivityEncoder::new().encode_activity(&workout, &samples, &summary);
        assert_eq!(result.unwrap_err(), FitEncodeError::TimestampOutOfRange);
    }

    #[test]
    fn should_produce_file_larger_than_two_kib_for_ten_minutes() {
        // 600 records ≈ a 10-minute ride.
        let file = encode(EquipmentKind::Bike, 600);
        assert!(file.len() >= 2_048, "file only {} bytes", file.len());
    }
}
