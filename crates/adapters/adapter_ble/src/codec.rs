//! FTMS record decoders for Indoor Bike Data and Rower Data.
//!
//! Pure functions operating on raw `&[u8]` slices — no BLE dependency
//! needed. Both characteristics share the same shape: a 2-byte
//! little-endian flags field followed by optional fields, each present
//! only when its flag bit is set. "Data Not Available" sentinels map to
//! absent, never to zero.
//!
//! Unknown flag bits (13–15) are tolerated: the known prefix is parsed and
//! any trailing bytes are ignored.

use btleplug::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

use fitbridge_domain::device::EquipmentKind;
use fitbridge_domain::sample::Sample;

/// Fitness Machine Service UUID.
pub const SERVICE_FTMS: Uuid = uuid_from_u16(0x1826);

/// NOTIFY — Indoor Bike Data characteristic.
pub const CHAR_INDOOR_BIKE_DATA: Uuid = uuid_from_u16(0x2AD2);

/// NOTIFY — Rower Data characteristic.
pub const CHAR_ROWER_DATA: Uuid = uuid_from_u16(0x2AD1);

/// Indoor Bike Data flag bits (FTMS v1.0, table 4.9).
pub mod ibd_flags {
    /// When **clear**, the instantaneous speed field is present.
    pub const MORE_DATA: u16 = 1 << 0;
    pub const AVG_SPEED: u16 = 1 << 1;
    pub const INST_CADENCE: u16 = 1 << 2;
    pub const AVG_CADENCE: u16 = 1 << 3;
    pub const TOTAL_DISTANCE: u16 = 1 << 4;
    pub const RESISTANCE: u16 = 1 << 5;
    pub const INST_POWER: u16 = 1 << 6;
    pub const AVG_POWER: u16 = 1 << 7;
    pub const EXPENDED_ENERGY: u16 = 1 << 8;
    pub const HEART_RATE: u16 = 1 << 9;
    pub const METABOLIC_EQUIVALENT: u16 = 1 << 10;
    pub const ELAPSED_TIME: u16 = 1 << 11;
    pub const REMAINING_TIME: u16 = 1 << 12;
}

/// Rower Data flag bits (FTMS v1.0, table 4.8).
pub mod rd_flags {
    /// When **clear**, stroke rate and stroke count are present.
    pub const MORE_DATA: u16 = 1 << 0;
    pub const AVG_STROKE_RATE: u16 = 1 << 1;
    pub const TOTAL_DISTANCE: u16 = 1 << 2;
    pub const INST_PACE: u16 = 1 << 3;
    pub const AVG_PACE: u16 = 1 << 4;
    pub const INST_POWER: u16 = 1 << 5;
    pub const AVG_POWER: u16 = 1 << 6;
    pub const RESISTANCE: u16 = 1 << 7;
    pub const EXPENDED_ENERGY: u16 = 1 << 8;
    pub const HEART_RATE: u16 = 1 << 9;
    pub const METABOLIC_EQUIVALENT: u16 = 1 << 10;
    pub const ELAPSED_TIME: u16 = 1 << 11;
    pub const REMAINING_TIME: u16 = 1 << 12;
}

/// "Data Not Available" sentinel for UINT16 fields (total energy, pace).
const NOT_AVAILABLE_U16: u16 = 0xFFFF;

/// Why a record could not be decoded. Swallowed (with a counter) by the
/// notification loop — protocol errors never propagate to the UI.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordParseError {
    /// Fewer than the 2 bytes needed for the flags field.
    #[error("record too short for flags field")]
    MissingFlags,

    /// Flags promised a field the payload does not contain.
    #[error("truncated payload reading {field}")]
    Truncated { field: &'static str },

    /// The notification came from a characteristic we do not decode.
    #[error("unknown characteristic {0}")]
    UnknownCharacteristic(Uuid),
}

/// Little-endian field reader over a record payload.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], RecordParseError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(RecordParseError::Truncated { field });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, RecordParseError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, RecordParseError> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn i16(&mut self, field: &'static str) -> Result<i16, RecordParseError> {
        let bytes = self.take(2, field)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u24(&mut self, field: &'static str) -> Result<u32, RecordParseError> {
        let bytes = self.take(3, field)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }
}

/// Dispatch to the decoder for the given characteristic.
///
/// # Errors
///
/// Returns [`RecordParseError::UnknownCharacteristic`] for anything other
/// than IBD/RD, or a truncation error from the field reader.
pub fn decode(characteristic: Uuid, payload: &[u8]) -> Result<Sample, RecordParseError> {
    match characteristic {
        CHAR_INDOOR_BIKE_DATA => decode_indoor_bike(payload),
        CHAR_ROWER_DATA => decode_rower(payload),
        other => Err(RecordParseError::UnknownCharacteristic(other)),
    }
}

/// Decode one complete Indoor Bike Data record.
///
/// | Flag bit | Field | Wire type | Unit |
/// |----------|-------|-----------|------|
/// | !0 | Instantaneous speed | u16 | 0.01 km/h |
/// | 1 | Average speed | u16 | 0.01 km/h |
/// | 2 | Instantaneous cadence | u16 | 0.5 rpm |
/// | 3 | Average cadence | u16 | 0.5 rpm |
/// | 4 | Total distance | u24 | m |
/// | 5 | Resistance level | s16 | unitless |
/// | 6 | Instantaneous power | s16 | W |
/// | 7 | Average power | s16 | W |
/// | 8 | Total / per-hour / per-minute energy | u16+u16+u8 | kcal |
/// | 9 | Heart rate | u8 | bpm, 0 = absent |
/// | 10 | Metabolic equivalent | u8 | 0.1 MET |
/// | 11 | Elapsed time | u16 | s |
/// | 12 | Remaining time | u16 | s |
///
/// # Errors
///
/// Returns [`RecordParseError::Truncated`] when a flagged field is missing
/// from the payload.
pub fn decode_indoor_bike(payload: &[u8]) -> Result<Sample, RecordParseError> {
    if payload.len() < 2 {
        return Err(RecordParseError::MissingFlags);
    }
    let flags = u16::from_le_bytes([payload[0], payload[1]]);
    let mut cursor = Cursor::new(&payload[2..]);
    let mut sample = Sample::empty(0, EquipmentKind::Bike);

    if flags & ibd_flags::MORE_DATA == 0 {
        let raw = cursor.u16("instantaneous speed")?;
        sample.instant_speed_kph = Some(f64::from(raw) * 0.01);
    }
    if flags & ibd_flags::AVG_SPEED != 0 {
        // Server-side average; the summary recomputes its own.
        cursor.u16("average speed")?;
    }
    if flags & ibd_flags::INST_CADENCE != 0 {
        let raw = cursor.u16("instantaneous cadence")?;
        sample.cadence_rpm = Some(f64::from(raw) * 0.5);
    }
    if flags & ibd_flags::AVG_CADENCE != 0 {
        cursor.u16("average cadence")?;
    }
    if flags & ibd_flags::TOTAL_DISTANCE != 0 {
        sample.total_distance_m = Some(cursor.u24("total distance")?);
    }
    if flags & ibd_flags::RESISTANCE != 0 {
        sample.resistance_level = Some(cursor.i16("resistance level")?);
    }
    if flags & ibd_flags::INST_POWER != 0 {
        sample.instant_power_w = Some(cursor.i16("instantaneous power")?);
    }
    if flags & ibd_flags::AVG_POWER != 0 {
        sample.avg_power_w = Some(cursor.i16("average power")?);
    }
    if flags & ibd_flags::EXPENDED_ENERGY != 0 {
        read_energy(&mut cursor, &mut sample)?;
    }
    if flags & ibd_flags::HEART_RATE != 0 {
        sample.heart_rate_bpm = Sample::heart_rate_from_wire(cursor.u8("heart rate")?);
    }
    if flags & ibd_flags::METABOLIC_EQUIVALENT != 0 {
        cursor.u8("metabolic equivalent")?;
    }
    if flags & ibd_flags::ELAPSED_TIME != 0 {
        sample.elapsed_s = Some(cursor.u16("elapsed time")?);
    }
    if flags & ibd_flags::REMAINING_TIME != 0 {
        cursor.u16("remaining time")?;
    }
    // Bits 13-15 are reserved; any bytes they would govern are ignored.

    Ok(sample)
}

/// Decode one complete Rower Data record.
///
/// | Flag bit | Field | Wire type | Unit |
/// |----------|-------|-----------|------|
/// | !0 | Stroke rate + stroke count | u8+u16 | 0.5 spm / strokes |
/// | 1 | Average stroke rate | u8 | 0.5 spm |
/// | 2 | Total distance | u24 | m |
/// | 3 | Instantaneous pace | u16 | s per 500 m |
/// | 4 | Average pace | u16 | s per 500 m |
/// | 5 | Instantaneous power | s16 | W |
/// | 6 | Average power | s16 | W |
/// | 7 | Resistance level | s16 | unitless |
/// | 8 | Total / per-hour / per-minute energy | u16+u16+u8 | kcal |
/// | 9 | Heart rate | u8 | bpm, 0 = absent |
/// | 10 | Metabolic equivalent | u8 | 0.1 MET |
/// | 11 | Elapsed time | u16 | s |
/// | 12 | Remaining time | u16 | s |
///
/// Rowers transmit pace rather than speed; the instantaneous pace is
/// converted to km/h (`1800 / pace_s`) so the sample carries one speed
/// convention everywhere.
///
/// # Errors
///
/// Returns [`RecordParseError::Truncated`] when a flagged field is missing
/// from the payload.
pub fn decode_rower(payload: &[u8]) -> Result<Sample, RecordParseError> {
    if payload.len() < 2 {
        return Err(RecordParseError::MissingFlags);
    }
    let flags = u16::from_le_bytes([payload[0], payload[1]]);
    let mut cursor = Cursor::new(&payload[2..]);
    let mut sample = Sample::empty(0, EquipmentKind::Rower);

    if flags & rd_flags::MORE_DATA == 0 {
        let raw = cursor.u8("stroke rate")?;
        sample.stroke_rate_spm = Some(f64::from(raw) * 0.5);
        sample.stroke_count = Some(cursor.u16("stroke count")?);
    }
    if flags & rd_flags::AVG_STROKE_RATE != 0 {
        cursor.u8("average stroke rate")?;
    }
    if flags & rd_flags::TOTAL_DISTANCE != 0 {
        sample.total_distance_m = Some(cursor.u24("total distance")?);
    }
    if flags & rd_flags::INST_PACE != 0 {
        let pace_s = cursor.u16("instantaneous pace")?;
        if pace_s != 0 && pace_s != NOT_AVAILABLE_U16 {
            // s per 500 m → km/h
            sample.instant_speed_kph = Some(1800.0 / f64::from(pace_s));
        }
    }
    if flags & rd_flags::AVG_PACE != 0 {
        cursor.u16("average pace")?;
    }
    if flags & rd_flags::INST_POWER != 0 {
        sample.instant_power_w = Some(cursor.i16("instantaneous power")?);
    }
    if flags & rd_flags::AVG_POWER != 0 {
        sample.avg_power_w = Some(cursor.i16("average power")?);
    }
    if flags & rd_flags::RESISTANCE != 0 {
        sample.resistance_level = Some(cursor.i16("resistance level")?);
    }
    if flags & rd_flags::EXPENDED_ENERGY != 0 {
        read_energy(&mut cursor, &mut sample)?;
    }
    if flags & rd_flags::HEART_RATE != 0 {
        sample.heart_rate_bpm = Sample::heart_rate_from_wire(cursor.u8("heart rate")?);
    }
    if flags & rd_flags::METABOLIC_EQUIVALENT != 0 {
        cursor.u8("metabolic equivalent")?;
    }
    if flags & rd_flags::ELAPSED_TIME != 0 {
        sample.elapsed_s = Some(cursor.u16("elapsed time")?);
    }
    if flags & rd_flags::REMAINING_TIME != 0 {
        cursor.u16("remaining time")?;
    }

    Ok(sample)
}

/// The expended-energy group: total, per-hour, per-minute. Only the total
/// lands in the sample; the rates are consumed to keep the cursor aligned.
/// The per-minute field is a UINT8 (sentinel 0xFF), despite what some
/// machines' documentation claims.
fn read_energy(cursor: &mut Cursor<'_>, sample: &mut Sample) -> Result<(), RecordParseError> {
    let total = cursor.u16("total energy")?;
    if total != NOT_AVAILABLE_U16 {
        sample.total_energy_kcal = Some(total);
    }
    cursor.u16("energy per hour")?;
    cursor.u8("energy per minute")?;
    Ok(())
}
