//! Reassembly of FTMS records split across notifications.
//!
//! When a machine cannot fit a record into one notification it sets the
//! `More Data` bit and sends the remaining fields in follow-up
//! notifications. Each fragment carries its own flags word; the full
//! record's flags are the union, and the field bytes are concatenated in
//! arrival order. The `More Data` bit is cleared on the assembled record
//! so the instantaneous-speed / stroke fields parse as present.
//!
//! State is per characteristic and must be reset on disconnect.

use crate::codec::RecordParseError;

/// Per-characteristic fragment assembler.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    flags: u16,
    fields: Vec<u8>,
    buffering: bool,
    discarded: u64,
}

impl FragmentBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one notification payload.
    ///
    /// Returns the assembled record once a terminating fragment arrives,
    /// `None` while buffering. A fresh starting fragment while a buffer is
    /// already open discards the old buffer (counted in
    /// [`discarded`](Self::discarded)) and starts over.
    ///
    /// # Errors
    ///
    /// Returns [`RecordParseError::MissingFlags`] for a payload shorter
    /// than the flags field.
    pub fn push(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, RecordParseError> {
        if payload.len() < 2 {
            return Err(RecordParseError::MissingFlags);
        }
        let flags = u16::from_le_bytes([payload[0], payload[1]]);
        let more_data = flags & 1 != 0;

        if more_data {
            if self.buffering {
                self.discarded += 1;
                tracing::warn!("new fragmented record started mid-assembly, discarding buffer");
            }
            self.buffering = true;
            self.flags = flags;
            self.fields.clear();
            self.fields.extend_from_slice(&payload[2..]);
            return Ok(None);
        }

        if !self.buffering {
            // Unfragmented record — pass through untouched.
            return Ok(Some(payload.to_vec()));
        }

        self.flags |= flags;
        self.fields.extend_from_slice(&payload[2..]);

        // The More Data bit only marked fragmentation; the assembled
        // record has every promised field, so the bit is cleared.
        let assembled_flags = self.flags & !1;
        let mut record = assembled_flags.to_le_bytes().to_vec();
        record.append(&mut self.fields);

        self.buffering = false;
        self.flags = 0;
        Ok(Some(record))
    }

    /// Drop any partial record, e.g. on disconnect.
    pub fn reset(&mut self) {
        self.buffering = false;
        self.flags = 0;
        self.fields.clear();
    }

    /// Number of partial records discarded because a new one started.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn should_pass_through_unfragmented_record() {
        let mut buffer = FragmentBuffer::new();
        let payload = vec![0x00, 0x00, 0xE8, 0x03];
        let record = buffer.push(&payload).unwrap().unwrap();
        assert_eq!(record, payload);
    }

    #[test]
    fn should_assemble_two_fragments_into_one_record() {
        let mut buffer = FragmentBuffer::new();

        // Fragment 1: flags 0x0001 (More Data) + speed bytes.
        assert_eq!(buffer.push(&[0x01, 0x00, 0xE8, 0x03]).unwrap(), None);

        // Fragment 2: flags with power bit, terminating.
        let flags2 = codec::ibd_flags::INST_POWER.to_le_bytes();
        let record = buffer
            .push(&[flags2[0], flags2[1], 0x96, 0x00])
            .unwrap()
            .unwrap();

        // Exactly one sample, with speed from fragment 1 and power from
        // fragment 2.
        let sample = codec::decode_indoor_bike(&record).unwrap();
        assert_eq!(sample.instant_speed_kph, Some(10.0));
        assert_eq!(sample.instant_power_w, Some(150));
    }

    #[test]
    fn should_clear_more_data_bit_on_assembled_record() {
        let mut buffer = FragmentBuffer::new();
        buffer.push(&[0x01, 0x00, 0xE8, 0x03]).unwrap();
        let record = buffer.push(&[0x00, 0x00]).unwrap().unwrap();
        let flags = u16::from_le_bytes([record[0], record[1]]);
        assert_eq!(flags & 1, 0);

        let sample = codec::decode_indoor_bike(&record).unwrap();
        assert_eq!(sample.instant_speed_kph, Some(10.0));
    }

    #[test]
    fn should_discard_stale_buffer_when_new_record_starts() {
        let mut buffer = FragmentBuffer::new();
        buffer.push(&[0x01, 0x00, 0xAA, 0xAA]).unwrap();

        // A second starting fragment before the first completed.
        buffer.push(&[0x01, 0x00, 0xE8, 0x03]).unwrap();
        assert_eq!(buffer.discarded(), 1);

        // The replacement assembles cleanly.
        let record = buffer.push(&[0x00, 0x00]).unwrap().unwrap();
        let sample = codec::decode_indoor_bike(&record).unwrap();
        assert_eq!(sample.instant_speed_kph, Some(10.0));
    }

    #[test]
    fn should_reset_partial_state() {
        let mut buffer = FragmentBuffer::new();
        buffer.push(&[0x01, 0x00, 0xAA, 0xAA]).unwrap();
        buffer.reset();

        // After reset an unfragmented record passes straight through.
        let record = buffer.push(&[0x00, 0x00, 0xE8, 0x03]).unwrap().unwrap();
        assert_eq!(record, vec![0x00, 0x00, 0xE8, 0x03]);
        assert_eq!(buffer.discarded(), 0);
    }

    #[test]
    fn should_reject_fragment_shorter_than_flags() {
        let mut buffer = FragmentBuffer::new();
        assert_eq!(
            buffer.push(&[0x01]),
            Err(RecordParseError::MissingFlags)
        );
    }
}
