//! The slice of the FIT global profile this encoder emits.
//!
//! Numeric values come from the published FIT profile; only the messages
//! and enums needed for an indoor activity file are defined here.

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET_S: i64 = 631_065_600;

/// 14-byte header variant (with header CRC).
pub const HEADER_LEN: usize = 14;

/// Protocol version 1.0.
pub const PROTOCOL_VERSION: u8 = 0x10;

/// Profile version 21.32.
pub const PROFILE_VERSION: u16 = 2132;

/// `".FIT"` data-type signature carried in the header.
pub const DATA_TYPE_SIGNATURE: &[u8; 4] = b".FIT";

/// Base types (with the endian-ability bit where the profile sets it).
pub mod base_type {
    pub const ENUM: u8 = 0x00;
    pub const UINT8: u8 = 0x02;
    pub const UINT16: u8 = 0x84;
    pub const UINT32: u8 = 0x86;
    pub const UINT32Z: u8 = 0x8C;
}

/// "Invalid" sentinels, one per base-type width.
pub mod invalid {
    pub const U8: u8 = 0xFF;
    pub const U16: u16 = 0xFFFF;
    pub const U32: u32 = 0xFFFF_FFFF;
}

/// Global message numbers.
pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
    pub const ACTIVITY: u16 = 34;
}

/// `file` enum — only the activity file type is produced.
pub const FILE_TYPE_ACTIVITY: u8 = 4;

pub mod sport {
    pub const CYCLING: u8 = 2;
    pub const ROWING: u8 = 15;
}

pub mod sub_sport {
    pub const INDOOR_CYCLING: u8 = 6;
    pub const INDOOR_ROWING: u8 = 14;
}

/// Manufacturer / product identifying the generating tool.
///
/// Garmin only computes training load for files from a recognized
/// manufacturer; a "development" manufacturer yields zero load, so the
/// file identifies as a Garmin Edge 530.
pub mod identity {
    pub const MANUFACTURER_GARMIN: u16 = 1;
    pub const PRODUCT_EDGE_530: u16 = 3121;
    pub const SERIAL_NUMBER: u32 = 0x1263_9A7B;
    /// Scale 100 — reads as firmware 9.75.
    pub const SOFTWARE_VERSION: u16 = 975;
}

pub mod event {
    pub const TIMER: u8 = 0;
    pub const ACTIVITY: u8 = 26;
}

pub mod event_type {
    pub const START: u8 = 0;
    pub const STOP: u8 = 1;
    pub const STOP_ALL: u8 = 4;
}

pub const LAP_TRIGGER_SESSION_END: u8 = 7;
pub const SESSION_TRIGGER_ACTIVITY_END: u8 = 0;
pub const ACTIVITY_TYPE_MANUAL: u8 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_place_fit_epoch_at_end_of_1989() {
        // 1989-12-31T00:00:00Z in Unix seconds.
        assert_eq!(FIT_EPOCH_OFFSET_S, 631_065_600);
    }

    #[test]
    fn should_keep_signature_ascii() {
        assert_eq!(DATA_TYPE_SIGNATURE, b".FIT");
    }

    #[test]
    fn should_use_recognized_manufacturer() {
        // Anything else breaks Garmin-side training load.
        assert_eq!(identity::MANUFACTURER_GARMIN, 1);
        assert_ne!(identity::PRODUCT_EDGE_530, 0);
    }
}
