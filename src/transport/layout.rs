// Shared memory slot layout
// 25 signed 32-bit slots, 100 bytes total. Slots 0-20 are publisher-owned
// and overwritten every tick; slots 21-24 are the consumer-owned command
// mailbox. The layout is a wire contract: do not reorder.

use crate::signal::EventKind;

/// Protocol version written to slot 0; consumers must reject mismatches
pub const PROTOCOL_VERSION: i32 = 1;

/// Number of i32 slots in the segment
pub const SLOT_COUNT: usize = 25;

/// Segment size in bytes
pub const SEGMENT_SIZE: usize = SLOT_COUNT * 4;

// Header
pub const SLOT_VERSION: usize = 0;
pub const SLOT_TIMESTAMP: usize = 1; // ms since transport start

// EEG basic
pub const SLOT_ATTENTION: usize = 2;
pub const SLOT_MEDITATION: usize = 3;
pub const SLOT_SIGNAL: usize = 4;

// Band powers
pub const SLOT_DELTA: usize = 5;
pub const SLOT_THETA: usize = 6;
pub const SLOT_LOW_ALPHA: usize = 7;
pub const SLOT_HIGH_ALPHA: usize = 8;
pub const SLOT_LOW_BETA: usize = 9;
pub const SLOT_HIGH_BETA: usize = 10;
pub const SLOT_LOW_GAMMA: usize = 11;
pub const SLOT_HIGH_GAMMA: usize = 12;

// Resolved event, as a wire code
pub const SLOT_EVENT_CODE: usize = 13;

// Gyro
pub const SLOT_GYRO_X: usize = 14;
pub const SLOT_GYRO_Y: usize = 15;
pub const SLOT_GYRO_Z: usize = 16;

// Extended device data
pub const SLOT_AP: usize = 17;
pub const SLOT_ELECTRIC: usize = 18;
pub const SLOT_TEMP: usize = 19;
pub const SLOT_HEART: usize = 20;

// Consumer -> publisher command mailbox
pub const SLOT_COMMAND_PENDING: usize = 21;
pub const SLOT_COMMAND_TYPE: usize = 22;
pub const SLOT_COMMAND_EVENT_CODE: usize = 23;
pub const SLOT_COMMAND_TIMESTAMP: usize = 24;

/// Commands a consumer can send through the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// Label the most recent sample and append it to the history store
    SaveEvent = 1,

    /// Label the most recent sample and queue it for classifier training
    SaveTraining = 2,
}

impl CommandType {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(CommandType::SaveEvent),
            2 => Some(CommandType::SaveTraining),
            _ => None,
        }
    }
}

/// Wire code for an optional event: `{none:0, ml:1, mr:2, mu:3, md:4, stop:5}`
pub fn event_to_code(event: Option<EventKind>) -> i32 {
    match event {
        None => 0,
        Some(EventKind::MoveLeft) => 1,
        Some(EventKind::MoveRight) => 2,
        Some(EventKind::MoveUp) => 3,
        Some(EventKind::MoveDown) => 4,
        Some(EventKind::Stop) => 5,
    }
}

/// Decode a wire code; 0 and unknown codes both decode to no event
pub fn event_from_code(code: i32) -> Option<EventKind> {
    match code {
        1 => Some(EventKind::MoveLeft),
        2 => Some(EventKind::MoveRight),
        3 => Some(EventKind::MoveUp),
        4 => Some(EventKind::MoveDown),
        5 => Some(EventKind::Stop),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_size() {
        assert_eq!(SEGMENT_SIZE, 100);
        assert_eq!(SLOT_COMMAND_TIMESTAMP, SLOT_COUNT - 1);
    }

    #[test]
    fn test_event_code_round_trip() {
        for kind in EventKind::ALL {
            let code = event_to_code(Some(kind));
            assert_eq!(event_from_code(code), Some(kind));
        }
        assert_eq!(event_to_code(None), 0);
        assert_eq!(event_from_code(0), None);
    }

    #[test]
    fn test_event_codes_are_fixed() {
        // Wire contract with existing consumers
        assert_eq!(event_to_code(Some(EventKind::MoveLeft)), 1);
        assert_eq!(event_to_code(Some(EventKind::MoveRight)), 2);
        assert_eq!(event_to_code(Some(EventKind::MoveUp)), 3);
        assert_eq!(event_to_code(Some(EventKind::MoveDown)), 4);
        assert_eq!(event_to_code(Some(EventKind::Stop)), 5);
    }

    #[test]
    fn test_unknown_event_code_decodes_to_none() {
        assert_eq!(event_from_code(6), None);
        assert_eq!(event_from_code(-1), None);
    }

    #[test]
    fn test_command_type_codes() {
        assert_eq!(CommandType::from_code(1), Some(CommandType::SaveEvent));
        assert_eq!(CommandType::from_code(2), Some(CommandType::SaveTraining));
        assert_eq!(CommandType::from_code(0), None);
        assert_eq!(CommandType::from_code(3), None);
        assert_eq!(CommandType::SaveTraining.code(), 2);
    }
}
