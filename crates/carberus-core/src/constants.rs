//! Core constants for the Carberus ECU.
//!
//! This module defines the wire-level and policy constants shared by every
//! crate in the workspace. Most of them are fixed by the firmware running on
//! the key fob and on the door controller (BCM), so changing them breaks
//! compatibility with deployed hardware.
//!
//! # Token Payload Layout
//!
//! The key fob advertises a single AES-128 block under its vendor-specific
//! manufacturer data. Once decrypted, the block is laid out as:
//!
//! ```text
//! ┌───────────┬────────────┬─────────┬───────────┐
//! │ device id │  counter   │ command │  padding  │
//! │  4 bytes  │ 4 bytes LE │ 1 byte  │  7 bytes  │
//! └───────────┴────────────┴─────────┴───────────┘
//! ```
//!
//! # Serial Protocol
//!
//! The BCM speaks newline-terminated ASCII at [`SERIAL_BAUD_RATE`]:
//!
//! | Direction | Line | Meaning |
//! |-----------|------|---------|
//! | ECU → BCM | `CMD_UNLOCK` | Unlock the door |
//! | BCM → ECU | `ACK:UNLOCKED` | Door unlocked |
//! | BCM → ECU | `ACK:LOCKED` | Door locked |
//! | BCM → ECU | `STATUS:TIMEOUT` | Auto-relock fired |
//!
//! # Usage
//!
//! ```
//! use carberus_core::constants::*;
//!
//! assert_eq!(TOKEN_PAYLOAD_LEN, 16);
//! assert_eq!(COUNTER_OFFSET + COUNTER_LEN, COMMAND_OFFSET);
//! ```

// ============================================================================
// Token Payload
// ============================================================================

/// Size of an encrypted token payload in bytes (one AES block).
pub const TOKEN_PAYLOAD_LEN: usize = 16;

/// Size of the pre-shared AES key in bytes.
pub const TOKEN_KEY_LEN: usize = 16;

/// Offset of the device identifier inside a decrypted payload.
pub const DEVICE_ID_OFFSET: usize = 0;

/// Length of the device identifier.
pub const DEVICE_ID_LEN: usize = 4;

/// Offset of the little-endian anti-replay counter.
pub const COUNTER_OFFSET: usize = 4;

/// Length of the anti-replay counter.
pub const COUNTER_LEN: usize = 4;

/// Offset of the command byte.
pub const COMMAND_OFFSET: usize = 8;

/// Offset of the trailing padding.
pub const PADDING_OFFSET: usize = 9;

/// Length of the trailing padding.
pub const PADDING_LEN: usize = 7;

/// Command byte requesting an unlock.
pub const COMMAND_UNLOCK: u8 = 1;

/// Pre-shared key burned into the demo key fob firmware.
///
/// Deployments are expected to override it through the `token.key`
/// configuration entry.
pub const DEFAULT_TOKEN_KEY: [u8; TOKEN_KEY_LEN] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];

/// Manufacturer id under which the key fob publishes its payload.
///
/// 0xFFFF is the Bluetooth SIG id reserved for testing.
pub const DEFAULT_MANUFACTURER_ID: u16 = 0xFFFF;

/// Capacity of the queue handing accepted token events to the control loop.
pub const DEFAULT_TOKEN_QUEUE_CAPACITY: usize = 64;

// ============================================================================
// Serial Protocol
// ============================================================================

/// Baud rate of the BCM serial link.
pub const SERIAL_BAUD_RATE: u32 = 9600;

/// Device paths probed, in order, when looking for the BCM.
pub const SERIAL_CANDIDATES: [&str; 2] = ["/dev/ttyACM0", "/dev/ttyUSB0"];

/// Outbound unlock command (without line terminator).
pub const CMD_UNLOCK: &str = "CMD_UNLOCK";

/// Inbound line sent by the BCM once the door is unlocked.
pub const ACK_UNLOCKED: &str = "ACK:UNLOCKED";

/// Inbound line sent by the BCM once the door is locked.
pub const ACK_LOCKED: &str = "ACK:LOCKED";

/// Inbound line sent by the BCM when the auto-relock timer fires.
pub const STATUS_TIMEOUT: &str = "STATUS:TIMEOUT";

/// Line terminator for both directions.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Longest inbound line accepted before the reader discards its buffer.
pub const MAX_STATUS_LINE_LEN: usize = 256;

// ============================================================================
// Biometric
// ============================================================================

/// Matches with a distance strictly below this value are accepted.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 60.0;

/// Default location of the enrolled template store.
pub const DEFAULT_TEMPLATE_PATH: &str = "trainer.json";

/// Identity labels indexed by enrolled identity id.
pub const DEFAULT_IDENTITY_LABELS: [&str; 4] = ["None", "User1", "User2", "User3"];

/// Prefix used for identity ids that have no configured label.
pub const UNKNOWN_IDENTITY_PREFIX: &str = "ID_";

// ============================================================================
// Camera
// ============================================================================

/// Default camera device node.
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Default capture width in pixels.
pub const DEFAULT_FRAME_WIDTH: u32 = 320;

/// Default capture height in pixels.
pub const DEFAULT_FRAME_HEIGHT: u32 = 240;

/// Upper bound on a single frame capture, in milliseconds.
///
/// The capture happens between two ticks, so its latency directly delays
/// token and serial handling.
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 200;

// ============================================================================
// Timing
// ============================================================================

/// Control loop tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 50;

/// Minimum time between two unlock commands, in milliseconds.
pub const DEFAULT_COOLDOWN_MS: u64 = 5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_layout_is_contiguous() {
        assert_eq!(DEVICE_ID_OFFSET + DEVICE_ID_LEN, COUNTER_OFFSET);
        assert_eq!(COUNTER_OFFSET + COUNTER_LEN, COMMAND_OFFSET);
        assert_eq!(COMMAND_OFFSET + 1, PADDING_OFFSET);
        assert_eq!(PADDING_OFFSET + PADDING_LEN, TOKEN_PAYLOAD_LEN);
    }

    #[test]
    fn test_serial_lines_are_distinct() {
        let lines = [CMD_UNLOCK, ACK_UNLOCKED, ACK_LOCKED, STATUS_TIMEOUT];
        for (i, a) in lines.iter().enumerate() {
            for b in &lines[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_cooldown_spans_many_ticks() {
        assert!(DEFAULT_COOLDOWN_MS > DEFAULT_TICK_MS * 10);
        assert!(DEFAULT_CAPTURE_TIMEOUT_MS < DEFAULT_COOLDOWN_MS);
    }
}
