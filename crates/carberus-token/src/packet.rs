//! Decrypted token packet layout.

use carberus_core::constants::{
    COMMAND_OFFSET, COMMAND_UNLOCK, COUNTER_LEN, COUNTER_OFFSET, DEVICE_ID_LEN, DEVICE_ID_OFFSET,
    PADDING_LEN, PADDING_OFFSET, TOKEN_PAYLOAD_LEN,
};
use std::fmt;

/// Plaintext content of a key fob payload.
///
/// Decoding cannot fail: every 16-byte block maps to some packet. Whether the
/// packet is acceptable is decided later by the command and replay checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenPacket {
    /// Key fob identifier. Only used when replay state is kept per device.
    pub device_id: [u8; DEVICE_ID_LEN],
    /// Anti-replay counter, incremented by the fob on every press.
    pub counter: u32,
    pub command: u8,
    pub padding: [u8; PADDING_LEN],
}

impl TokenPacket {
    /// Unlock request with zero padding.
    pub fn unlock(device_id: [u8; DEVICE_ID_LEN], counter: u32) -> Self {
        Self {
            device_id,
            counter,
            command: COMMAND_UNLOCK,
            padding: [0; PADDING_LEN],
        }
    }

    /// Decode a decrypted block.
    pub fn from_block(block: &[u8; TOKEN_PAYLOAD_LEN]) -> Self {
        let mut device_id = [0u8; DEVICE_ID_LEN];
        device_id.copy_from_slice(&block[DEVICE_ID_OFFSET..DEVICE_ID_OFFSET + DEVICE_ID_LEN]);

        let mut counter = [0u8; COUNTER_LEN];
        counter.copy_from_slice(&block[COUNTER_OFFSET..COUNTER_OFFSET + COUNTER_LEN]);

        let mut padding = [0u8; PADDING_LEN];
        padding.copy_from_slice(&block[PADDING_OFFSET..PADDING_OFFSET + PADDING_LEN]);

        Self {
            device_id,
            counter: u32::from_le_bytes(counter),
            command: block[COMMAND_OFFSET],
            padding,
        }
    }

    /// Encode into a plaintext block.
    pub fn to_block(&self) -> [u8; TOKEN_PAYLOAD_LEN] {
        let mut block = [0u8; TOKEN_PAYLOAD_LEN];
        block[DEVICE_ID_OFFSET..DEVICE_ID_OFFSET + DEVICE_ID_LEN].copy_from_slice(&self.device_id);
        block[COUNTER_OFFSET..COUNTER_OFFSET + COUNTER_LEN]
            .copy_from_slice(&self.counter.to_le_bytes());
        block[COMMAND_OFFSET] = self.command;
        block[PADDING_OFFSET..PADDING_OFFSET + PADDING_LEN].copy_from_slice(&self.padding);
        block
    }

    pub fn is_unlock(&self) -> bool {
        self.command == COMMAND_UNLOCK
    }

    /// Device id as lowercase hex, for logs.
    pub fn device_hex(&self) -> String {
        hex::encode(self.device_id)
    }
}

impl fmt::Display for TokenPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "device={} counter={} command={:#04x}",
            self.device_hex(),
            self.counter,
            self.command
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_little_endian() {
        let mut block = [0u8; TOKEN_PAYLOAD_LEN];
        block[4] = 0x01;
        block[5] = 0x02;
        block[8] = 0x01;

        let packet = TokenPacket::from_block(&block);
        assert_eq!(packet.counter, 0x0201);
        assert!(packet.is_unlock());
    }

    #[test]
    fn test_field_offsets() {
        let block: [u8; TOKEN_PAYLOAD_LEN] = [
            0xDE, 0xAD, 0xBE, 0xEF, // device id
            0x09, 0x00, 0x00, 0x00, // counter
            0x02, // command
            1, 2, 3, 4, 5, 6, 7, // padding
        ];

        let packet = TokenPacket::from_block(&block);
        assert_eq!(packet.device_id, [0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(packet.counter, 9);
        assert_eq!(packet.command, 2);
        assert!(!packet.is_unlock());
        assert_eq!(packet.padding, [1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(packet.to_block(), block);
    }

    #[test]
    fn test_unlock_constructor() {
        let packet = TokenPacket::unlock([1, 2, 3, 4], u32::MAX);
        assert!(packet.is_unlock());
        assert_eq!(packet.padding, [0; PADDING_LEN]);
        assert_eq!(&packet.to_block()[4..8], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_display() {
        let packet = TokenPacket::unlock([0x0a, 0x0b, 0x0c, 0x0d], 42);
        assert_eq!(
            packet.to_string(),
            "device=0a0b0c0d counter=42 command=0x01"
        );
    }
}
