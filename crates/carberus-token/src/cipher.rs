//! AES-128 single-block cipher shared with the key fob firmware.
//!
//! The fob encrypts its one-block payload with raw AES-128 (ECB over a
//! single block) and no authentication tag. Identical plaintexts therefore
//! produce identical ciphertexts, and a tampered block simply decrypts to
//! garbage; the anti-replay counter and the command byte are the only
//! integrity checks available. Moving to an AEAD needs a firmware change on
//! the fob and is tracked separately.

use crate::{TokenPacket, TokenRejection};
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use carberus_core::constants::{TOKEN_KEY_LEN, TOKEN_PAYLOAD_LEN};
use std::fmt;

/// Pre-shared key cipher for token payloads.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes128,
}

impl TokenCipher {
    pub fn new(key: &[u8; TOKEN_KEY_LEN]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Decrypt one payload block.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRejection::Decrypt`] if `payload` is not a single block.
    pub fn decrypt_block(&self, payload: &[u8]) -> Result<[u8; TOKEN_PAYLOAD_LEN], TokenRejection> {
        if payload.len() != TOKEN_PAYLOAD_LEN {
            return Err(TokenRejection::decrypt(format!(
                "block must be {TOKEN_PAYLOAD_LEN} bytes, got {}",
                payload.len()
            )));
        }

        let mut block = GenericArray::clone_from_slice(payload);
        self.cipher.decrypt_block(&mut block);

        let mut plain = [0u8; TOKEN_PAYLOAD_LEN];
        plain.copy_from_slice(&block);
        Ok(plain)
    }

    /// Encrypt one plaintext block.
    pub fn encrypt_block(&self, plain: &[u8; TOKEN_PAYLOAD_LEN]) -> [u8; TOKEN_PAYLOAD_LEN] {
        let mut block = GenericArray::clone_from_slice(plain);
        self.cipher.encrypt_block(&mut block);

        let mut sealed = [0u8; TOKEN_PAYLOAD_LEN];
        sealed.copy_from_slice(&block);
        sealed
    }

    /// Decrypt and decode a payload.
    ///
    /// # Errors
    ///
    /// Returns [`TokenRejection::Decrypt`] if the block cannot be decrypted.
    pub fn open(&self, payload: &[u8]) -> Result<TokenPacket, TokenRejection> {
        let block = self.decrypt_block(payload)?;
        Ok(TokenPacket::from_block(&block))
    }

    /// Encode and encrypt a packet the way the key fob does.
    pub fn seal(&self, packet: &TokenPacket) -> [u8; TOKEN_PAYLOAD_LEN] {
        self.encrypt_block(&packet.to_block())
    }
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carberus_core::constants::DEFAULT_TOKEN_KEY;

    #[test]
    fn test_fips197_vector() {
        // FIPS-197 appendix C.1, key 000102..0f.
        let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
        let plain: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let expected: [u8; 16] = [
            0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
            0xc5, 0x5a,
        ];

        assert_eq!(cipher.encrypt_block(&plain), expected);
        assert_eq!(cipher.decrypt_block(&expected).unwrap(), plain);
    }

    #[test]
    fn test_seal_then_open() {
        let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
        let packet = TokenPacket::unlock([9, 8, 7, 6], 1234);

        let sealed = cipher.seal(&packet);
        assert_ne!(sealed, packet.to_block());
        assert_eq!(cipher.open(&sealed).unwrap(), packet);
    }

    #[test]
    fn test_wrong_key_yields_different_packet() {
        let fob = TokenCipher::new(&DEFAULT_TOKEN_KEY);
        let ecu = TokenCipher::new(&[0x42; 16]);
        let packet = TokenPacket::unlock([0; 4], 5);

        let opened = ecu.open(&fob.seal(&packet)).unwrap();
        assert_ne!(opened, packet);
    }

    #[test]
    fn test_short_block_is_decrypt_error() {
        let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
        let result = cipher.decrypt_block(&[0u8; 8]);
        assert!(matches!(result, Err(TokenRejection::Decrypt { .. })));
    }

    #[test]
    fn test_debug_hides_key() {
        let cipher = TokenCipher::new(&DEFAULT_TOKEN_KEY);
        assert_eq!(format!("{cipher:?}"), "TokenCipher { .. }");
    }
}
