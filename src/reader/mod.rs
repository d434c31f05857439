/// Tag reader abstraction - chip-driver implementations
///
/// This module defines the card-level trait the dump engine runs on and the
/// types crossing that seam. The PN532 driver lives in the submodule.

use std::fmt;
use std::time::Duration;

use bitflags::bitflags;

use crate::error::Error;

pub mod pn532;

/// Bytes per Mifare Classic block.
pub const BLOCK_SIZE: usize = 16;

/// Factory default key blank Mifare Classic cards ship with.
///
/// Provisioned cards carry their own per-sector key sets; this constant is
/// only the out-of-the-box value, not a general key scheme.
pub const UNIVERSAL_KEY: [u8; 6] = [0xFF; 6];

/// Mifare key slot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    A,
    B,
}

bitflags! {
    /// Protocols a chip firmware reports support for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SupportedProtocols: u8 {
        const ISO14443A = 1;
        const ISO14443B = 1 << 1;
        const ISO18092 = 1 << 2;
    }
}

/// Decoded firmware identity of the reader chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    pub support: SupportedProtocols,
}

impl FirmwareVersion {
    /// Decode the four response bytes of a firmware query.
    pub fn from_bytes(raw: [u8; 4]) -> Self {
        Self {
            ic: raw[0],
            version: raw[1],
            revision: raw[2],
            support: SupportedProtocols::from_bits_truncate(raw[3]),
        }
    }

    /// Rebuild from the packed word form
    /// (`IC << 24 | Ver << 16 | Rev << 8 | Support`).
    pub fn from_word(word: u32) -> Self {
        Self::from_bytes(word.to_be_bytes())
    }

    /// Packed word form.
    pub fn to_word(self) -> u32 {
        u32::from_be_bytes([self.ic, self.version, self.revision, self.support.bits()])
    }
}

/// Card UID as reported by target enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardUid {
    bytes: [u8; 7],
    len: u8,
}

impl CardUid {
    /// Wraps a UID reported by the chip.
    ///
    /// Type A UIDs come in 4 and 7 byte sizes here; anything else returns
    /// `None` and is treated as a malformed response by the driver.
    pub fn new(uid: &[u8]) -> Option<Self> {
        if uid.len() != 4 && uid.len() != 7 {
            return None;
        }
        let mut bytes = [0u8; 7];
        bytes[..uid.len()].copy_from_slice(uid);
        Some(Self {
            bytes,
            len: uid.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Four-byte UIDs are the Mifare Classic family.
    pub fn is_classic(&self) -> bool {
        self.len == 4
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.as_bytes()))
    }
}

/// Whether `block` starts its sector.
///
/// Classic layout: sectors of 4 blocks over the first 128 blocks, sectors of
/// 16 past that (the large card variants).
pub fn is_first_block(block: u8) -> bool {
    if block < 128 {
        block % 4 == 0
    } else {
        block % 16 == 0
    }
}

/// Common tag reader trait
///
/// Abstracts the contactless chip operations the dump engine needs, so the
/// same walk logic runs against hardware and against test doubles.
pub trait TagReader {
    /// Query the chip identity and firmware revision.
    fn firmware_version(&mut self) -> Result<FirmwareVersion, Error>;

    /// Set how many times the chip retries passive target activation.
    ///
    /// # Arguments
    /// * `retries` - Retry count, `0xFF` meaning retry until a target shows
    fn set_passive_retries(&mut self, retries: u8) -> Result<(), Error>;

    /// Wait for a type A target to enter the field.
    ///
    /// Returns `None` when nothing showed up within `timeout`; that is an
    /// expected outcome, not an error.
    fn detect_card(&mut self, timeout: Duration) -> Result<Option<CardUid>, Error>;

    /// Authenticate the sector containing `block`.
    ///
    /// # Arguments
    /// * `uid` - UID of the present card, bound into the handshake
    /// * `block` - Block whose sector is being opened
    /// * `slot` - Key A or key B
    /// * `key` - Six key bytes
    fn authenticate_block(
        &mut self,
        uid: &CardUid,
        block: u8,
        slot: KeySlot,
        key: &[u8; 6],
    ) -> Result<(), Error>;

    /// Read one block into `data`.
    fn read_block(&mut self, block: u8, data: &mut [u8; BLOCK_SIZE]) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_word_decode() {
        let version = FirmwareVersion::from_word(0x01040207);
        assert_eq!(version.ic, 0x01);
        assert_eq!(version.version, 4);
        assert_eq!(version.revision, 2);
        assert_eq!(
            version.support,
            SupportedProtocols::ISO14443A
                | SupportedProtocols::ISO14443B
                | SupportedProtocols::ISO18092
        );
        assert_eq!(version.to_word(), 0x01040207);
    }

    #[test]
    fn test_firmware_bytes_match_word_form() {
        // A real PN532 reports IC 0x32.
        let version = FirmwareVersion::from_bytes([0x32, 0x01, 0x06, 0x07]);
        assert_eq!(version.to_word(), 0x32010607);
    }

    #[test]
    fn test_uid_lengths() {
        let classic = CardUid::new(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert!(classic.is_classic());
        assert_eq!(classic.len(), 4);
        assert_eq!(classic.as_bytes(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(classic.to_string(), "deadbeef");

        let double = CardUid::new(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert!(!double.is_classic());
        assert_eq!(double.len(), 7);

        assert!(CardUid::new(&[1, 2, 3]).is_none());
        assert!(CardUid::new(&[0; 10]).is_none());
    }

    #[test]
    fn test_first_block_layout() {
        for block in 0..64u8 {
            assert_eq!(is_first_block(block), block % 4 == 0, "block {block}");
        }
        assert!(is_first_block(128));
        assert!(!is_first_block(130));
        assert!(is_first_block(144));
    }
}
