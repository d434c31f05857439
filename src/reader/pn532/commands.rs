/// Command and parameter definitions for the PN532 host protocol

use crate::reader::KeySlot;

/// Host command codes (first payload byte after the direction marker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    GetFirmwareVersion = 0x02,
    SamConfiguration = 0x14,
    RfConfiguration = 0x32,
    InDataExchange = 0x40,
    InListPassiveTarget = 0x4A,
}

impl Command {
    /// Command code on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Code the chip echoes back in its response frame.
    pub fn response_code(self) -> u8 {
        self.code() + 1
    }
}

/// Control bytes that prefix every SPI access to the chip.
pub mod control {
    /// Host is about to clock a command frame out.
    pub const DATA_WRITE: u8 = 0x01;
    /// Host asks for the one-byte ready status.
    pub const STATUS_READ: u8 = 0x02;
    /// Host is about to clock a response frame in.
    pub const DATA_READ: u8 = 0x03;
    /// Ready bit within the status byte.
    pub const READY: u8 = 0x01;
}

/// Mifare Classic command set, passed through InDataExchange.
pub mod mifare {
    /// Authenticate the sector of a block with key slot A.
    pub const AUTH_A: u8 = 0x60;
    /// Authenticate the sector of a block with key slot B.
    pub const AUTH_B: u8 = 0x61;
    /// Read one 16-byte block.
    pub const READ: u8 = 0x30;
}

/// Fixed parameter bytes for the commands above.
pub mod params {
    /// SAMConfiguration: normal mode, no SAM in the signal path.
    pub const SAM_NORMAL_MODE: u8 = 0x01;
    /// SAMConfiguration: watchdog timeout in 50 ms units (one second).
    pub const SAM_TIMEOUT_1S: u8 = 0x14;
    /// SAMConfiguration: drive the IRQ line.
    pub const SAM_USE_IRQ: u8 = 0x01;
    /// RFConfiguration item selecting the MaxRetries block.
    pub const CFG_ITEM_MAX_RETRIES: u8 = 0x05;
    /// MxRtyATR left at its power-up value.
    pub const MAX_RETRIES_ATR: u8 = 0xFF;
    /// MxRtyPSL left at its power-up value.
    pub const MAX_RETRIES_PSL: u8 = 0x01;
    /// InListPassiveTarget baud selector for 106 kbps type A.
    pub const BAUD_ISO14443A_106KBPS: u8 = 0x00;
    /// InListPassiveTarget: enumerate at most one target.
    pub const MAX_TARGETS: u8 = 0x01;
    /// InDataExchange target number of the single enumerated card.
    pub const TARGET_1: u8 = 0x01;
}

/// First payload byte of an InDataExchange response.
pub mod status {
    pub const OK: u8 = 0x00;
    /// Mifare authentication rejected (wrong key for the sector).
    pub const MIFARE_AUTH_REJECTED: u8 = 0x14;
}

/// Mifare authentication opcode for a key slot.
pub fn mifare_auth_command(slot: KeySlot) -> u8 {
    match slot {
        KeySlot::A => mifare::AUTH_A,
        KeySlot::B => mifare::AUTH_B,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::GetFirmwareVersion.code(), 0x02);
        assert_eq!(Command::GetFirmwareVersion.response_code(), 0x03);
        assert_eq!(Command::InListPassiveTarget.code(), 0x4A);
        assert_eq!(Command::InListPassiveTarget.response_code(), 0x4B);
        assert_eq!(Command::InDataExchange.response_code(), 0x41);
    }

    #[test]
    fn test_auth_command_per_slot() {
        assert_eq!(mifare_auth_command(KeySlot::A), mifare::AUTH_A);
        assert_eq!(mifare_auth_command(KeySlot::B), mifare::AUTH_B);
    }
}
