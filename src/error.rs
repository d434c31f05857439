use std::io;
use thiserror::Error as DeriveError;

#[derive(DeriveError, Debug)]
pub enum Error {
    #[error("Bus device unavailable: {0}")]
    DeviceUnavailable(#[source] io::Error),

    #[error("Bus device already claimed by this process")]
    DeviceBusy,

    #[error("Bus configuration rejected: {0}")]
    ConfigurationFailed(#[source] io::Error),

    #[error("Bus transfer failed: {0}")]
    TransferFailed(#[source] io::Error),

    #[error("Transfer length {0} outside 1..=1024")]
    InvalidTransferLength(usize),

    #[error("Chip did not acknowledge the command")]
    NoAck,

    #[error("Malformed response frame: {0}")]
    BadFrame(&'static str),

    #[error("Timed out waiting for the chip to become ready")]
    ResponseTimeout,

    #[error("Authentication rejected for block {block} (status {status:#04X})")]
    AuthenticationFailed { block: u8, status: u8 },

    #[error("Read failed for block {block} (status {status:#04X})")]
    ReadFailed { block: u8, status: u8 },

    #[error("GPIO access failed: {0}")]
    Gpio(#[source] io::Error),
}
