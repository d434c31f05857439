/// Bus transport abstraction - hardware-specific implementations
///
/// This module defines the transaction-level trait the chip driver runs on
/// and provides the Linux spidev implementation.

use crate::error::Error;

pub mod spidev;

/// Largest transfer accepted in either direction, in bytes.
pub const MAX_TRANSFER_LEN: usize = 1024;

/// Byte clocked out during read transfers unless the caller overrides it.
pub const DEFAULT_FILLER: u8 = 0xFF;

/// Checks a transfer length against the accepted window.
///
/// Zero-length transfers are rejected rather than silently succeeding, so a
/// caller that sliced its buffer down to nothing hears about it.
pub fn validate_transfer_len(len: usize) -> Result<(), Error> {
    if len == 0 || len > MAX_TRANSFER_LEN {
        return Err(Error::InvalidTransferLength(len));
    }
    Ok(())
}

/// Common bus transport trait
///
/// Every operation is one full-duplex exchange: exactly as many bytes are
/// clocked in as out. Handles carry no timeout and cannot be cancelled; a
/// stalled device blocks the calling thread. `&mut self` receivers
/// serialize transfers on a handle; callers sharing a handle across threads
/// must wrap each whole logical operation in their own lock, not the
/// individual transfers.
pub trait Transport {
    /// Clock `tx` out on the bus.
    ///
    /// The bytes clocked back in are discarded (implementations may expose
    /// them to tracing). Lengths outside `1..=MAX_TRANSFER_LEN` are rejected
    /// with `InvalidTransferLength` before touching the device.
    ///
    /// # Arguments
    /// * `tx` - Bytes to send, 1 to 1024 of them
    fn transfer_write(&mut self, tx: &[u8]) -> Result<(), Error>;

    /// Clock filler bytes out and capture the device's response.
    ///
    /// # Arguments
    /// * `rx` - Caller-owned buffer the response is written into; its length
    ///   sets the transfer length and obeys the same window as writes
    /// * `filler` - Byte repeated on the write side of the exchange
    fn transfer_read(&mut self, rx: &mut [u8], filler: u8) -> Result<(), Error>;

    /// Write `tx`, then read `rx.len()` bytes in a second exchange.
    ///
    /// The read step is not attempted when the write step failed; the write
    /// error is returned as-is. Nothing else may interleave between the two
    /// steps on this handle, which `&mut self` guarantees in-process.
    fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8], filler: u8) -> Result<(), Error> {
        self.transfer_write(tx)?;
        self.transfer_read(rx, filler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockTransport {
        writes: Vec<Vec<u8>>,
        reads: usize,
        fail_write: bool,
    }

    impl Transport for MockTransport {
        fn transfer_write(&mut self, tx: &[u8]) -> Result<(), Error> {
            if self.fail_write {
                return Err(Error::TransferFailed(std::io::Error::other("injected")));
            }
            self.writes.push(tx.to_vec());
            Ok(())
        }

        fn transfer_read(&mut self, rx: &mut [u8], filler: u8) -> Result<(), Error> {
            self.reads += 1;
            rx.fill(filler);
            Ok(())
        }
    }

    #[test]
    fn test_write_then_read_runs_both_steps_in_order() {
        let mut bus = MockTransport::default();
        let mut rx = [0u8; 4];
        bus.write_then_read(&[0xAA, 0xBB], &mut rx, 0x5A).unwrap();
        assert_eq!(bus.writes, vec![vec![0xAA, 0xBB]]);
        assert_eq!(bus.reads, 1);
        assert_eq!(rx, [0x5A; 4]);
    }

    #[test]
    fn test_write_then_read_skips_read_after_failed_write() {
        let mut bus = MockTransport {
            fail_write: true,
            ..Default::default()
        };
        let mut rx = [0u8; 4];
        let err = bus.write_then_read(&[0xAA], &mut rx, 0xFF).unwrap_err();
        assert!(matches!(err, Error::TransferFailed(_)));
        assert_eq!(bus.reads, 0);
    }

    #[test]
    fn test_transfer_len_window() {
        assert!(validate_transfer_len(1).is_ok());
        assert!(validate_transfer_len(MAX_TRANSFER_LEN).is_ok());
        assert!(matches!(
            validate_transfer_len(0),
            Err(Error::InvalidTransferLength(0))
        ));
        assert!(matches!(
            validate_transfer_len(MAX_TRANSFER_LEN + 1),
            Err(Error::InvalidTransferLength(1025))
        ));
    }
}
