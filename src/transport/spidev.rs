/// Linux spidev backend
///
/// Drives the bus through /dev/spidevX.Y using the kernel's userspace SPI
/// interface.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::trace;
use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

use super::{Transport, MAX_TRANSFER_LEN, validate_transfer_len};
use crate::error::Error;

/// Clock rate the reader chip is driven at.
pub const BUS_SPEED_HZ: u32 = 2_300_000;

static BUS_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Linux spidev transport
///
/// Owns the device handle and a scratch buffer sized once at open time; the
/// throwaway side of every transfer (discarded read bytes, repeated filler
/// bytes) lives there, so steady-state transfers never allocate.
pub struct SpiBus {
    dev: Spidev,
    path: PathBuf,
    scratch: [u8; MAX_TRANSFER_LEN],
}

impl SpiBus {
    /// Open and configure the given spidev node.
    ///
    /// Mode 0 (clock idle low, sample on the rising edge), 8 bits per word,
    /// 2.3 MHz. Only one handle may exist per process at a time; a second
    /// open returns `DeviceBusy`. spidev cannot exclude other processes, so
    /// cross-process sharing is left to the operator.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        if BUS_CLAIMED
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(Error::DeviceBusy);
        }
        match Self::open_claimed(path.as_ref()) {
            Ok(bus) => Ok(bus),
            Err(err) => {
                BUS_CLAIMED.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn open_claimed(path: &Path) -> Result<Self, Error> {
        let mut dev = Spidev::open(path).map_err(Error::DeviceUnavailable)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(BUS_SPEED_HZ)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        dev.configure(&options).map_err(Error::ConfigurationFailed)?;
        trace!("opened {} at {} Hz, mode 0", path.display(), BUS_SPEED_HZ);
        Ok(Self {
            dev,
            path: path.to_path_buf(),
            scratch: [0u8; MAX_TRANSFER_LEN],
        })
    }

    /// Device node this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for SpiBus {
    fn transfer_write(&mut self, tx: &[u8]) -> Result<(), Error> {
        validate_transfer_len(tx.len())?;
        let Self { dev, scratch, .. } = self;
        let rx = &mut scratch[..tx.len()];
        let mut transfer = SpidevTransfer::read_write(tx, rx);
        dev.transfer(&mut transfer).map_err(Error::TransferFailed)?;
        trace!("spi out {} / in {}", hex::encode(tx), hex::encode(&rx[..]));
        Ok(())
    }

    fn transfer_read(&mut self, rx: &mut [u8], filler: u8) -> Result<(), Error> {
        validate_transfer_len(rx.len())?;
        let Self { dev, scratch, .. } = self;
        let tx = &mut scratch[..rx.len()];
        tx.fill(filler);
        let mut transfer = SpidevTransfer::read_write(tx, rx);
        dev.transfer(&mut transfer).map_err(Error::TransferFailed)?;
        trace!("spi in {} (filler {:#04X})", hex::encode(&rx[..]), filler);
        Ok(())
    }
}

impl Drop for SpiBus {
    fn drop(&mut self) {
        // Close errors are not observable through File teardown; the claim
        // release is the part that must not be skipped.
        BUS_CLAIMED.store(false, Ordering::Release);
        trace!("released {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_open_releases_the_claim() {
        let first = SpiBus::open("/dev/spidev-does-not-exist");
        assert!(matches!(first, Err(Error::DeviceUnavailable(_))));

        // A leaked claim would turn this into DeviceBusy.
        let second = SpiBus::open("/dev/spidev-does-not-exist");
        assert!(matches!(second, Err(Error::DeviceUnavailable(_))));
    }
}
