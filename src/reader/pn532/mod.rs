/// High-level PN532 driver
///
/// Implements the host link over any bus transport: command framing, ready
/// polling, acknowledge handling and the card operations the dump engine
/// consumes. The chip clocks SPI data LSB-first while the bus runs MSB-first
/// mode 0, so every byte is bit-reversed at this boundary.

use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::{BLOCK_SIZE, CardUid, FirmwareVersion, KeySlot, TagReader};
use crate::error::Error;
use crate::transport::{DEFAULT_FILLER, Transport};

pub mod commands;
mod frame;

use commands::{Command, control, mifare, params, status};

/// Interval between ready polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Deadline for command acknowledge and ordinary response readiness.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(1);
/// Settle time after waking the chip out of power-down.
const WAKEUP_DELAY: Duration = Duration::from_millis(2);
/// Bytes clocked past the expected end of a response frame.
const RESPONSE_SLACK: usize = 2;
/// Assembly buffer, sized for the largest exchange (target enumeration
/// response) plus overhead.
const BUF_LEN: usize = 64;

/// The chip shifts LSB-first, the bus MSB-first; applied to every byte in
/// both directions.
fn reverse_bits(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = byte.reverse_bits();
    }
}

/// PN532 driver - works with any transport
pub struct Pn532<T: Transport> {
    bus: T,
    buf: [u8; BUF_LEN],
}

impl<T: Transport> Pn532<T> {
    /// Create a driver on top of an opened transport.
    pub fn new(bus: T) -> Self {
        Self {
            bus,
            buf: [0u8; BUF_LEN],
        }
    }

    /// Release the underlying transport.
    pub fn into_inner(self) -> T {
        self.bus
    }

    /// Wake the chip and put the SAM in normal mode.
    pub fn init(&mut self) -> Result<(), Error> {
        // Step 1: any clocked activity with the chip selected leaves
        // power-down; one throwaway read does it, plus a settle delay.
        let mut scratch = [0u8; 1];
        self.bus.transfer_read(&mut scratch, DEFAULT_FILLER)?;
        thread::sleep(WAKEUP_DELAY);

        // Step 2: SAM to normal mode, watchdog at one second.
        let request = [
            Command::SamConfiguration.code(),
            params::SAM_NORMAL_MODE,
            params::SAM_TIMEOUT_1S,
            params::SAM_USE_IRQ,
        ];
        self.call(&request, &mut [])?;
        debug!("chip awake, sam in normal mode");
        Ok(())
    }

    /// Send a framed request and verify the chip acknowledged it.
    fn send_request(&mut self, request: &[u8]) -> Result<(), Error> {
        self.buf[0] = control::DATA_WRITE;
        let n = frame::build_command(request, &mut self.buf[1..]) + 1;
        reverse_bits(&mut self.buf[..n]);
        self.bus.transfer_write(&self.buf[..n])?;

        if !self.wait_ready(COMMAND_TIMEOUT)? {
            return Err(Error::ResponseTimeout);
        }
        self.read_ack()
    }

    /// Poll the status byte until the chip reports a pending frame.
    ///
    /// Returns false when `timeout` passes first; transport failures
    /// propagate.
    fn wait_ready(&mut self, timeout: Duration) -> Result<bool, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut ready = [0u8; 1];
            self.bus.write_then_read(
                &[control::STATUS_READ.reverse_bits()],
                &mut ready,
                DEFAULT_FILLER,
            )?;
            if ready[0].reverse_bits() & control::READY != 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn read_ack(&mut self) -> Result<(), Error> {
        let mut ack = [0u8; frame::ACK.len()];
        self.bus.write_then_read(
            &[control::DATA_READ.reverse_bits()],
            &mut ack,
            DEFAULT_FILLER,
        )?;
        reverse_bits(&mut ack);
        if !frame::is_ack(&ack) {
            return Err(Error::NoAck);
        }
        Ok(())
    }

    /// Clock in and verify a response frame, copying its data bytes to
    /// `out`. Returns how many data bytes the chip sent.
    fn read_response(&mut self, command: u8, out: &mut [u8]) -> Result<usize, Error> {
        // response code + frame overhead + slack for a shifted preamble
        let len = out.len() + 1 + frame::OVERHEAD + RESPONSE_SLACK;
        let rx = &mut self.buf[..len];
        self.bus
            .write_then_read(&[control::DATA_READ.reverse_bits()], rx, DEFAULT_FILLER)?;
        reverse_bits(rx);

        let payload = frame::parse_response(rx)?;
        let Some((&code, data)) = payload.split_first() else {
            return Err(Error::BadFrame("missing response code"));
        };
        if code != command + 1 {
            return Err(Error::BadFrame("response code mismatch"));
        }
        if data.len() > out.len() {
            return Err(Error::BadFrame("oversized response"));
        }
        out[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    /// Full exchange: request, acknowledge, response.
    fn call(&mut self, request: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        self.send_request(request)?;
        if !self.wait_ready(COMMAND_TIMEOUT)? {
            return Err(Error::ResponseTimeout);
        }
        self.read_response(request[0], out)
    }

    /// Abort a command the chip is still working on by writing the
    /// acknowledge frame.
    fn abort(&mut self) -> Result<(), Error> {
        let mut tx = [0u8; frame::ACK.len() + 1];
        tx[0] = control::DATA_WRITE;
        tx[1..].copy_from_slice(&frame::ACK);
        reverse_bits(&mut tx);
        self.bus.transfer_write(&tx)
    }
}

impl<T: Transport> TagReader for Pn532<T> {
    fn firmware_version(&mut self) -> Result<FirmwareVersion, Error> {
        let request = [Command::GetFirmwareVersion.code()];
        let mut raw = [0u8; 4];
        let n = self.call(&request, &mut raw)?;
        if n != raw.len() {
            return Err(Error::BadFrame("short firmware data"));
        }
        Ok(FirmwareVersion::from_bytes(raw))
    }

    fn set_passive_retries(&mut self, retries: u8) -> Result<(), Error> {
        let request = [
            Command::RfConfiguration.code(),
            params::CFG_ITEM_MAX_RETRIES,
            params::MAX_RETRIES_ATR,
            params::MAX_RETRIES_PSL,
            retries,
        ];
        self.call(&request, &mut [])?;
        debug!("passive activation retries set to {retries:#04X}");
        Ok(())
    }

    fn detect_card(&mut self, timeout: Duration) -> Result<Option<CardUid>, Error> {
        let request = [
            Command::InListPassiveTarget.code(),
            params::MAX_TARGETS,
            params::BAUD_ISO14443A_106KBPS,
        ];
        self.send_request(&request)?;

        if !self.wait_ready(timeout)? {
            // Leave nothing pending for the next pass.
            self.abort()?;
            return Ok(None);
        }

        // [targets, tag number, SENS_RES (2), SEL_RES, uid length, uid...,
        //  optional ATS]
        let mut data = [0u8; 32];
        let n = self.read_response(Command::InListPassiveTarget.code(), &mut data)?;
        if n == 0 {
            return Err(Error::BadFrame("short target data"));
        }
        if data[0] == 0 {
            return Ok(None);
        }
        if n < 6 {
            return Err(Error::BadFrame("short target data"));
        }
        debug!(
            "target up: sens_res {:02X}{:02X}, sel_res {:02X}",
            data[2], data[3], data[4]
        );
        let uid_len = data[5] as usize;
        if n < 6 + uid_len {
            return Err(Error::BadFrame("short target data"));
        }
        CardUid::new(&data[6..6 + uid_len])
            .map(Some)
            .ok_or(Error::BadFrame("unsupported uid length"))
    }

    fn authenticate_block(
        &mut self,
        uid: &CardUid,
        block: u8,
        slot: KeySlot,
        key: &[u8; 6],
    ) -> Result<(), Error> {
        let mut request = [0u8; 4 + 6 + 7];
        request[0] = Command::InDataExchange.code();
        request[1] = params::TARGET_1;
        request[2] = commands::mifare_auth_command(slot);
        request[3] = block;
        request[4..10].copy_from_slice(key);
        request[10..10 + uid.len()].copy_from_slice(uid.as_bytes());
        let request = &request[..10 + uid.len()];

        let mut response = [0u8; 1];
        let n = self.call(request, &mut response)?;
        if n == 0 {
            return Err(Error::BadFrame("missing status byte"));
        }
        if response[0] != status::OK {
            return Err(Error::AuthenticationFailed {
                block,
                status: response[0],
            });
        }
        Ok(())
    }

    fn read_block(&mut self, block: u8, data: &mut [u8; BLOCK_SIZE]) -> Result<(), Error> {
        let request = [
            Command::InDataExchange.code(),
            params::TARGET_1,
            mifare::READ,
            block,
        ];
        let mut response = [0u8; 1 + BLOCK_SIZE];
        let n = self.call(&request, &mut response)?;
        if n == 0 {
            return Err(Error::BadFrame("missing status byte"));
        }
        if response[0] != status::OK {
            return Err(Error::ReadFailed {
                block,
                status: response[0],
            });
        }
        if n < 1 + BLOCK_SIZE {
            return Err(Error::BadFrame("short block data"));
        }
        data.copy_from_slice(&response[1..]);
        Ok(())
    }
}
