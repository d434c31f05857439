/// Card dump engine
///
/// Walks every block of a detected Mifare Classic card, re-authenticating at
/// sector boundaries, and reports exactly one outcome per block. Block-level
/// failures are contained; the walk always covers the whole card.

use std::time::Duration;

use log::{info, warn};

use crate::error::Error;
use crate::reader::{BLOCK_SIZE, CardUid, KeySlot, TagReader, UNIVERSAL_KEY, is_first_block};

/// Blocks on a Mifare Classic 1K card.
pub const BLOCK_COUNT: usize = 64;
/// Blocks per sector on the small card layout.
pub const BLOCKS_PER_SECTOR: u8 = 4;

/// Default window to wait for a card before giving the pass up.
const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(1);

/// What happened to one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Authenticated and read.
    Data([u8; BLOCK_SIZE]),
    /// Sector authentication failed, the block was never read.
    SkippedUnauthenticated,
    /// Authenticated but the chip rejected the read.
    ReadFailed,
}

/// Result of one dump pass.
#[derive(Debug)]
pub enum PassOutcome {
    /// Nothing entered the field within the timeout.
    NoCard,
    /// A card answered but is not a 4-byte-UID classic card.
    UnsupportedCard(CardUid),
    /// A classic card was walked block by block.
    Dumped(DumpReport),
}

/// Record of a completed walk, one outcome per block in block order.
#[derive(Debug)]
pub struct DumpReport {
    pub uid: CardUid,
    pub blocks: Vec<BlockOutcome>,
}

impl DumpReport {
    /// Blocks that produced data.
    pub fn read_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|outcome| matches!(outcome, BlockOutcome::Data(_)))
            .count()
    }

    /// Flat card image, unread blocks zero-filled to keep offsets aligned.
    pub fn image(&self) -> Vec<u8> {
        let mut image = vec![0u8; BLOCK_COUNT * BLOCK_SIZE];
        for (block, outcome) in self.blocks.iter().enumerate() {
            if let BlockOutcome::Data(data) = outcome {
                image[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE].copy_from_slice(data);
            }
        }
        image
    }
}

/// Card dump engine - works with any tag reader
pub struct CardDumper<R: TagReader> {
    reader: R,
    key: [u8; 6],
    key_slot: KeySlot,
    detect_timeout: Duration,
}

impl<R: TagReader> CardDumper<R> {
    /// Engine with the factory-default key on slot B.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            key: UNIVERSAL_KEY,
            key_slot: KeySlot::B,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
        }
    }

    /// Use a specific key and slot for every sector.
    pub fn with_key(mut self, slot: KeySlot, key: [u8; 6]) -> Self {
        self.key = key;
        self.key_slot = slot;
        self
    }

    /// Adjust how long one pass waits for a card.
    pub fn with_detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    /// Access the reader between passes.
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// One detect-and-dump pass.
    ///
    /// Detection problems propagate; block-level failures are downgraded to
    /// outcomes in the report, so one bad sector never aborts the walk.
    pub fn run_pass(&mut self) -> Result<PassOutcome, Error> {
        let Some(uid) = self.reader.detect_card(self.detect_timeout)? else {
            info!("timed out waiting for a card");
            return Ok(PassOutcome::NoCard);
        };

        info!("found a card, uid {} ({} bytes)", uid, uid.len());
        if !uid.is_classic() {
            warn!("not a mifare classic card (uid length {})", uid.len());
            return Ok(PassOutcome::UnsupportedCard(uid));
        }
        info!("mifare classic card (4 byte uid)");

        Ok(PassOutcome::Dumped(self.dump_blocks(uid)))
    }

    fn dump_blocks(&mut self, uid: CardUid) -> DumpReport {
        let mut blocks = Vec::with_capacity(BLOCK_COUNT);
        let mut authenticated = false;
        let mut sector_given_up = false;
        let mut data = [0u8; BLOCK_SIZE];

        for block in 0..BLOCK_COUNT as u8 {
            // Sector boundary: the previous session never carries over.
            if is_first_block(block) {
                authenticated = false;
                sector_given_up = false;
                info!(
                    "------------------------ sector {} ------------------------",
                    block / BLOCKS_PER_SECTOR
                );
            }

            // One authentication attempt per sector; a failure skips the
            // rest of it.
            if !authenticated && !sector_given_up {
                match self
                    .reader
                    .authenticate_block(&uid, block, self.key_slot, &self.key)
                {
                    Ok(()) => authenticated = true,
                    Err(err) => {
                        warn!("authentication error: {err}");
                        sector_given_up = true;
                    }
                }
            }

            let outcome = if !authenticated {
                warn!("block {block}: skipped, unauthenticated");
                BlockOutcome::SkippedUnauthenticated
            } else {
                match self.reader.read_block(block, &mut data) {
                    Ok(()) => {
                        info!("block {block:2}: {}", hex::encode(data));
                        BlockOutcome::Data(data)
                    }
                    // The session survives a rejected read; the next block
                    // may still work.
                    Err(err) => {
                        warn!("block {block}: {err}");
                        BlockOutcome::ReadFailed
                    }
                }
            };
            blocks.push(outcome);
        }

        DumpReport { uid, blocks }
    }
}
