use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, ValueEnum};
use libtagdump::dump::BLOCK_COUNT;
use libtagdump::reader::pn532::Pn532;
use libtagdump::transport::spidev::SpiBus;
use libtagdump::{CardDumper, KeySlot, PassOutcome, TagReader, UNIVERSAL_KEY};
use log::{Level, error, info};

/// Pause after a failed pass before trying the bus again.
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "mifare_cli", version = "1.0")]
struct Args {
    /// SPI device node the reader is wired to
    #[arg(long, default_value = "/dev/spidev0.0")]
    device: PathBuf,

    /// Sector key as 12 hex digits (defaults to the factory key)
    #[arg(long)]
    key: Option<String>,

    /// Key slot to authenticate with
    #[arg(long, value_enum, default_value_t = KeySlotArg::B)]
    key_slot: KeySlotArg,

    /// Write the dumped card image (unread blocks zero-filled) to this file
    #[arg(long)]
    out: Option<PathBuf>,

    /// Stop after the first completed dump instead of waiting for more cards
    #[arg(long)]
    once: bool,

    /// Raise verbosity (-v protocol steps, -vv raw bus traffic)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KeySlotArg {
    A,
    B,
}

impl From<KeySlotArg> for KeySlot {
    fn from(slot: KeySlotArg) -> Self {
        match slot {
            KeySlotArg::A => KeySlot::A,
            KeySlotArg::B => KeySlot::B,
        }
    }
}

fn parse_key(text: &str) -> Result<[u8; 6]> {
    let bytes = hex::decode(text).context("key must be hex digits")?;
    if bytes.len() != 6 {
        return Err(anyhow!("key must be 12 hex digits, got {}", text.len()));
    }
    let mut key = [0u8; 6];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.quiet {
        Level::Warn
    } else {
        match args.verbose {
            0 => Level::Info,
            1 => Level::Debug,
            _ => Level::Trace,
        }
    };
    simple_logger::init_with_level(level)?;

    let key = match &args.key {
        Some(text) => parse_key(text)?,
        None => UNIVERSAL_KEY,
    };

    let bus = SpiBus::open(&args.device)?;
    let mut reader = Pn532::new(bus);
    reader.init()?;

    let version = reader
        .firmware_version()
        .context("didn't find a PN53x board")?;
    info!("found chip PN5{:02X}", version.ic);
    info!("firmware ver. {}.{}", version.version, version.revision);

    // Keep the chip hunting for targets until one actually shows up.
    reader.set_passive_retries(0xFF)?;

    let mut dumper = CardDumper::new(reader).with_key(args.key_slot.into(), key);

    loop {
        match dumper.run_pass() {
            Ok(PassOutcome::Dumped(report)) => {
                info!(
                    "dumped {} of {} blocks from card {}",
                    report.read_count(),
                    BLOCK_COUNT,
                    report.uid
                );
                if let Some(path) = &args.out {
                    let mut file = File::create(path)?;
                    file.write_all(&report.image())?;
                    info!("card image written to {}", path.display());
                }
                if args.once {
                    break;
                }
            }
            // No card or a non-classic one; the engine already logged it
            // and the next pass waits again.
            Ok(_) => {}
            Err(err) => {
                error!("{err}");
                thread::sleep(RETRY_DELAY);
            }
        }
    }

    Ok(())
}
