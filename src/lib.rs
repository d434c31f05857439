pub mod dump;
pub mod error;
pub mod gpio;
pub mod reader;
pub mod transport;

pub use dump::{BlockOutcome, CardDumper, DumpReport, PassOutcome};
pub use error::Error;
pub use gpio::{Direction, GpioPin};
pub use reader::pn532::Pn532;
pub use reader::{CardUid, FirmwareVersion, KeySlot, TagReader, UNIVERSAL_KEY};
pub use transport::Transport;
pub use transport::spidev::SpiBus;
