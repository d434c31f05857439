/// Sysfs GPIO pin control
///
/// Optional chip-select / reset hooks for boards that wire them. The default
/// spidev wiring drives none of these, the kernel's native chip select
/// covers it.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::Error;

const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Signal direction of an exported pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_sysfs(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

/// An exported sysfs GPIO pin.
///
/// Exporting acquires the pin; dropping the value unexports it again on
/// every exit path. A failed unexport is logged and never panics.
#[derive(Debug)]
pub struct GpioPin {
    number: u32,
    root: PathBuf,
}

impl GpioPin {
    /// Export pin `number` through the default sysfs root.
    pub fn export(number: u32) -> Result<Self, Error> {
        Self::export_at(Path::new(SYSFS_GPIO_ROOT), number)
    }

    fn export_at(root: &Path, number: u32) -> Result<Self, Error> {
        fs::write(root.join("export"), number.to_string()).map_err(Error::Gpio)?;
        Ok(Self {
            number,
            root: root.to_path_buf(),
        })
    }

    /// Pin number as exported.
    pub fn number(&self) -> u32 {
        self.number
    }

    fn pin_file(&self, name: &str) -> PathBuf {
        self.root.join(format!("gpio{}", self.number)).join(name)
    }

    /// Configure the pin as input or output.
    pub fn set_direction(&self, direction: Direction) -> Result<(), Error> {
        fs::write(self.pin_file("direction"), direction.as_sysfs()).map_err(Error::Gpio)
    }

    /// Drive the pin high or low. Meaningful for output pins only.
    pub fn set_value(&self, high: bool) -> Result<(), Error> {
        fs::write(self.pin_file("value"), if high { "1" } else { "0" }).map_err(Error::Gpio)
    }
}

impl Drop for GpioPin {
    fn drop(&mut self) {
        if let Err(err) = fs::write(self.root.join("unexport"), self.number.to_string()) {
            warn!("failed to unexport gpio{}: {err}", self.number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("gpio7")).unwrap();
        dir
    }

    #[test]
    fn test_export_direction_value() {
        let sysfs = fake_sysfs();
        let pin = GpioPin::export_at(sysfs.path(), 7).unwrap();
        assert_eq!(pin.number(), 7);
        assert_eq!(
            fs::read_to_string(sysfs.path().join("export")).unwrap(),
            "7"
        );

        pin.set_direction(Direction::Out).unwrap();
        assert_eq!(
            fs::read_to_string(sysfs.path().join("gpio7/direction")).unwrap(),
            "out"
        );

        pin.set_value(true).unwrap();
        assert_eq!(
            fs::read_to_string(sysfs.path().join("gpio7/value")).unwrap(),
            "1"
        );
        pin.set_value(false).unwrap();
        assert_eq!(
            fs::read_to_string(sysfs.path().join("gpio7/value")).unwrap(),
            "0"
        );
    }

    #[test]
    fn test_drop_unexports() {
        let sysfs = fake_sysfs();
        let pin = GpioPin::export_at(sysfs.path(), 7).unwrap();
        drop(pin);
        assert_eq!(
            fs::read_to_string(sysfs.path().join("unexport")).unwrap(),
            "7"
        );
    }

    #[test]
    fn test_export_failure_maps_to_gpio_error() {
        let sysfs = tempfile::tempdir().unwrap();
        let err = GpioPin::export_at(&sysfs.path().join("missing"), 7).unwrap_err();
        assert!(matches!(err, Error::Gpio(_)));
    }
}
