//! Board layout and connection settings.
//!
//! Every table here has a default matching the deployed hardware. A TOML file may override any
//! subset of fields:
//!
//! ```toml
//! [fem]
//! ina = 0x45
//!
//! [katcp]
//! port = 7147
//!
//! [[buses]]
//! device = "/dev/i2c-3"
//! sda_pin = 4
//! scl_pin = 14
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// KATCP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KatcpConfig {
    pub port: u16,
    /// Connect, read and write timeout.
    pub timeout_secs: f64,
}

impl Default for KatcpConfig {
    fn default() -> Self {
        Self {
            port: 7147,
            timeout_secs: 10.0,
        }
    }
}

/// One bit-banged I2C bus exposed by the `i2c-gpio` overlay.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BusConfig {
    pub device: PathBuf,
    pub sda_pin: u8,
    pub scl_pin: u8,
}

impl BusConfig {
    /// The `config.txt` line that creates this bus at the given bit rate.
    pub fn overlay_hint(&self, baud: u32) -> String {
        let bus = self
            .device
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("i2c-"))
            .unwrap_or("N");
        format!(
            "dtoverlay=i2c-gpio,bus={bus},i2c_gpio_sda={},i2c_gpio_scl={},i2c_gpio_delay_us={}",
            self.sda_pin,
            self.scl_pin,
            gpio_delay_us(baud)
        )
    }
}

/// Half clock period in microseconds, at least one.
pub fn gpio_delay_us(baud: u32) -> u32 {
    (500_000 / baud.max(1)).max(1)
}

/// Front-End Module device addresses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FemAddresses {
    pub imu: u8,
    pub bar: u8,
    pub rom: u8,
    pub temp: u8,
    pub ina: u8,
    pub gpio: u8,
}

impl Default for FemAddresses {
    fn default() -> Self {
        Self {
            imu: 0x69,
            bar: 0x77,
            rom: 0x51,
            temp: 0x40,
            ina: 0x45,
            gpio: 0x20,
        }
    }
}

/// Post-Amplifier Module device addresses.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PamAddresses {
    pub sn: u8,
    pub rom: u8,
    pub gpio: u8,
    pub adc: u8,
    pub ina: u8,
}

impl Default for PamAddresses {
    fn default() -> Self {
        Self {
            sn: 0x50,
            rom: 0x52,
            gpio: 0x21,
            adc: 0x36,
            ina: 0x44,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Buses in antenna order; `--i2c 1` selects the first.
    pub buses: Vec<BusConfig>,
    pub fem: FemAddresses,
    pub pam: PamAddresses,
    pub katcp: KatcpConfig,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let bus = |n: u8, sda_pin, scl_pin| BusConfig {
            device: PathBuf::from(format!("/dev/i2c-{n}")),
            sda_pin,
            scl_pin,
        };
        Self {
            buses: vec![bus(3, 4, 14), bus(4, 6, 12), bus(5, 16, 26)],
            fem: FemAddresses::default(),
            pam: PamAddresses::default(),
            katcp: KatcpConfig::default(),
        }
    }
}

impl BoardConfig {
    pub fn from_toml(text: &str) -> Result<BoardConfig> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<BoardConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Looks up a bus by its one-based number.
    pub fn bus(&self, number: usize) -> Result<&BusConfig> {
        number
            .checked_sub(1)
            .and_then(|i| self.buses.get(i))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "i2c bus {number} not configured, choose 1..={}",
                    self.buses.len()
                ))
            })
    }
}
