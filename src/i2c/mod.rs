//! I2C access to the front-end peripherals.
//!
//! Drivers borrow a [`Bus`], which every `embedded-hal` blocking I2C implementation provides,
//! so the same code runs against `/dev/i2c-*` nodes and against test doubles.

use std::fmt::Debug;

use embedded_hal::blocking::i2c;
use linux_embedded_hal::I2cdev;
use log::info;

use crate::{Error, Result, config::BusConfig};

pub mod bar;
pub mod eeprom;
pub mod gpio;
pub mod motion;
pub mod sn;
pub mod temp;
pub mod volt;

#[cfg(test)]
pub(crate) mod mock;

/// Byte level I2C transactions with errors tagged by device address.
pub trait Bus {
    fn send(&mut self, addr: u8, bytes: &[u8]) -> Result<()>;

    fn recv(&mut self, addr: u8, buf: &mut [u8]) -> Result<()>;

    /// Write then read with a repeated start.
    fn send_recv(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<()>;

    fn read_reg<const N: usize>(&mut self, addr: u8, reg: u8) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.send_recv(addr, &[reg], &mut buf)?;
        Ok(buf)
    }
}

impl<T, E> Bus for T
where
    T: i2c::Write<Error = E> + i2c::Read<Error = E> + i2c::WriteRead<Error = E>,
    E: Debug,
{
    fn send(&mut self, addr: u8, bytes: &[u8]) -> Result<()> {
        i2c::Write::write(self, addr, bytes).map_err(Error::i2c(addr))
    }

    fn recv(&mut self, addr: u8, buf: &mut [u8]) -> Result<()> {
        i2c::Read::read(self, addr, buf).map_err(Error::i2c(addr))
    }

    fn send_recv(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<()> {
        i2c::WriteRead::write_read(self, addr, bytes, buf).map_err(Error::i2c(addr))
    }
}

/// Opens the Linux device node of a configured bus.
pub fn open_bus(cfg: &BusConfig, baud: u32) -> Result<I2cdev> {
    info!(
        "opening {} (sda gpio {}, scl gpio {}, {baud} baud)",
        cfg.device.display(),
        cfg.sda_pin,
        cfg.scl_pin
    );
    I2cdev::new(&cfg.device).map_err(|e| {
        Error::Config(format!(
            "cannot open {}: {e}; the bus is created by `{}` in /boot/config.txt",
            cfg.device.display(),
            cfg.overlay_hint(baud)
        ))
    })
}

/// Addresses scanned when probing, the range `i2cdetect` uses.
pub const PROBE_RANGE: std::ops::RangeInclusive<u8> = 0x03..=0x77;

/// Addresses that acknowledge a one byte read.
pub fn probe<B: Bus + ?Sized>(bus: &mut B) -> Vec<u8> {
    let mut buf = [0u8; 1];
    PROBE_RANGE
        .filter(|&addr| bus.recv(addr, &mut buf).is_ok())
        .collect()
}

/// Formats probe results as the familiar 16 column address grid.
pub fn probe_table(found: &[u8]) -> String {
    let mut out = String::from("     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f\n");
    for row in 0..8u8 {
        out.push_str(&format!("{:02x}:", row * 16));
        for col in 0..16u8 {
            let addr = row * 16 + col;
            if !PROBE_RANGE.contains(&addr) {
                out.push_str("   ");
            } else if found.contains(&addr) {
                out.push_str(&format!(" {addr:02x}"));
            } else {
                out.push_str(" --");
            }
        }
        out.push('\n');
    }
    out
}
