//! DS28CM00 silicon serial number.

use super::Bus;
use crate::{Error, Result};

pub const FAMILY_CODE: u8 = 0x70;

/// Dallas/Maxim 1-Wire CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8_maxim(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &byte| {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 1;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8c;
            }
            b >>= 1;
        }
        crc
    })
}

pub struct Ds28cm00<'a, B> {
    bus: &'a mut B,
    addr: u8,
}

impl<'a, B: Bus> Ds28cm00<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self { bus, addr }
    }

    /// The 48-bit serial number, after family code and CRC checks.
    pub fn read_sn(&mut self) -> Result<u64> {
        let rom: [u8; 8] = self.bus.read_reg(self.addr, 0x00)?;
        if rom[0] != FAMILY_CODE {
            return Err(Error::I2c {
                addr: self.addr,
                msg: format!("family code {:#04x}, expected {FAMILY_CODE:#04x}", rom[0]),
            });
        }
        let crc = crc8_maxim(&rom[..7]);
        if crc != rom[7] {
            return Err(Error::I2c {
                addr: self.addr,
                msg: format!("serial number crc {:#04x}, computed {crc:#04x}", rom[7]),
            });
        }
        // serial bytes are stored least significant first
        Ok(rom[1..7]
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}
