//! Si7051 digital temperature sensor.

use super::Bus;
use crate::Result;

/// Measure temperature, hold master mode.
const MEASURE_HOLD: u8 = 0xe3;
const READ_ID_1: [u8; 2] = [0xfa, 0x0f];
const READ_ID_2: [u8; 2] = [0xfc, 0xc9];

/// Converts a raw 16-bit measurement to degrees Celsius.
pub fn code_to_celsius(code: u16) -> f64 {
    175.72 * code as f64 / 65536.0 - 46.85
}

pub struct Si7051<'a, B> {
    bus: &'a mut B,
    addr: u8,
}

impl<'a, B: Bus> Si7051<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub fn read_temp(&mut self) -> Result<f64> {
        let raw: [u8; 2] = self.bus.read_reg(self.addr, MEASURE_HOLD)?;
        Ok(code_to_celsius(u16::from_be_bytes(raw)))
    }

    /// 64-bit electronic serial number. CRC bytes interleaved in the reply are dropped.
    pub fn serial_number(&mut self) -> Result<u64> {
        let mut sna = [0u8; 8];
        self.bus.send_recv(self.addr, &READ_ID_1, &mut sna)?;
        let mut snb = [0u8; 6];
        self.bus.send_recv(self.addr, &READ_ID_2, &mut snb)?;
        let bytes = [sna[0], sna[2], sna[4], sna[6], snb[0], snb[1], snb[3], snb[4]];
        Ok(u64::from_be_bytes(bytes))
    }
}
