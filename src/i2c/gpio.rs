//! PCF8574 8-bit quasi-bidirectional port expander.

use super::Bus;
use crate::Result;

pub struct Pcf8574<'a, B> {
    bus: &'a mut B,
    addr: u8,
}

impl<'a, B: Bus> Pcf8574<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub fn read(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.recv(self.addr, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write(&mut self, value: u8) -> Result<()> {
        self.bus.send(self.addr, &[value])
    }
}
