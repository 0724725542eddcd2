//! Voltage and current monitors: INA219 and MAX11644.

use log::debug;

use super::Bus;
use crate::Result;

const INA219_CONFIG: u8 = 0x00;
const INA219_SHUNT: u8 = 0x01;
const INA219_BUS: u8 = 0x02;
/// 32 V bus range, 320 mV shunt range, 12-bit conversions, continuous.
const INA219_DEFAULT_CONFIG: u16 = 0x399f;

/// Shunt voltage LSB in volts.
const SHUNT_LSB: f64 = 10e-6;
/// Bus voltage LSB in volts.
const BUS_LSB: f64 = 4e-3;

pub fn shunt_volts(raw: [u8; 2]) -> f64 {
    i16::from_be_bytes(raw) as f64 * SHUNT_LSB
}

/// The bus voltage occupies bits 15..3.
pub fn bus_volts(raw: [u8; 2]) -> f64 {
    (u16::from_be_bytes(raw) >> 3) as f64 * BUS_LSB
}

/// INA219 high side current and power monitor.
pub struct Ina219<'a, B> {
    bus: &'a mut B,
    addr: u8,
}

impl<'a, B: Bus> Ina219<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self { bus, addr }
    }

    pub fn init(&mut self) -> Result<()> {
        let [hi, lo] = INA219_DEFAULT_CONFIG.to_be_bytes();
        self.bus.send(self.addr, &[INA219_CONFIG, hi, lo])
    }

    pub fn read_shunt(&mut self) -> Result<f64> {
        Ok(shunt_volts(self.bus.read_reg(self.addr, INA219_SHUNT)?))
    }

    pub fn read_bus(&mut self) -> Result<f64> {
        Ok(bus_volts(self.bus.read_reg(self.addr, INA219_BUS)?))
    }
}

/// Setup byte: VDD reference, internal clock, unipolar, keep configuration.
const MAX11644_SETUP: u8 = 0x82;
/// Configuration byte: scan AIN0 through AIN1, single ended.
const MAX11644_CONFIG: u8 = 0x03;

/// MAX11644 two channel 12-bit ADC referenced to its supply.
pub struct Max11644<'a, B> {
    bus: &'a mut B,
    addr: u8,
    vref: f64,
}

impl<'a, B: Bus> Max11644<'a, B> {
    pub const VDD: f64 = 3.3;

    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self {
            bus,
            addr,
            vref: Self::VDD,
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.bus
            .send(self.addr, &[MAX11644_SETUP, MAX11644_CONFIG])
    }

    /// Both channels in volts.
    pub fn read_volts(&mut self) -> Result<(f64, f64)> {
        let mut raw = [0u8; 4];
        self.bus.recv(self.addr, &mut raw)?;
        let code = |hi: u8, lo: u8| (((hi & 0x0f) as u16) << 8) | lo as u16;
        let (c0, c1) = (code(raw[0], raw[1]), code(raw[2], raw[3]));
        debug!("max11644 codes {c0} {c1}");
        let scale = self.vref / 4096.0;
        Ok((c0 as f64 * scale, c1 as f64 * scale))
    }
}
