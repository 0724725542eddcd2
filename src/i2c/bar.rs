//! MS5611-01BA barometric pressure sensor.

use std::time::Duration;

use super::Bus;
use crate::Result;

const RESET: u8 = 0x1e;
const CONVERT_D1_4096: u8 = 0x48;
const CONVERT_D2_4096: u8 = 0x58;
const ADC_READ: u8 = 0x00;
const PROM_C1: u8 = 0xa2;
const CONVERSION_TIME: Duration = Duration::from_millis(10);

/// Sea level reference pressure in mbar.
pub const SEA_LEVEL_MBAR: f64 = 1013.25;

/// Factory calibration words C1..C6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration(pub [u16; 6]);

/// First order temperature: (TEMP in 0.01 C, dT).
pub fn compensate_temp(cal: &Calibration, d2: u32) -> (i64, i64) {
    let c = cal.0.map(i64::from);
    let dt = d2 as i64 - (c[4] << 8);
    let temp = 2000 + ((dt * c[5]) >> 23);
    (temp, dt)
}

/// Temperature compensated pressure in mbar, including the low temperature correction.
pub fn compensate_press(cal: &Calibration, d1: u32, temp: i64, dt: i64) -> f64 {
    let c = cal.0.map(i64::from);
    let mut off = (c[1] << 16) + ((c[3] * dt) >> 7);
    let mut sens = (c[0] << 15) + ((c[2] * dt) >> 8);
    if temp < 2000 {
        let cold = (temp - 2000) * (temp - 2000);
        let mut off2 = 5 * cold / 2;
        let mut sens2 = 5 * cold / 4;
        if temp < -1500 {
            let frozen = (temp + 1500) * (temp + 1500);
            off2 += 7 * frozen;
            sens2 += 11 * frozen / 2;
        }
        off -= off2;
        sens -= sens2;
    }
    let p = (((d1 as i64 * sens) >> 21) - off) >> 15;
    p as f64 / 100.0
}

/// Hypsometric altitude in metres above the sea level reference.
pub fn to_altitude(press_mbar: f64, temp_c: f64) -> f64 {
    ((SEA_LEVEL_MBAR / press_mbar).powf(1.0 / 5.257) - 1.0) * (temp_c + 273.15) / 0.0065
}

pub struct Ms5611<'a, B> {
    bus: &'a mut B,
    addr: u8,
    cal: Calibration,
}

impl<'a, B: Bus> Ms5611<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8) -> Self {
        Self {
            bus,
            addr,
            cal: Calibration::default(),
        }
    }

    /// Resets the sensor and loads its calibration PROM.
    pub fn init(&mut self) -> Result<()> {
        self.bus.send(self.addr, &[RESET])?;
        std::thread::sleep(Duration::from_millis(3));
        for i in 0..6 {
            let raw: [u8; 2] = self.bus.read_reg(self.addr, PROM_C1 + 2 * i as u8)?;
            self.cal.0[i] = u16::from_be_bytes(raw);
        }
        Ok(())
    }

    pub fn calibration(&self) -> Calibration {
        self.cal
    }

    fn convert(&mut self, cmd: u8) -> Result<u32> {
        self.bus.send(self.addr, &[cmd])?;
        std::thread::sleep(CONVERSION_TIME);
        let raw: [u8; 3] = self.bus.read_reg(self.addr, ADC_READ)?;
        Ok(u32::from_be_bytes([0, raw[0], raw[1], raw[2]]))
    }

    /// Returns (TEMP in 0.01 C, dT) for use by [`Ms5611::read_press`].
    pub fn read_temp_raw(&mut self) -> Result<(i64, i64)> {
        let d2 = self.convert(CONVERT_D2_4096)?;
        Ok(compensate_temp(&self.cal, d2))
    }

    pub fn read_press(&mut self, temp: i64, dt: i64) -> Result<f64> {
        let d1 = self.convert(CONVERT_D1_4096)?;
        Ok(compensate_press(&self.cal, d1, temp, dt))
    }
}
