//! Board pose from the MPU9250 accelerometer.

use std::time::Duration;

use log::warn;

use super::Bus;
use crate::{Error, Result};

const PWR_MGMT_1: u8 = 0x6b;
const ACCEL_CONFIG: u8 = 0x1c;
const ACCEL_XOUT_H: u8 = 0x3b;
const WHO_AM_I: u8 = 0x75;
const SLEEP: u8 = 0x40;
const KNOWN_IDS: [u8; 2] = [0x71, 0x73];
/// LSB per g in the +-2 g range.
const ACCEL_SCALE: f64 = 16384.0;

/// Sensor axes as seen from the FEM enclosure.
pub const FEM_ORIENTATION: [[f64; 3]; 3] = [[0.0, 0.0, 1.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]];

/// Angles in degrees of the gravity vector expressed in the board frame.
///
/// `orient` rows are the board axes in sensor coordinates and need not be normalised.
/// `theta` is measured from the board z axis and `phi` in the board x-y plane.
pub fn pose_from_accel(orient: &[[f64; 3]; 3], accel: [f64; 3]) -> Result<(f64, f64)> {
    let mut g = [0.0; 3];
    for (gi, row) in g.iter_mut().zip(orient) {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(Error::InvalidArgument("orientation row is zero".to_string()));
        }
        *gi = row.iter().zip(&accel).map(|(r, a)| r * a).sum::<f64>() / norm;
    }
    let mag = g.iter().map(|v| v * v).sum::<f64>().sqrt();
    if mag == 0.0 {
        return Err(Error::OutOfRange("accelerometer reads zero gravity".to_string()));
    }
    let theta = (g[2] / mag).clamp(-1.0, 1.0).acos().to_degrees();
    let phi = g[1].atan2(g[0]).to_degrees();
    Ok((theta, phi))
}

pub struct ImuSimple<'a, B> {
    bus: &'a mut B,
    addr: u8,
    orient: [[f64; 3]; 3],
}

impl<'a, B: Bus> ImuSimple<'a, B> {
    pub fn new(bus: &'a mut B, addr: u8, orient: [[f64; 3]; 3]) -> Self {
        Self { bus, addr, orient }
    }

    /// Wakes the sensor and selects the +-2 g range.
    pub fn init(&mut self) -> Result<()> {
        let [id]: [u8; 1] = self.bus.read_reg(self.addr, WHO_AM_I)?;
        if !KNOWN_IDS.contains(&id) {
            warn!("imu {:#04x}: unexpected WHO_AM_I {id:#04x}", self.addr);
        }
        self.bus.send(self.addr, &[PWR_MGMT_1, 0x00])?;
        std::thread::sleep(Duration::from_millis(10));
        self.bus.send(self.addr, &[ACCEL_CONFIG, 0x00])
    }

    /// Acceleration in g along the sensor axes.
    pub fn accel(&mut self) -> Result<[f64; 3]> {
        let raw: [u8; 6] = self.bus.read_reg(self.addr, ACCEL_XOUT_H)?;
        Ok([0, 2, 4].map(|i| i16::from_be_bytes([raw[i], raw[i + 1]]) as f64 / ACCEL_SCALE))
    }

    pub fn pose(&mut self) -> Result<(f64, f64)> {
        let accel = self.accel()?;
        pose_from_accel(&self.orient, accel)
    }

    pub fn power_off(&mut self) -> Result<()> {
        self.bus.send(self.addr, &[PWR_MGMT_1, SLEEP])
    }
}
